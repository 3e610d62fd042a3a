//! `Binding` and `Site`, and the preferred-binding selection rule (spec §3).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One address/port/host/protocol tuple taken verbatim from the host's
/// binding information (`address:port:host`, protocol separate).
///
/// `address` may be the wildcard `*` and `host` may be empty; both are
/// normalized at probe time, not at construction, so the inventory always
/// holds the data exactly as the host system reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub address: String,
    pub port: String,
    pub host: String,
    pub protocol: String,
}

impl Binding {
    pub fn new(
        address: impl Into<String>,
        port: impl Into<String>,
        host: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
            host: host.into(),
            protocol: protocol.into(),
        }
    }

    /// `""` normalizes to `localhost`.
    pub fn normalized_host(&self) -> &str {
        if self.host.is_empty() { "localhost" } else { &self.host }
    }

    /// `*` normalizes to `127.0.0.1`.
    pub fn normalized_address(&self) -> &str {
        if self.address == "*" { "127.0.0.1" } else { &self.address }
    }

    fn protocol_matches(&self, want: &str) -> bool {
        self.protocol.eq_ignore_ascii_case(want)
    }

    fn host_contains(&self, needle: &str) -> bool {
        self.host.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// An IIS-equivalent hosted site: name, autostart flag, its ordered
/// (non-empty) bindings, and the binding chosen by [`select_preferred`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub autostart: bool,
    pub bindings: Vec<Binding>,
    preferred: usize,
}

impl Site {
    /// Builds a `Site`, choosing the preferred binding per spec §3.
    ///
    /// # Panics
    /// Panics if `bindings` is empty — a site with no bindings cannot be
    /// constructed, matching the invariant in spec.md §3.
    pub fn new(
        name: impl Into<String>,
        autostart: bool,
        bindings: Vec<Binding>,
        pref_proto: &str,
        pref_host: Option<&str>,
    ) -> Self {
        assert!(!bindings.is_empty(), "a site must have at least one binding");
        let preferred = select_preferred(&bindings, pref_proto, pref_host);
        Self { name: name.into(), autostart, bindings, preferred }
    }

    pub fn preferred_binding(&self) -> &Binding {
        &self.bindings[self.preferred]
    }

    /// `auto` / `manual`, matching the discovery-mode document (spec §6).
    pub fn startup_type(&self) -> &'static str {
        if self.autostart { "auto" } else { "manual" }
    }

    /// Lowercased, de-duplicated, sorted hostnames across all bindings.
    pub fn normalized_hostnames(&self) -> BTreeSet<String> {
        self.bindings
            .iter()
            .map(|b| b.normalized_host().to_lowercase())
            .collect()
    }
}

/// Scans `bindings` in source order and returns the index of the preferred
/// one, per spec §3:
///
/// 1. protocol == `pref_proto` AND host contains `pref_host` → take and lock.
/// 2. host contains `pref_host` → take (may still be overridden by rule 1).
/// 3. protocol == `pref_proto` AND no host-match already taken → take.
/// 4. fallback: the last binding in source order.
pub fn select_preferred(bindings: &[Binding], pref_proto: &str, pref_host: Option<&str>) -> usize {
    let mut preferred = bindings.len() - 1;
    let mut locked = false;
    let mut found_host = false;

    for (i, b) in bindings.iter().enumerate() {
        if locked {
            break;
        }
        let matches_host = pref_host.is_some_and(|h| !h.is_empty() && b.host_contains(h));
        let matches_proto = b.protocol_matches(pref_proto);

        if matches_host && matches_proto {
            preferred = i;
            locked = true;
        } else if matches_host {
            preferred = i;
            found_host = true;
        } else if matches_proto && !found_host {
            preferred = i;
        }
    }

    preferred
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(port: &str, proto: &str, host: &str) -> Binding {
        Binding::new("*", port, host, proto)
    }

    #[test]
    fn selection_both_proto_and_host() {
        let bindings = vec![
            b("80", "http", "www.example.com"),
            b("443", "https", "other.com"),
            b("443", "https", "example.org"),
        ];
        let idx = select_preferred(&bindings, "https", Some("example"));
        assert_eq!(bindings[idx], b("443", "https", "example.org"));
    }

    #[test]
    fn selection_host_only() {
        let bindings = vec![b("80", "http", "example.org"), b("80", "http", "other.com")];
        let idx = select_preferred(&bindings, "https", Some("example"));
        assert_eq!(bindings[idx], b("80", "http", "example.org"));
    }

    #[test]
    fn selection_fallback_is_last() {
        let bindings = vec![b("80", "http", "a.com"), b("80", "http", "b.com")];
        let idx = select_preferred(&bindings, "https", Some("example"));
        assert_eq!(bindings[idx], b("80", "http", "b.com"));
    }

    #[test]
    fn host_lock_is_not_overridden_by_a_later_weaker_match() {
        // Rule 2 takes a host-only match; a later proto-only match must not
        // override it once a host match has been taken.
        let bindings = vec![
            b("80", "http", "example.org"),
            b("443", "https", "other.com"),
        ];
        let idx = select_preferred(&bindings, "https", Some("example"));
        assert_eq!(bindings[idx], b("80", "http", "example.org"));
    }

    #[test]
    fn rule_one_match_locks_even_if_it_appears_first() {
        let bindings = vec![
            b("443", "https", "example.org"),
            b("80", "http", "example.org"),
        ];
        let idx = select_preferred(&bindings, "https", Some("example"));
        assert_eq!(bindings[idx], b("443", "https", "example.org"));
    }

    #[test]
    fn normalization_of_wildcard_address_and_empty_host() {
        let binding = Binding::new("*", "80", "", "http");
        assert_eq!(binding.normalized_address(), "127.0.0.1");
        assert_eq!(binding.normalized_host(), "localhost");
    }

    #[test]
    fn normalized_hostnames_are_sorted_deduped_lowercased() {
        let site = Site::new(
            "Site1",
            true,
            vec![b("80", "http", "B.example.com"), b("443", "https", "a.example.com"), b("81", "http", "a.EXAMPLE.com")],
            "https",
            None,
        );
        let hosts: Vec<_> = site.normalized_hostnames().into_iter().collect();
        assert_eq!(hosts, vec!["a.example.com".to_string(), "b.example.com".to_string()]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_binding() -> impl Strategy<Value = Binding> {
        ("[a-z0-9.*]{0,12}", "[0-9]{1,5}", "[a-z0-9.]{0,12}", "http|https")
            .prop_map(|(address, port, host, protocol)| Binding::new(address, port, host, protocol))
    }

    proptest! {
        // `select_preferred` must always return a valid index into `bindings`,
        // no matter what preferences or binding contents it's given.
        #[test]
        fn selection_always_returns_an_in_bounds_index(
            bindings in proptest::collection::vec(arb_binding(), 1..8),
            pref_proto in "http|https|ftp",
            pref_host in proptest::option::of("[a-z0-9.]{0,12}"),
        ) {
            let idx = select_preferred(&bindings, &pref_proto, pref_host.as_deref());
            prop_assert!(idx < bindings.len());
        }

        // With no preferred host at all, the rule degenerates to: take the
        // last proto-matching binding, else fall back to the very last one.
        #[test]
        fn no_preferred_host_falls_back_to_last_proto_match_or_last_binding(
            bindings in proptest::collection::vec(arb_binding(), 1..8),
            pref_proto in "http|https",
        ) {
            let idx = select_preferred(&bindings, &pref_proto, None);
            let expected = bindings.iter().rposition(|b| b.protocol_matches(&pref_proto)).unwrap_or(bindings.len() - 1);
            prop_assert_eq!(idx, expected);
        }
    }
}
