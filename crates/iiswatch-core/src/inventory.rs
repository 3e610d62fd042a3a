//! The Site Inventory: single writer, many readers (spec §3, §4.1).

use std::sync::Mutex;

use iiswatch_types::Site;

/// Cached, ordered list of discovered sites. `reset`+`add` happen under one
/// lock acquisition so a concurrent [`SiteInventory::snapshot`] can never
/// observe a torn state — it sees either the previous full list or the new
/// one, never a partial replacement.
#[derive(Default)]
pub struct SiteInventory {
    sites: Mutex<Vec<Site>>,
}

impl SiteInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the whole inventory. The Discoverer is the only
    /// caller of this method (spec §4.1).
    pub fn replace(&self, sites: Vec<Site>) {
        let mut guard = self.sites.lock().expect("site inventory lock poisoned");
        *guard = sites;
    }

    /// A consistent point-in-time copy, safe to iterate without holding
    /// the lock.
    pub fn snapshot(&self) -> Vec<Site> {
        self.sites.lock().expect("site inventory lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiswatch_types::Binding;

    fn site(name: &str) -> Site {
        Site::new(name, true, vec![Binding::new("*", "80", "", "http")], "https", None)
    }

    #[test]
    fn snapshot_reflects_latest_replace() {
        let inventory = SiteInventory::new();
        assert!(inventory.snapshot().is_empty());
        inventory.replace(vec![site("a"), site("b")]);
        let snap = inventory.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a");
    }

    #[test]
    fn replace_is_a_full_swap_not_an_incremental_edit() {
        let inventory = SiteInventory::new();
        inventory.replace(vec![site("a")]);
        inventory.replace(vec![site("b"), site("c")]);
        let snap = inventory.snapshot();
        assert_eq!(snap.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
