//! Site lifecycle state, probe outcome, and metric-key formatting (spec §6).

use std::fmt;

/// Lifecycle state of a site, as reported by the state query (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Starting,
    Started,
    Stopping,
    Stopped,
    Unknown,
    NotFound,
}

impl SiteState {
    /// Maps the native API's `0..4` state code (spec §4.4, §6).
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SiteState::Starting,
            1 => SiteState::Started,
            2 => SiteState::Stopping,
            3 => SiteState::Stopped,
            _ => SiteState::Unknown,
        }
    }

    /// Maps the external command's lowercased `state` string; an
    /// unrecognized string also yields `Unknown` rather than failing the
    /// cycle — only a JSON parse failure maps to `NotFound` (spec §4.4).
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "starting" => SiteState::Starting,
            "started" => SiteState::Started,
            "stopping" => SiteState::Stopping,
            "stopped" => SiteState::Stopped,
            _ => SiteState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteState::Starting => "starting",
            SiteState::Started => "started",
            SiteState::Stopping => "stopping",
            SiteState::Stopped => "stopped",
            SiteState::Unknown => "unknown",
            SiteState::NotFound => "notfound",
        }
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe cycle against a site (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok,
    ErrTimeout,
    ErrFailed,
    ErrWebappProblem,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "STATUS_OK",
            ProbeStatus::ErrTimeout => "STATUS_ERR_TIMEOUT",
            ProbeStatus::ErrFailed => "STATUS_ERR_FAILED",
            ProbeStatus::ErrWebappProblem => "STATUS_ERR_WEBAPP_PROBLEM",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `iis.site.state[<name>]`.
pub fn state_key(name: &str) -> String {
    format!("iis.site.state[{name}]")
}

/// `iis.site.probe[<proto>,<host>,<port>,<addr>,<allhosts>]`.
///
/// `allhosts` must already be the comma-separated, lowercased, de-duplicated,
/// sorted hostname list ([`crate::site::Site::normalized_hostnames`]); it is
/// wrapped in double quotes iff it contains a comma.
pub fn probe_key(proto: &str, host: &str, port: &str, addr: &str, allhosts: &str) -> String {
    if allhosts.contains(',') {
        format!("iis.site.probe[{proto},{host},{port},{addr},\"{allhosts}\"]")
    } else {
        format!("iis.site.probe[{proto},{host},{port},{addr},{allhosts}]")
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Quoting is driven solely by the presence of a comma in `allhosts`;
        // it must never appear for a single host and always wrap a multi-host list.
        #[test]
        fn quoting_tracks_comma_presence(
            proto in "[a-z]{1,8}",
            host in "[a-z0-9.]{1,12}",
            port in "[0-9]{1,5}",
            addr in "[0-9.]{1,15}",
            allhosts in "[a-z0-9.,]{1,20}",
        ) {
            let key = probe_key(&proto, &host, &port, &addr, &allhosts);
            prop_assert_eq!(key.contains(&format!("\"{allhosts}\"")), allhosts.contains(','));
        }
    }
}
