//! Site lifecycle state queries: native-API and external-command sources
//! (spec §4.4, §6).

use std::process::Command;

use iiswatch_types::SiteState;
use serde_json::Value;

use crate::error::SourceError;

/// A pluggable query for one site's state, wrapped by [`NativeStateSource`]'s
/// retry loop.
pub trait NativeStateQuery: Send + Sync {
    /// `Ok(None)` means the native API returned an empty result set
    /// (`notfound`, per spec §4.4); it is not an error.
    fn query(&self, site_name: &str) -> Result<Option<SiteState>, SourceError>;
}

/// A site-state source (spec §4.4: "wmi" or "ps").
pub trait SiteStateSource: Send + Sync {
    fn state(&self, site_name: &str) -> Result<SiteState, SourceError>;
}

/// Native management-API state source, retried per the shared backoff
/// schedule; an empty result set maps to `notfound` rather than erroring.
pub struct NativeStateSource<Q> {
    query: Q,
}

impl<Q: NativeStateQuery> NativeStateSource<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }
}

impl<Q: NativeStateQuery> SiteStateSource for NativeStateSource<Q> {
    fn state(&self, site_name: &str) -> Result<SiteState, SourceError> {
        let result = iiswatch_retry::retry("state-query", || self.query.query(site_name))?;
        Ok(result.unwrap_or(SiteState::NotFound))
    }
}

const POWERSHELL_STATE_SCRIPT_PREFIX: &str = "(Get-WebsiteState -Name";

/// External-command state source. A JSON parse failure maps the whole
/// lookup to `notfound` (spec §4.4) rather than propagating an error — the
/// Checker sees this simply as another lifecycle state.
pub struct ShellStateSource;

impl SiteStateSource for ShellStateSource {
    fn state(&self, site_name: &str) -> Result<SiteState, SourceError> {
        let script = format!(
            "{POWERSHELL_STATE_SCRIPT_PREFIX} '{}').Value|ConvertTo-Json -compress",
            site_name.replace('\'', "''")
        );
        let output = Command::new("powershell")
            .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &script])
            .output()
            .map_err(SourceError::Spawn)?;
        if !output.status.success() {
            return Err(SourceError::NonZeroExit(output.status));
        }
        Ok(parse_shell_state_output(&output.stdout).unwrap_or(SiteState::NotFound))
    }
}

fn parse_shell_state_output(bytes: &[u8]) -> Option<SiteState> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    let obj = value.as_object()?;
    let state = obj
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("state"))
        .and_then(|(_, v)| v.as_str())?;
    Some(SiteState::from_str_lossy(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercased_state_case_insensitively_keyed() {
        assert_eq!(parse_shell_state_output(br#"{"State":"Started"}"#), Some(SiteState::Started));
        assert_eq!(parse_shell_state_output(br#"{"state":"STOPPED"}"#), Some(SiteState::Stopped));
    }

    #[test]
    fn unrecognized_state_string_is_unknown_not_notfound() {
        assert_eq!(parse_shell_state_output(br#"{"state":"weird"}"#), Some(SiteState::Unknown));
    }

    #[test]
    fn garbage_json_yields_none() {
        assert_eq!(parse_shell_state_output(b"not json"), None);
    }

    struct AlwaysEmpty;
    impl NativeStateQuery for AlwaysEmpty {
        fn query(&self, _site_name: &str) -> Result<Option<SiteState>, SourceError> {
            Ok(None)
        }
    }

    #[test]
    fn native_source_maps_empty_result_to_notfound() {
        let source = NativeStateSource::new(AlwaysEmpty);
        assert_eq!(source.state("Site1").unwrap(), SiteState::NotFound);
    }
}
