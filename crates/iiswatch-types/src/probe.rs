//! Probe plans: a site's ordered list of URL + body-assertion steps (spec §3, §4.3).

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// The JSON shape of a single step as it appears in a site's `path` config
/// option, before resolution against a binding.
#[derive(Debug, Deserialize)]
struct RawProbeStep {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    nobody: Option<String>,
}

/// A single GET + assertion, resolved against a site's scheme/host/port.
///
/// If both `body_regex` and `nobody_regex` are present, `body_regex` takes
/// precedence (spec §3): `nobody_regex` is only consulted when there is no
/// `body_regex`, matching the original's step order (`body` checked first,
/// `nobody` checked only via `elif`).
#[derive(Debug, Clone)]
pub struct ProbeStep {
    pub url: String,
    pub body_regex: Option<Regex>,
    pub nobody_regex: Option<Regex>,
}

/// A site's full probe plan: a non-empty, ordered sequence of steps.
#[derive(Debug, Clone)]
pub struct ProbePlan(Vec<ProbeStep>);

impl ProbePlan {
    pub fn steps(&self) -> &[ProbeStep] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ProbePlan {
    type Item = &'a ProbeStep;
    type IntoIter = std::slice::Iter<'a, ProbeStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbePlanError {
    #[error("probe plan is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("probe plan has no steps")]
    Empty,
    #[error("unrecognized scheme {0:?}, expected http or https")]
    BadScheme(String),
    #[error("invalid regex {pattern:?}: {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Default plan used when a site has no `path` option configured:
/// one GET of `/` with no body assertion.
pub const DEFAULT_PLAN_JSON: &str = r#"[{"path":"/","body":null}]"#;

/// Parses and resolves a probe plan against one binding's scheme/host/port.
///
/// Builds each step's URL as `<scheme>://<host>:<port><path>` after
/// normalizing `host` (`"" -> "localhost"`) — address normalization applies
/// separately to DNS pinning (spec §4.3), not to the URL's host component.
/// `scheme` must case-insensitively be `http` or `https`.
pub fn parse_probe_plan(json: &str, scheme: &str, host: &str, port: &str) -> Result<ProbePlan, ProbePlanError> {
    if !Regex::new("^(http|https)$").unwrap().is_match(&scheme.to_lowercase()) {
        return Err(ProbePlanError::BadScheme(scheme.to_string()));
    }
    let normalized_host = if host.is_empty() { "localhost" } else { host };
    let raw: Vec<RawProbeStep> = serde_json::from_str(json)?;
    if raw.is_empty() {
        return Err(ProbePlanError::Empty);
    }

    let mut steps = Vec::with_capacity(raw.len());
    for step in raw {
        let path = step.path.unwrap_or_else(|| "/".to_string());
        let url = format!("{}://{}:{}{}", scheme.to_lowercase(), normalized_host, port, path);
        let body_regex = step.body.map(|p| compile(&p)).transpose()?;
        let nobody_regex = step.nobody.map(|p| compile(&p)).transpose()?;
        steps.push(ProbeStep { url, body_regex, nobody_regex });
    }
    Ok(ProbePlan(steps))
}

fn compile(pattern: &str) -> Result<Regex, ProbePlanError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ProbePlanError::BadRegex { pattern: pattern.to_string(), source })
}
