//! Per-site configuration resolution by hostname-set intersection (spec §3, §4.5, §9).

use std::collections::BTreeSet;

use iiswatch_types::probe::DEFAULT_PLAN_JSON;

/// Resolved configuration for one site: the `_defaulthost` section merged
/// with any matching per-site overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub path: String,
    pub timeout: u64,
    pub delay: u64,
    pub nameservers: Option<String>,
    pub v4: bool,
    pub v6: bool,
    pub ca: Option<String>,
    pub verbose: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PLAN_JSON.to_string(),
            timeout: 300,
            delay: 30,
            nameservers: None,
            v4: false,
            v6: false,
            ca: None,
            verbose: false,
        }
    }
}

/// A partial set of field overrides, as read from one INI section. Unset
/// fields fall back to the default section, not to any other per-site
/// section — each resolved [`SiteConfig`] is a flat merge of exactly two
/// layers (defaults, then one matching site section), matching the
/// original's `_Config.get`.
#[derive(Debug, Clone, Default)]
pub struct SiteConfigOverrides {
    pub path: Option<String>,
    pub timeout: Option<u64>,
    pub delay: Option<u64>,
    pub nameservers: Option<String>,
    pub v4: Option<bool>,
    pub v6: Option<bool>,
    pub ca: Option<String>,
    pub verbose: Option<bool>,
}

impl SiteConfigOverrides {
    fn apply(&self, base: &SiteConfig) -> SiteConfig {
        SiteConfig {
            path: self.path.clone().unwrap_or_else(|| base.path.clone()),
            timeout: self.timeout.unwrap_or(base.timeout),
            delay: self.delay.unwrap_or(base.delay),
            nameservers: self.nameservers.clone().or_else(|| base.nameservers.clone()),
            v4: self.v4.unwrap_or(base.v4),
            v6: self.v6.unwrap_or(base.v6),
            ca: self.ca.clone().or_else(|| base.ca.clone()),
            verbose: self.verbose.unwrap_or(base.verbose),
        }
    }
}

/// Ordered table of per-site configuration overrides keyed by an
/// `allhosts` hostname set. Lookup is an order-sensitive scan: the first
/// key that intersects the queried hostnames wins (spec §3, §9) — insertion
/// order must be preserved, so this is a `Vec`, not a `HashMap`.
#[derive(Debug, Clone)]
pub struct SiteConfigTable {
    defaults: SiteConfig,
    sites: Vec<(BTreeSet<String>, SiteConfig)>,
}

impl SiteConfigTable {
    pub fn new(default_overrides: SiteConfigOverrides, sites: Vec<(BTreeSet<String>, SiteConfigOverrides)>) -> Self {
        let defaults = default_overrides.apply(&SiteConfig::default());
        let sites = sites
            .into_iter()
            .map(|(hosts, overrides)| (hosts, overrides.apply(&defaults)))
            .collect();
        Self { defaults, sites }
    }

    /// Returns the config for the first site-key that intersects
    /// `hostnames`, else the resolved defaults.
    pub fn get(&self, hostnames: &BTreeSet<String>) -> &SiteConfig {
        for (key, cfg) in &self.sites {
            if key.intersection(hostnames).next().is_some() {
                return cfg;
            }
        }
        &self.defaults
    }
}
