//! Loads the `_appglobal` / `_defaulthost` / per-site sections from an INI
//! file (spec §6), mirroring the section/option model of Python's
//! `configparser` that the original source is built on.

use std::collections::BTreeSet;
use std::path::Path;

use ini::Ini;

use crate::app::{AppSettings, DiscoveryMethod, SenderType};
use crate::site::{SiteConfigOverrides, SiteConfigTable};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: ini::Error,
    },
    #[error("{section}.{option} should be a non-negative integer, got {value:?}")]
    NotNonNegativeInt { section: String, option: String, value: String },
    #[error("{section}.{option} is not a valid boolean: {value:?}")]
    NotBoolean { section: String, option: String, value: String },
    #[error("unrecognized {option}: {value:?}")]
    BadEnumValue { option: String, value: String },
}

const SECTION_APPGLOBAL: &str = "_appglobal";
const SECTION_DEFAULTHOST: &str = "_defaulthost";

/// Loads `path` and returns the resolved `AppSettings` plus the per-site
/// `SiteConfigTable`. A missing file is not an error at this layer — the
/// caller decides whether "file not found" means "use all defaults"
/// (matching the original's `except FileNotFoundError: pass`).
pub fn load_from_ini_file(path: &Path) -> Result<(AppSettings, SiteConfigTable), ConfigError> {
    let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_from_ini(&ini)
}

pub fn load_from_ini(ini: &Ini) -> Result<(AppSettings, SiteConfigTable), ConfigError> {
    let mut app = AppSettings::default();
    let mut default_overrides = SiteConfigOverrides::default();
    let mut sites: Vec<(BTreeSet<String>, SiteConfigOverrides)> = Vec::new();

    for (name, props) in ini.iter() {
        let Some(name) = name else { continue };
        if name == SECTION_APPGLOBAL {
            apply_appglobal(&mut app, props)?;
        } else if name == SECTION_DEFAULTHOST {
            default_overrides = parse_site_overrides(name, props)?;
        } else {
            let Some(allhosts) = props.get("allhosts") else {
                // No `allhosts` key: not a site section we understand, skip
                // it the same way the original swallows `NoOptionError`.
                continue;
            };
            let key: BTreeSet<String> = allhosts.split(',').map(|h| h.trim().to_lowercase()).collect();
            sites.push((key, parse_site_overrides(name, props)?));
        }
    }

    Ok((app, SiteConfigTable::new(default_overrides, sites)))
}

fn apply_appglobal(app: &mut AppSettings, props: &ini::Properties) -> Result<(), ConfigError> {
    if let Some(v) = props.get("interval") {
        app.interval = parse_nonneg(SECTION_APPGLOBAL, "interval", v)?;
    }
    if let Some(v) = props.get("logfile") {
        app.logfile = Some(v.to_string());
    }
    if let Some(v) = props.get("loglevel") {
        app.loglevel = Some(v.to_string());
    }
    if let Some(v) = props.get("discovery_method") {
        app.discovery_method = DiscoveryMethod::parse(v)
            .ok_or_else(|| ConfigError::BadEnumValue { option: "discovery_method".into(), value: v.into() })?;
    }
    if let Some(v) = props.get("discovery_prefproto") {
        app.discovery_prefproto = v.to_string();
    }
    if let Some(v) = props.get("discovery_prefhost") {
        app.discovery_prefhost = Some(v.to_string());
    }
    if let Some(v) = props.get("sender_type") {
        app.sender_type = SenderType::parse(v)
            .ok_or_else(|| ConfigError::BadEnumValue { option: "sender_type".into(), value: v.into() })?;
    }
    if let Some(v) = props.get("zbx_srv") {
        app.zbx_srv = v.to_string();
    }
    if let Some(v) = props.get("zbx_port") {
        app.zbx_port = v
            .parse()
            .map_err(|_| ConfigError::NotNonNegativeInt { section: SECTION_APPGLOBAL.into(), option: "zbx_port".into(), value: v.into() })?;
    }
    if let Some(v) = props.get("zbx_host") {
        app.zbx_host = Some(v.to_string());
    }
    if let Some(v) = props.get("check_method") {
        app.check_method = DiscoveryMethod::parse(v)
            .ok_or_else(|| ConfigError::BadEnumValue { option: "check_method".into(), value: v.into() })?;
    }
    Ok(())
}

fn parse_site_overrides(section: &str, props: &ini::Properties) -> Result<SiteConfigOverrides, ConfigError> {
    let mut overrides = SiteConfigOverrides::default();
    for (option, value) in props.iter() {
        match option {
            "allhosts" => continue,
            "path" => overrides.path = Some(value.to_string()),
            "timeout" => overrides.timeout = Some(parse_nonneg(section, option, value)?),
            "delay" => overrides.delay = Some(parse_nonneg(section, option, value)?),
            "nameservers" => overrides.nameservers = Some(value.to_string()),
            "v4" => overrides.v4 = Some(parse_bool(section, option, value)?),
            "v6" => overrides.v6 = Some(parse_bool(section, option, value)?),
            "ca" => overrides.ca = Some(value.to_string()),
            "verbose" => overrides.verbose = Some(parse_bool(section, option, value)?),
            _ => {}
        }
    }
    Ok(overrides)
}

fn parse_nonneg(section: &str, option: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<i64>().ok().filter(|v| *v >= 0).map(|v| v as u64).ok_or_else(|| ConfigError::NotNonNegativeInt {
        section: section.to_string(),
        option: option.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(section: &str, option: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::NotBoolean { section: section.to_string(), option: option.to_string(), value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Ini {
        Ini::load_from_str(text).unwrap()
    }

    #[test]
    fn defaults_when_file_has_no_relevant_sections() {
        let ini = parse("[other]\nkey=value\n");
        let (app, table) = load_from_ini(&ini).unwrap();
        assert_eq!(app.interval, 300);
        assert_eq!(table.get(&BTreeSet::new()).timeout, 300);
    }

    #[test]
    fn appglobal_overrides_interval_and_enums() {
        let ini = parse(
            "[_appglobal]\ninterval=60\ndiscovery_method=wmi\nsender_type=send\nzbx_port=10052\n",
        );
        let (app, _) = load_from_ini(&ini).unwrap();
        assert_eq!(app.interval, 60);
        assert_eq!(app.discovery_method, DiscoveryMethod::Native);
        assert_eq!(app.sender_type, SenderType::Send);
        assert_eq!(app.zbx_port, 10052);
    }

    #[test]
    fn site_section_without_allhosts_is_skipped() {
        let ini = parse("[somesite]\ntimeout=5\n");
        let (_, table) = load_from_ini(&ini).unwrap();
        assert_eq!(table.get(&BTreeSet::from(["a.com".to_string()])).timeout, 300);
    }

    #[test]
    fn site_section_is_keyed_by_allhosts() {
        let ini = parse("[site1]\nallhosts = a.com, b.com\ntimeout=5\nv4=true\n");
        let (_, table) = load_from_ini(&ini).unwrap();
        let resolved = table.get(&BTreeSet::from(["b.com".to_string()]));
        assert_eq!(resolved.timeout, 5);
        assert!(resolved.v4);
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let ini = parse("[site1]\nallhosts = a.com\ntimeout=-1\n");
        assert!(load_from_ini(&ini).is_err());
    }

    #[test]
    fn loads_from_a_real_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iiswatch.ini");
        std::fs::write(&path, "[_appglobal]\ninterval=45\n\n[site1]\nallhosts = example.com\ntimeout=9\n").unwrap();

        let (app, table) = load_from_ini_file(&path).unwrap();
        assert_eq!(app.interval, 45);
        assert_eq!(table.get(&BTreeSet::from(["example.com".to_string()])).timeout, 9);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ini");
        assert!(matches!(load_from_ini_file(&missing), Err(ConfigError::Io { .. })));
    }
}
