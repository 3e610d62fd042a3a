//! Site discovery: native-API and external-command sources, and the
//! Discoverer's run loop (spec §4.2, §6).

use std::process::Command;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iiswatch_types::{Binding, Message, Site};
use serde_json::Value;

use crate::error::SourceError;
use crate::inventory::SiteInventory;
use crate::latch::Latch;

/// One site's data as returned by a discovery source, before preferred
/// binding selection (which needs the Discoverer's configured preferences).
#[derive(Debug, Clone)]
pub struct RawSiteRecord {
    pub name: String,
    pub autostart: bool,
    pub bindings: Vec<Binding>,
}

/// A pluggable query against the host's web-administration namespace,
/// wrapped by [`NativeSiteSource`]'s retry loop. Production builds back this
/// with the platform's real management API; tests inject a fake.
pub trait NativeSiteQuery: Send + Sync {
    fn query(&self) -> Result<Vec<RawSiteRecord>, SourceError>;
}

/// A full site-inventory source (spec §6: "native API" or "external
/// command").
pub trait SiteSource: Send + Sync {
    /// Returns `Ok(None)` for a transient failure that should leave the
    /// inventory unchanged this cycle (spec §4.2); `Err` for a fatal one.
    fn discover(&self) -> Result<Option<Vec<RawSiteRecord>>, SourceError>;
}

/// Native management-API source, retried per [`iiswatch_retry::retry`]
/// (spec §4.2: "Retry policy ... applies to the management-API method").
pub struct NativeSiteSource<Q> {
    query: Q,
}

impl<Q: NativeSiteQuery> NativeSiteSource<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }
}

impl<Q: NativeSiteQuery> SiteSource for NativeSiteSource<Q> {
    fn discover(&self) -> Result<Option<Vec<RawSiteRecord>>, SourceError> {
        iiswatch_retry::retry("discovery", || self.query.query()).map(Some)
    }
}

const POWERSHELL_DISCOVERY_SCRIPT: &str =
    "Get-Website|Select Name,Bindings,ServerAutoStart|ConvertTo-Json -depth 3 -compress";

/// External-command source: spawns the host shell once per cycle (spec §6).
/// A parse failure is transient; a spawn or non-zero-exit failure is
/// treated as fatal, matching the observation that the original's uncaught
/// `CalledProcessError` kills the Discoverer thread outright (spec §7: "an
/// always-failing discovery takes down the agent").
pub struct ShellSiteSource;

impl SiteSource for ShellSiteSource {
    fn discover(&self) -> Result<Option<Vec<RawSiteRecord>>, SourceError> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", POWERSHELL_DISCOVERY_SCRIPT])
            .output()
            .map_err(SourceError::Spawn)?;
        if !output.status.success() {
            return Err(SourceError::NonZeroExit(output.status));
        }
        match parse_shell_discovery_output(&output.stdout) {
            Ok(records) => Ok(Some(records)),
            Err(_) => Ok(None),
        }
    }
}

fn get_ci<'a>(map: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
}

fn split_binding_information(s: &str) -> Binding {
    let mut parts = s.splitn(3, ':');
    let address = parts.next().unwrap_or("").to_string();
    let port = parts.next().unwrap_or("").to_string();
    let host = parts.next().unwrap_or("").to_string();
    Binding { address, port, host, protocol: String::new() }
}

/// Parses the PowerShell script's JSON output, matched case-insensitively
/// (spec §6). `ConvertTo-Json` emits a bare object instead of a one-element
/// array when exactly one site is returned; both shapes are accepted.
pub fn parse_shell_discovery_output(bytes: &[u8]) -> Result<Vec<RawSiteRecord>, SourceError> {
    let value: Value = serde_json::from_slice(bytes).map_err(SourceError::Parse)?;
    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(SourceError::Parse(serde::de::Error::custom(format!(
            "expected a JSON object or array, got {other:?}"
        )))),
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object().ok_or_else(|| {
            SourceError::Parse(serde::de::Error::custom("expected each site to be a JSON object"))
        })?;
        let name = get_ci(obj, "name")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::Parse(serde::de::Error::custom("missing name")))?
            .to_string();
        let autostart = get_ci(obj, "serverAutoStart").map(|v| match v {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        }).unwrap_or(false);

        let bindings_obj = get_ci(obj, "bindings").and_then(Value::as_object);
        let collection = bindings_obj
            .and_then(|b| get_ci(b, "Collection"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut bindings = Vec::with_capacity(collection.len());
        for entry in &collection {
            let Some(entry_obj) = entry.as_object() else { continue };
            let protocol = get_ci(entry_obj, "protocol").and_then(Value::as_str).unwrap_or("").to_string();
            let binding_information = get_ci(entry_obj, "bindingInformation").and_then(Value::as_str).unwrap_or("");
            let mut binding = split_binding_information(binding_information);
            binding.protocol = protocol;
            bindings.push(binding);
        }
        if bindings.is_empty() {
            continue;
        }
        records.push(RawSiteRecord { name, autostart, bindings });
    }
    Ok(records)
}

/// Runs the Discoverer role: consumes `ProcessData` by refreshing the
/// shared inventory (subject to the TTL gate), and guarantees the
/// discovery-done latch is signaled on every exit path (spec §4.2's
/// guarantee).
pub struct Discoverer {
    pub source: Box<dyn SiteSource>,
    pub inventory: Arc<SiteInventory>,
    pub discovery_done: Arc<Latch>,
    pub stop: Arc<Latch>,
    pub cache_time: Duration,
    pub pref_proto: String,
    pub pref_host: Option<String>,
}

impl Discoverer {
    pub fn run(self, commands: Receiver<Message<()>>) {
        let mut last_success: Option<Instant> = None;
        for msg in commands {
            match msg {
                Message::ProcessData(()) => {
                    let stale = last_success.is_none_or(|t| t.elapsed() > self.cache_time);
                    if stale {
                        tracing::info!(method = ?self.source_label(), "performing discovery");
                        match self.source.discover() {
                            Ok(Some(records)) => {
                                let sites: Vec<Site> = records
                                    .into_iter()
                                    .map(|r| Site::new(r.name, r.autostart, r.bindings, &self.pref_proto, self.pref_host.as_deref()))
                                    .collect();
                                self.inventory.replace(sites);
                                last_success = Some(Instant::now());
                            }
                            Ok(None) => {
                                tracing::warn!("discovery parse failure treated as transient; inventory unchanged");
                            }
                            Err(err) => {
                                tracing::error!(%err, "discovery failed fatally; shutting down");
                                self.stop.signal();
                                self.discovery_done.signal();
                                return;
                            }
                        }
                    } else {
                        tracing::debug!("using cached inventory");
                    }
                    self.discovery_done.signal();
                }
                Message::StopExecution | Message::ForceStopExecution => return,
                Message::RegisterClient(_) | Message::DeregisterClient(_) => {}
            }
        }
    }

    fn source_label(&self) -> &'static str {
        "configured"
    }
}
