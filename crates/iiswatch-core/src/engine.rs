//! Wiring: builds the four roles from resolved configuration and starts
//! them in dependency order (spec §2, §4.7).

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

use iiswatch_config::{AppSettings, DiscoveryMethod, SenderType, SiteConfigTable};
use iiswatch_types::Site;
use serde_json::json;

use crate::checker::Checker;
use crate::discovery::{Discoverer, NativeSiteQuery, NativeSiteSource, RawSiteRecord, ShellSiteSource, SiteSource};
use crate::error::SourceError;
use crate::inventory::SiteInventory;
use crate::latch::Latch;
use crate::sender::{Sender, Sink};
use crate::state_query::{NativeStateQuery, NativeStateSource, ShellStateSource, SiteStateSource};
use crate::supervisor::{Supervisor, Worker};

/// A native management-API query is not available from portable Rust
/// without a platform-specific binding; this stands in for it so
/// `discovery_method = wmi` still exercises the retry/backoff path rather
/// than being silently unsupported. A real deployment swaps this for a
/// binding into the host's web-administration namespace.
struct UnavailableNativeSiteQuery;

impl NativeSiteQuery for UnavailableNativeSiteQuery {
    fn query(&self) -> Result<Vec<RawSiteRecord>, SourceError> {
        Err(SourceError::Native("native management API binding is not available on this host".into()))
    }
}

struct UnavailableNativeStateQuery;

impl NativeStateQuery for UnavailableNativeStateQuery {
    fn query(&self, _site_name: &str) -> Result<Option<iiswatch_types::SiteState>, SourceError> {
        Err(SourceError::Native("native management API binding is not available on this host".into()))
    }
}

fn build_site_source(method: DiscoveryMethod) -> Box<dyn SiteSource> {
    match method {
        DiscoveryMethod::Native => Box::new(NativeSiteSource::new(UnavailableNativeSiteQuery)),
        DiscoveryMethod::Shell => Box::new(ShellSiteSource),
    }
}

fn build_state_source(method: DiscoveryMethod) -> Box<dyn SiteStateSource> {
    match method {
        DiscoveryMethod::Native => Box::new(NativeStateSource::new(UnavailableNativeStateQuery)),
        DiscoveryMethod::Shell => Box::new(ShellStateSource),
    }
}

fn build_sink(app: &AppSettings) -> Sink {
    match app.sender_type {
        SenderType::Print => Sink::Print,
        SenderType::Send => Sink::Send {
            addr: app.zbx_srv.clone(),
            port: app.zbx_port,
            timeout: Duration::from_secs(30),
        },
    }
}

/// Starts Discoverer, Sender, and Checker (in that order) and returns a
/// [`Supervisor`] ready to run the tick loop (spec §4.7).
pub fn start(app: &AppSettings, site_config: Arc<SiteConfigTable>) -> Supervisor {
    let stop = Arc::new(Latch::new());
    let inventory = Arc::new(SiteInventory::new());
    let discovery_done = Arc::new(Latch::new());

    let (discoverer_tx, discoverer_rx) = channel();
    let discoverer = Discoverer {
        source: build_site_source(app.discovery_method),
        inventory: Arc::clone(&inventory),
        discovery_done: Arc::clone(&discovery_done),
        stop: Arc::clone(&stop),
        cache_time: Duration::from_secs(900),
        pref_proto: app.discovery_prefproto.clone(),
        pref_host: app.discovery_prefhost.clone(),
    };
    let discoverer_join = std::thread::Builder::new()
        .name("discoverer".into())
        .spawn(move || discoverer.run(discoverer_rx))
        .expect("failed to spawn discoverer thread");

    let (sender_tx, sender_rx) = channel();
    let sender = Sender { sink: build_sink(app) };
    let sender_join = std::thread::Builder::new()
        .name("sender".into())
        .spawn(move || sender.run(sender_rx))
        .expect("failed to spawn sender thread");

    let (checker_tx, checker_rx) = channel();
    let checker = Checker {
        inventory,
        discovery_done,
        stop: Arc::clone(&stop),
        discoverer_tx: discoverer_tx.clone(),
        sender_tx: sender_tx.clone(),
        state_source: build_state_source(app.check_method),
        config: site_config,
    };
    let checker_join = std::thread::Builder::new()
        .name("checker".into())
        .spawn(move || checker.run(checker_rx))
        .expect("failed to spawn checker thread");

    Supervisor {
        interval: Duration::from_secs(app.interval),
        stop,
        discoverer: Worker::new("discoverer", discoverer_tx, discoverer_join),
        sender: Worker::new("sender", sender_tx, sender_join),
        checker: Worker::new("checker", checker_tx, checker_join),
    }
}

/// Runs a single discovery pass and renders the inventory as the
/// discovery-mode document (spec §4.7 "discovery" mode, §6).
pub fn discover_once(app: &AppSettings) -> Result<serde_json::Value, SourceError> {
    let source = build_site_source(app.discovery_method);
    let records = match source.discover()? {
        Some(records) => records,
        None => Vec::new(),
    };
    let sites: Vec<Site> = records
        .into_iter()
        .map(|r| Site::new(r.name, r.autostart, r.bindings, &app.discovery_prefproto, app.discovery_prefhost.as_deref()))
        .collect();
    Ok(render_discovery_document(&sites))
}

fn render_discovery_document(sites: &[Site]) -> serde_json::Value {
    let data: Vec<_> = sites
        .iter()
        .map(|site| {
            // Binding fields are reported verbatim; normalization (`*`/`""`
            // substitution) applies only when actually contacting the site,
            // not to the discovery document (spec §8 scenario 6).
            let binding = site.preferred_binding();
            let allhosts: Vec<String> = site.normalized_hostnames().into_iter().collect();
            json!({
                "{#SITE_NAME}": site.name,
                "{#SITE_START}": site.startup_type(),
                "{#SITE_PROTO}": binding.protocol,
                "{#SITE_HOST}": binding.host,
                "{#SITE_ALL_HOSTS}": allhosts.join(","),
                "{#SITE_PORT}": binding.port,
                "{#SITE_ADDR}": binding.address,
            })
        })
        .collect();
    json!({ "data": data })
}
