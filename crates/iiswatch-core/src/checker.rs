//! The Checker: orchestrates one polling cycle (spec §4.5).

use std::net::SocketAddr;
use std::sync::mpsc::{Receiver, Sender as MpscSender};
use std::sync::Arc;
use std::time::Duration;

use iiswatch_config::SiteConfigTable;
use iiswatch_types::{probe_key, state_key, ClientId, Message, ProbeStatus, Site, SiteState};

use crate::inventory::SiteInventory;
use crate::latch::Latch;
use crate::probe::ProbeEngine;
use crate::sender::{ResultBatch, ResultItem};
use crate::state_query::SiteStateSource;

/// How long the Checker pauses between the state batch and the probe fan-out
/// ("let dust settle", spec §4.5).
const SETTLE_DELAY: Duration = Duration::from_secs(5);

pub struct Checker {
    pub inventory: Arc<SiteInventory>,
    pub discovery_done: Arc<Latch>,
    pub stop: Arc<Latch>,
    pub discoverer_tx: MpscSender<Message<()>>,
    pub sender_tx: MpscSender<Message<ResultBatch>>,
    pub state_source: Box<dyn SiteStateSource>,
    pub config: Arc<SiteConfigTable>,
}

impl Checker {
    pub fn run(self, commands: Receiver<Message<()>>) {
        let client_id = ClientId::current_thread();
        let _ = self.sender_tx.send(Message::RegisterClient(client_id.clone()));

        for msg in commands {
            match msg {
                Message::ProcessData(()) => self.run_cycle(),
                Message::StopExecution => {
                    let _ = self.sender_tx.send(Message::DeregisterClient(client_id));
                    return;
                }
                Message::ForceStopExecution => return,
                Message::RegisterClient(_) | Message::DeregisterClient(_) => {}
            }
        }
    }

    fn run_cycle(&self) {
        self.discovery_done.clear();
        if self.discoverer_tx.send(Message::ProcessData(())).is_err() {
            return;
        }
        self.discovery_done.wait();

        let sites = self.inventory.snapshot();
        if sites.is_empty() {
            return;
        }

        let states = match self.query_states(&sites) {
            Some(states) => states,
            None => {
                tracing::error!("state query failed fatally; initiating shutdown");
                self.stop.signal();
                return;
            }
        };

        let state_batch: ResultBatch = sites
            .iter()
            .zip(states.iter())
            .map(|(site, state)| ResultItem {
                site: site.name.clone(),
                key: state_key(&site.name),
                value: state.as_str().to_string(),
                trace: None,
            })
            .collect();
        let _ = self.sender_tx.send(Message::ProcessData(state_batch));

        std::thread::sleep(SETTLE_DELAY);

        let started: Vec<&Site> = sites
            .iter()
            .zip(states.iter())
            .filter(|(_, state)| **state == SiteState::Started)
            .map(|(site, _)| site)
            .collect();
        if started.is_empty() {
            return;
        }

        let probe_batch = self.run_probes(&started);
        let _ = self.sender_tx.send(Message::ProcessData(probe_batch));
    }

    /// Returns `None` if any site's state query returned a fatal error
    /// (spec §4.5: "if any result is an error object ... do NOT proceed").
    fn query_states(&self, sites: &[Site]) -> Option<Vec<SiteState>> {
        let state_source = self.state_source.as_ref();
        std::thread::scope(|scope| {
            let handles: Vec<_> = sites.iter().map(|site| scope.spawn(|| state_source.state(&site.name))).collect();
            let mut states = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.join().expect("state query worker panicked") {
                    Ok(state) => states.push(state),
                    Err(err) => {
                        tracing::error!(%err, "fatal state query failure");
                        return None;
                    }
                }
            }
            Some(states)
        })
    }

    fn run_probes(&self, sites: &[&Site]) -> ResultBatch {
        let config = self.config.as_ref();
        std::thread::scope(|scope| {
            let handles: Vec<_> = sites.iter().map(|site| scope.spawn(|| probe_one(site, config))).collect();
            handles.into_iter().map(|h| h.join().expect("probe worker panicked")).collect()
        })
    }
}

fn probe_one(site: &Site, config: &SiteConfigTable) -> ResultItem {
    let binding = site.preferred_binding();
    let hostnames = site.normalized_hostnames();
    let cfg = config.get(&hostnames);

    let plan = match iiswatch_types::probe::parse_probe_plan(
        &cfg.path,
        &binding.protocol,
        binding.normalized_host(),
        &binding.port,
    ) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::error!(%err, site = %site.name, "invalid probe plan");
            return ResultItem {
                site: site.name.clone(),
                key: probe_key_for(site),
                value: ProbeStatus::ErrFailed.as_str().to_string(),
                trace: None,
            };
        }
    };

    let pin = binding
        .normalized_address()
        .parse()
        .ok()
        .and_then(|ip| binding.port.parse().ok().map(|port| SocketAddr::new(ip, port)))
        .map(|addr| (binding.normalized_host(), addr));

    let outcome = ProbeEngine::run(&plan, cfg, pin);
    ResultItem {
        site: site.name.clone(),
        key: probe_key_for(site),
        value: outcome.status.as_str().to_string(),
        trace: outcome.trace,
    }
}

/// Uses the binding's fields verbatim: normalization (`*`/`""` substitution)
/// applies only to the actual network request, not to the reported
/// coordinates (spec §8 scenario 4, §3).
fn probe_key_for(site: &Site) -> String {
    let binding = site.preferred_binding();
    let hostnames = site.normalized_hostnames();
    let allhosts: Vec<String> = hostnames.into_iter().collect();
    probe_key(&binding.protocol, &binding.host, &binding.port, &binding.address, &allhosts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiswatch_types::Binding;

    #[test]
    fn probe_key_matches_the_concrete_quoting_scenario() {
        let site = Site::new(
            "S",
            true,
            vec![Binding::new("1.2.3.4", "443", "a", "https"), Binding::new("1.2.3.4", "80", "b", "http")],
            "https",
            Some("a"),
        );
        assert_eq!(probe_key_for(&site), "iis.site.probe[https,a,443,1.2.3.4,\"a,b\"]");
    }
}
