//! The Sender: serializes result batches to the downstream collector or to
//! standard output, with drain-on-shutdown semantics (spec §4.6, §5).

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use iiswatch_metrics::{push_batch, MetricPoint};
use iiswatch_types::{ClientId, Message};

/// One queued result: `(site-name, metric-key, value, optional-trace)`
/// (spec §3).
#[derive(Debug, Clone)]
pub struct ResultItem {
    pub site: String,
    pub key: String,
    pub value: String,
    pub trace: Option<Vec<u8>>,
}

pub type ResultBatch = Vec<ResultItem>;

/// The two sink modes a Sender can run in (spec §4.6, §6).
pub enum Sink {
    /// Write each tuple to standard output; a trace buffer is decoded as
    /// ASCII with invalid bytes dropped.
    Print,
    /// Push each batch to the downstream collector in one call.
    Send { addr: String, port: u16, timeout: Duration },
}

impl Sink {
    fn publish(&self, batch: &ResultBatch) {
        match self {
            Sink::Print => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for item in batch {
                    let _ = writeln!(out, "{}\t{}\t{}", item.site, item.key, item.value);
                    if let Some(trace) = &item.trace {
                        // encoding_rs has no standalone 7-bit ASCII codec; the WHATWG
                        // standard aliases "ascii" to WINDOWS_1252, so decode with that
                        // and drop anything outside the ASCII range ourselves.
                        let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(trace);
                        let cleaned: String = decoded.chars().filter(|c| c.is_ascii()).collect();
                        let _ = writeln!(out, "{cleaned}");
                    }
                }
            }
            Sink::Send { addr, port, timeout } => {
                let points: Vec<MetricPoint> = batch
                    .iter()
                    .map(|item| MetricPoint { host: item.site.clone(), key: item.key.clone(), value: item.value.clone() })
                    .collect();
                if let Err(err) = push_batch(addr, *port, &points, *timeout) {
                    tracing::error!(%err, "failed to push metric batch to collector");
                }
            }
        }
    }
}

pub struct Sender {
    pub sink: Sink,
}

impl Sender {
    pub fn run(self, commands: Receiver<Message<ResultBatch>>) {
        let mut clients: BTreeSet<ClientId> = BTreeSet::new();
        let mut stopping = false;

        loop {
            if stopping && clients.is_empty() {
                // Non-blocking drain: publish whatever is already queued, then exit.
                loop {
                    match commands.try_recv() {
                        Ok(Message::ProcessData(batch)) => self.sink.publish(&batch),
                        Ok(Message::ForceStopExecution) => return,
                        Ok(_) => {}
                        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
                    }
                }
            }

            let msg = match commands.recv() {
                Ok(msg) => msg,
                Err(_) => return,
            };
            match msg {
                Message::ProcessData(batch) => self.sink.publish(&batch),
                Message::RegisterClient(id) => {
                    clients.insert(id);
                }
                Message::DeregisterClient(id) => {
                    clients.remove(&id);
                }
                Message::StopExecution => stopping = true,
                Message::ForceStopExecution => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn item(site: &str) -> ResultItem {
        ResultItem { site: site.into(), key: "k".into(), value: "v".into(), trace: None }
    }

    #[test]
    fn drains_queued_batches_after_last_client_deregisters() {
        let (tx, rx) = channel();
        tx.send(Message::RegisterClient(ClientId::new("checker"))).unwrap();
        tx.send(Message::StopExecution).unwrap();
        tx.send(Message::ProcessData(vec![item("late-site")])).unwrap();
        tx.send(Message::DeregisterClient(ClientId::new("checker"))).unwrap();
        drop(tx);

        let sender = Sender { sink: Sink::Print };
        sender.run(rx);
    }

    #[test]
    fn print_sink_decodes_a_trace_dropping_non_ascii_bytes() {
        let batch = vec![ResultItem {
            site: "site1".into(),
            key: "iis.site.probe[http,h,80,1.2.3.4,h]".into(),
            value: "STATUS_ERR_WEBAPP_PROBLEM".into(),
            trace: Some(b"GET /\nstatus 500\n\x85caf\xe9 ok".to_vec()),
        }];
        // Must not panic on a trace containing non-ASCII bytes.
        Sink::Print.publish(&batch);
    }

    #[test]
    fn force_stop_exits_immediately_without_draining() {
        let (tx, rx) = channel();
        tx.send(Message::ForceStopExecution).unwrap();
        tx.send(Message::ProcessData(vec![item("never-seen")])).unwrap();
        drop(tx);

        let sender = Sender { sink: Sink::Print };
        sender.run(rx);
    }
}
