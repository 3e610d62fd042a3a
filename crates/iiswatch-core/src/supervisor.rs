//! The Supervisor: startup ordering, the periodic tick loop, worker
//! liveness monitoring, and shutdown coordination (spec §4.7, §5).

use std::sync::mpsc::Sender as MpscSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use iiswatch_types::Message;

use crate::latch::Latch;
use crate::sender::ResultBatch;

/// The Supervisor's tick loop must wake at least this often regardless of
/// the configured interval, so worker death is detected promptly
/// (`THREADSET_CHECK_INTERVAL`, spec §5).
pub const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// A started worker: its command queue and the thread it runs on.
pub struct Worker<T> {
    name: &'static str,
    tx: MpscSender<Message<T>>,
    join: JoinHandle<()>,
}

impl<T> Worker<T> {
    pub fn new(name: &'static str, tx: MpscSender<Message<T>>, join: JoinHandle<()>) -> Self {
        Self { name, tx, join }
    }

    fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Sends `ForceStopExecution` if any worker has already died (to avoid
    /// waiting on a dead client), else the cooperative `StopExecution`
    /// (spec §4.7).
    fn shut_down(self, any_died: bool) {
        let msg = if any_died { Message::ForceStopExecution } else { Message::StopExecution };
        if self.tx.send(msg).is_err() {
            tracing::warn!(worker = self.name, "command queue already closed at shutdown");
        }
        if let Err(err) = self.join.join() {
            tracing::error!(worker = self.name, ?err, "worker thread panicked during shutdown");
        }
    }
}

/// Tick loop state (spec §4.7): `sleeping` -> (interval elapsed) ->
/// `dispatching` -> `sleeping`; any state -> (stop requested or worker
/// died) -> `stopped`.
enum TickOutcome {
    Stopped,
    Continue,
}

pub struct Supervisor {
    pub interval: Duration,
    pub stop: Arc<Latch>,
    pub discoverer: Worker<()>,
    pub sender: Worker<ResultBatch>,
    pub checker: Worker<()>,
}

impl Supervisor {
    /// Runs the tick loop until the stop event is raised (by a worker death
    /// or an external caller, e.g. a service-stop or keyboard-interrupt
    /// handler), then tears everything down.
    pub fn run(self) {
        let mut last_tick = Instant::now() - self.interval;
        loop {
            match self.tick_once(&mut last_tick) {
                TickOutcome::Stopped => break,
                TickOutcome::Continue => {}
            }
        }
        self.shut_down();
    }

    fn tick_once(&self, last_tick: &mut Instant) -> TickOutcome {
        if self.stop.is_signaled() {
            return TickOutcome::Stopped;
        }
        if self.any_worker_died() {
            tracing::error!("worker died; initiating shutdown");
            self.stop.signal();
            return TickOutcome::Stopped;
        }

        let elapsed = last_tick.elapsed();
        if elapsed < self.interval {
            let remaining = self.interval - elapsed;
            std::thread::sleep(remaining.min(LIVENESS_CHECK_INTERVAL));
            return TickOutcome::Continue;
        }

        *last_tick = Instant::now();
        if self.checker.tx.send(Message::ProcessData(())).is_err() {
            tracing::error!("checker queue closed; initiating shutdown");
            self.stop.signal();
            return TickOutcome::Stopped;
        }
        TickOutcome::Continue
    }

    fn any_worker_died(&self) -> bool {
        !self.discoverer.is_alive() || !self.sender.is_alive() || !self.checker.is_alive()
    }

    /// Reverse of startup order (spec §4.7): Checker first, then Sender,
    /// then Discoverer, so the Sender gets a chance to observe the
    /// Checker's deregistration before its own command arrives.
    fn shut_down(self) {
        let any_died = self.any_worker_died();
        self.checker.shut_down(any_died);
        self.sender.shut_down(any_died);
        self.discoverer.shut_down(any_died);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn noop_worker<T: Send + 'static>(name: &'static str) -> Worker<T> {
        let (tx, rx) = channel::<Message<T>>();
        let join = std::thread::spawn(move || {
            for msg in rx {
                if matches!(msg, Message::StopExecution | Message::ForceStopExecution) {
                    return;
                }
            }
        });
        Worker::new(name, tx, join)
    }

    #[test]
    fn shutdown_joins_every_worker() {
        let supervisor = Supervisor {
            interval: Duration::from_secs(300),
            stop: Arc::new(Latch::new()),
            discoverer: noop_worker("discoverer"),
            sender: noop_worker("sender"),
            checker: noop_worker("checker"),
        };
        supervisor.stop.signal();
        supervisor.run();
    }
}
