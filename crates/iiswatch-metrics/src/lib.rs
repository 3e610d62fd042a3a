//! Downstream metrics push client (spec §4.6 "send" mode, §6).
//!
//! `spec.md` treats the wire format as an external collaborator ("the
//! downstream metrics protocol wire format ... taken as a capability the
//! Sender consumes"); this crate is the concrete, minimal capability that
//! satisfies it: one `{host,key,value}` triple per metric, one write per
//! batch, newline-delimited JSON over a plain TCP connection to the
//! collector.

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use serde::Serialize;

/// One point pushed to the collector.
#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub host: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("could not connect to collector at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write batch to collector: {0}")]
    Write(#[source] std::io::Error),
    #[error("could not serialize a metric point: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Pushes one batch of metric points to the collector in a single write.
///
/// Mirrors "the Sender publishes each `ProcessData` batch atomically (one
/// collector call per batch)" (spec §5): the whole newline-delimited
/// payload is assembled first and written with a single `write_all`.
pub fn push_batch(addr: &str, port: u16, points: &[MetricPoint], timeout: Duration) -> Result<(), PushError> {
    let target = format!("{addr}:{port}");
    let mut stream = TcpStream::connect(&target).map_err(|source| PushError::Connect { addr: target, source })?;
    stream.set_write_timeout(Some(timeout)).map_err(PushError::Write)?;

    let mut payload = String::new();
    for point in points {
        payload.push_str(&serde_json::to_string(point)?);
        payload.push('\n');
    }
    stream.write_all(payload.as_bytes()).map_err(PushError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn pushes_one_newline_delimited_batch_in_a_single_write() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = String::new();
            conn.read_to_string(&mut buf).ok();
            buf
        });

        let points = vec![
            MetricPoint { host: "site1".into(), key: "iis.site.state[Site1]".into(), value: "started".into() },
            MetricPoint { host: "site1".into(), key: "iis.site.probe[...]".into(), value: "STATUS_OK".into() },
        ];
        push_batch(&addr.ip().to_string(), addr.port(), &points, Duration::from_secs(5)).unwrap();

        let received = handle.join().unwrap();
        assert_eq!(received.lines().count(), 2);
        assert!(received.contains("iis.site.state[Site1]"));
    }
}
