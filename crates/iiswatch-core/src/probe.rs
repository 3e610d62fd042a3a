//! The Probe Engine: per-site HTTP/HTTPS liveness checks (spec §4.3, §6).

use std::io::Read;
use std::net::SocketAddr;
use std::time::Duration;

use iiswatch_config::SiteConfig;
use iiswatch_types::{ProbePlan, ProbeStatus, ProbeStep};
use rand::Rng;

/// `v4`/`v6` both false, or both true, means "either family" (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpResolve {
    V4Only,
    V6Only,
    Any,
}

impl IpResolve {
    pub fn from_config(cfg: &SiteConfig) -> Self {
        match (cfg.v4, cfg.v6) {
            (true, false) => IpResolve::V4Only,
            (false, true) => IpResolve::V6Only,
            _ => IpResolve::Any,
        }
    }
}

/// Outcome of one probe cycle: the classified status plus an optional
/// transport trace (headers and informational text only, never the body —
/// spec §4.3).
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub trace: Option<Vec<u8>>,
}

pub struct ProbeEngine;

impl ProbeEngine {
    /// Runs one site's full probe plan. `pin` is an optional DNS-pin
    /// `(host, SocketAddr)`, resolved by the caller from the site's
    /// preferred binding and `nameservers`/`RESOLVE` configuration.
    pub fn run(plan: &ProbePlan, cfg: &SiteConfig, pin: Option<(&str, SocketAddr)>) -> ProbeOutcome {
        let delay = if cfg.delay == 0 { 0 } else { rand::rng().random_range(0..=cfg.delay) };
        std::thread::sleep(Duration::from_secs(delay));

        let resolve = IpResolve::from_config(cfg);
        let timeout = Duration::from_secs(cfg.timeout);
        let mut trace: Option<Vec<u8>> = cfg.verbose.then(Vec::new);

        let client = match build_client(cfg, resolve, timeout, pin) {
            Ok(c) => c,
            Err(_) => return ProbeOutcome { status: ProbeStatus::ErrFailed, trace },
        };

        for step in plan {
            if let Some(buf) = trace.as_mut() {
                buf.extend_from_slice(format!("GET {}\n", step.url).as_bytes());
            }
            match probe_one_step(&client, step, trace.as_mut()) {
                ProbeStatus::Ok => continue,
                other => return ProbeOutcome { status: other, trace },
            }
        }
        ProbeOutcome { status: ProbeStatus::Ok, trace }
    }
}

/// `nameservers` (a bare DNS-server override) has no reqwest equivalent
/// without a custom `Resolve` implementation and is accepted in config but
/// not wired up here; `pin` (the `RESOLVE`-style `host:port:address`
/// override) is honored via `ClientBuilder::resolve`. See DESIGN.md.
fn build_client(
    cfg: &SiteConfig,
    resolve: IpResolve,
    timeout: Duration,
    pin: Option<(&str, SocketAddr)>,
) -> Result<reqwest::blocking::Client, reqwest::Error> {
    let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
    builder = match resolve {
        IpResolve::V4Only => builder.local_address(Some(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))),
        IpResolve::V6Only => builder.local_address(Some(std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED))),
        IpResolve::Any => builder,
    };
    if let Some((host, addr)) = pin {
        builder = builder.resolve(host, addr);
    }
    if let Some(ca_path) = &cfg.ca {
        if let Ok(pem) = std::fs::read(ca_path) {
            if let Ok(cert) = reqwest::Certificate::from_pem(&pem) {
                builder = builder.add_root_certificate(cert);
            }
        }
    }
    builder.build()
}

fn probe_one_step(client: &reqwest::blocking::Client, step: &ProbeStep, trace: Option<&mut Vec<u8>>) -> ProbeStatus {
    let response = match client.get(&step.url).send() {
        Ok(r) => r,
        Err(err) if err.is_timeout() => return ProbeStatus::ErrTimeout,
        Err(_) => return ProbeStatus::ErrFailed,
    };

    if let Some(buf) = trace {
        buf.extend_from_slice(format!("status {}\n", response.status()).as_bytes());
        for (name, value) in response.headers() {
            buf.extend_from_slice(format!("{name}: {value:?}\n").as_bytes());
        }
    }

    if response.status().as_u16() >= 400 {
        return ProbeStatus::ErrWebappProblem;
    }

    let charset = content_type_charset(response.headers().get(reqwest::header::CONTENT_TYPE));
    let body = match decode_body(response, charset) {
        Some(body) => body,
        None => return ProbeStatus::ErrWebappProblem,
    };

    if let Some(re) = &step.body_regex {
        if !re.is_match(&body) {
            return ProbeStatus::ErrWebappProblem;
        }
    } else if let Some(re) = &step.nobody_regex {
        if re.is_match(&body) {
            return ProbeStatus::ErrWebappProblem;
        }
    }

    ProbeStatus::Ok
}

fn content_type_charset(header: Option<&reqwest::header::HeaderValue>) -> &'static encoding_rs::Encoding {
    let raw = header.and_then(|v| v.to_str().ok()).unwrap_or("");
    raw.split(';')
        .find_map(|part| part.trim().strip_prefix("charset="))
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8)
}

/// Decodes per the declared charset, falling back to ISO-8859-1 on a
/// malformed sequence; a second failure is a webapp problem (spec §4.3).
fn decode_body(mut response: reqwest::blocking::Response, charset: &'static encoding_rs::Encoding) -> Option<String> {
    let mut bytes = Vec::new();
    response.read_to_end(&mut bytes).ok()?;

    let (decoded, _, had_errors) = charset.decode(&bytes);
    if !had_errors {
        return Some(decoded.into_owned());
    }
    let (fallback, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&bytes);
    if had_errors {
        return None;
    }
    Some(fallback.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iiswatch_types::probe::parse_probe_plan;

    fn cfg() -> SiteConfig {
        SiteConfig { delay: 0, timeout: 2, ..SiteConfig::default() }
    }

    #[test]
    fn ip_resolve_defaults_to_any_when_both_set_or_both_unset() {
        assert_eq!(IpResolve::from_config(&SiteConfig { v4: false, v6: false, ..SiteConfig::default() }), IpResolve::Any);
        assert_eq!(IpResolve::from_config(&SiteConfig { v4: true, v6: true, ..SiteConfig::default() }), IpResolve::Any);
        assert_eq!(IpResolve::from_config(&SiteConfig { v4: true, v6: false, ..SiteConfig::default() }), IpResolve::V4Only);
    }

    #[test]
    fn failing_connection_yields_err_failed() {
        let plan = parse_probe_plan(r#"[{"path":"/","body":null}]"#, "http", "127.0.0.1", "1").unwrap();
        let outcome = ProbeEngine::run(&plan, &cfg(), None);
        assert_eq!(outcome.status, ProbeStatus::ErrFailed);
    }

    /// Spawns a one-shot tiny_http server on an ephemeral port that replies
    /// once with `status`/`body`, then returns its address.
    fn one_shot_server(status: u16, body: &'static str) -> std::net::SocketAddr {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
        });
        addr
    }

    #[test]
    fn matching_body_regex_yields_ok() {
        let addr = one_shot_server(200, "status: healthy");
        let plan = parse_probe_plan(
            r#"[{"path":"/","body":"healthy"}]"#,
            "http",
            &addr.ip().to_string(),
            &addr.port().to_string(),
        )
        .unwrap();
        let outcome = ProbeEngine::run(&plan, &cfg(), None);
        assert_eq!(outcome.status, ProbeStatus::Ok);
    }

    #[test]
    fn non_matching_body_regex_yields_webapp_problem() {
        let addr = one_shot_server(200, "status: down");
        let plan = parse_probe_plan(
            r#"[{"path":"/","body":"healthy"}]"#,
            "http",
            &addr.ip().to_string(),
            &addr.port().to_string(),
        )
        .unwrap();
        let outcome = ProbeEngine::run(&plan, &cfg(), None);
        assert_eq!(outcome.status, ProbeStatus::ErrWebappProblem);
    }

    #[test]
    fn error_status_yields_webapp_problem_before_any_body_check() {
        let addr = one_shot_server(500, "irrelevant");
        let plan =
            parse_probe_plan(r#"[{"path":"/","body":null}]"#, "http", &addr.ip().to_string(), &addr.port().to_string())
                .unwrap();
        let outcome = ProbeEngine::run(&plan, &cfg(), None);
        assert_eq!(outcome.status, ProbeStatus::ErrWebappProblem);
    }
}
