use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    Data, Orbit, Request, Response, Rocket,
};

/// Per-request bookkeeping, stored in the request's local cache.
#[derive(Debug, Copy, Clone)]
struct RequestMark {
    id: usize,
    received: Instant,
}

impl RequestMark {
    /// Number the request. Wraps back to zero past `usize::MAX`.
    fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            received: Instant::now(),
        }
    }
}

/// The request URI with any ballot token replaced, safe to write to logs.
pub fn redacted_uri(req: &Request<'_>) -> String {
    redact_path(req.uri().path().as_str(), req.uri().query().map(|q| q.as_str()))
}

fn redact_path(path: &str, query: Option<&str>) -> String {
    let mut redact_next = false;
    let segments = path
        .split('/')
        .map(|segment| {
            let out = if redact_next && !segment.is_empty() {
                "<redacted>"
            } else {
                segment
            };
            redact_next = segment == "ballots";
            out
        })
        .collect::<Vec<_>>();
    let path = segments.join("/");
    match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

/// Logs launch, shutdown, and every request/response pair with its latency.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Accepting votes on {protocol}://{ip}:{port}");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let RequestMark { id, .. } = *req.local_cache(RequestMark::next);
        let method = req.method();
        info!("->req{id} {method} {}", redacted_uri(req));
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let RequestMark { id, received } = *req.local_cache(RequestMark::next);
        let code = res.status();
        let route = req
            .route()
            .map(|r| match r.name {
                Some(ref name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            })
            .unwrap_or_else(|| "unmatched".to_string());
        let millis = received.elapsed().as_millis();
        let log_msg = format!("<-rsp{id} {code} {route} in {millis}ms");
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, finishing in-flight requests...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_tokens_are_redacted() {
        assert_eq!(
            redact_path("/elections/senior-caucus/ballots/abcDEF123", None),
            "/elections/senior-caucus/ballots/<redacted>"
        );
        assert_eq!(
            redact_path("/elections/ballots/open", None),
            "/elections/ballots/<redacted>"
        );
    }

    #[test]
    fn other_paths_are_untouched() {
        assert_eq!(
            redact_path("/elections/by-id/6520f1", Some("shuffle=true")),
            "/elections/by-id/6520f1?shuffle=true"
        );
        assert_eq!(redact_path("/date", None), "/date");
    }
}
