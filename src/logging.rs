use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Header, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

/// Response header carrying the request's [`RequestId`].
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A unique identifier for a particular request, used to tie log lines together.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// The next unused ID. Wraps around to zero after `usize::MAX`.
    fn next() -> Self {
        static NEXT_REQUEST_ID: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// When a request arrived, and the ID it was given.
#[derive(Debug, Copy, Clone)]
struct Arrival {
    id: RequestId,
    at: Instant,
}

impl Arrival {
    /// The arrival of the given request, recorded on first use.
    fn of<'r>(req: &'r Request<'_>) -> &'r Self {
        req.local_cache(|| Arrival {
            id: RequestId::next(),
            at: Instant::now(),
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(&Arrival::of(req).id)
    }
}

/// Logs every request and response with its ID and latency, and tags the response with the ID.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Accepting votes on {scheme}://{}:{}",
            config.address, config.port
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = Arrival::of(req).id;
        let (method, uri) = (req.method(), req.uri());
        match req.client_ip() {
            Some(ip) => info!("->req{id} {method} {uri} from {ip}"),
            None => info!("->req{id} {method} {uri}"),
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let arrival = Arrival::of(req);
        res.set_header(Header::new(REQUEST_ID_HEADER, arrival.id.to_string()));

        let route = req
            .route()
            .map(|route| match &route.name {
                Some(name) => format!("{name} ({})", route.uri),
                None => route.uri.to_string(),
            })
            .unwrap_or_else(|| "no route".to_string());
        let elapsed = arrival.at.elapsed().as_millis();
        let line = format!("<-rsp{} {} {route} in {elapsed}ms", arrival.id, res.status());
        match res.status().class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down, no further votes will be accepted");
    }
}
