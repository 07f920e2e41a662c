//! Per-request logging.
//!
//! Every request gets a [`RequestId`] on arrival. The fairing logs one line when
//! a request comes in and one when its response goes out, with the time taken;
//! route handlers take the ID as a guard to tag their own outcome lines.
//!
//! Query strings are never logged: submissions carry capability tokens there.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

use crate::api::BASE;

/// Identifies one request in the log, and remembers when it arrived.
#[derive(Debug, Copy, Clone)]
pub struct RequestId {
    id: usize,
    received: Instant,
}

impl RequestId {
    /// The next ID, wrapping back to zero after `usize::MAX`.
    fn assign() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            received: Instant::now(),
        }
    }

    /// Time since the request arrived.
    pub fn elapsed(&self) -> Duration {
        self.received.elapsed()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "req{}", self.id)
    }
}

/// The ID of the request being handled, assigned on first use.
fn request_id<'r>(req: &'r Request<'_>) -> &'r RequestId {
    req.local_cache(RequestId::assign)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(request_id(req))
    }
}

/// Logs every request and response.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let protocol = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Survey API listening on {protocol}://{}:{}{BASE}",
            config.address, config.port
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = request_id(req);
        info!("{id} -> {} {}", req.method(), req.uri().path());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = request_id(req);
        let status = res.status();
        let handler = req
            .route()
            .and_then(|route| route.name.as_deref())
            .unwrap_or("no route");
        let line = format!(
            "{id} <- {status} from {handler} in {}ms",
            id.elapsed().as_millis()
        );
        match status.class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
    }
}
