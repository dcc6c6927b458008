//! Newline-delimited JSON protocol. One request object per line, one reply
//! line per request. Connections that `listen` also receive pushed
//! `{"notice": ...}` lines between replies.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, BoxStream, SelectAll};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::{EngineError, ValidationError};
use crate::limits::MAX_LINE_BYTES;
use crate::model::AvailabilityRequest;
use crate::notify::{Notice, NotifyHub};
use crate::observability;
use crate::service::AvailabilityService;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Check(AvailabilityRequest),
    Invalidate { hotel_id: String },
    Stats,
    Listen { hotel_id: String },
    ListenAdmin,
}

impl Request {
    fn op(&self) -> &'static str {
        match self {
            Request::Check(_) => "check",
            Request::Invalidate { .. } => "invalidate",
            Request::Stats => "stats",
            Request::Listen { .. } => "listen",
            Request::ListenAdmin => "listen_admin",
        }
    }
}

/// Reply failure: `(kind, message)`.
type Failure = (&'static str, String);

/// Notice subscriptions held by one connection.
#[derive(Default)]
struct Subscriptions {
    hotels: HashSet<Ulid>,
    admin: bool,
    streams: SelectAll<BoxStream<'static, Notice>>,
}

// ── Connection ───────────────────────────────────────────

pub async fn process_connection<S>(
    socket: S,
    service: Arc<AvailabilityService>,
    hub: Arc<NotifyHub>,
) -> Result<(), LinesCodecError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut subs = Subscriptions::default();

    let result = loop {
        tokio::select! {
            line = framed.next() => {
                let line = match line {
                    None => break Ok(()),
                    Some(Ok(line)) => line,
                    // the framed stream ends after a decode error, so reply and hang up
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        record_request("unknown", "error");
                        let reply = failure_reply(("bad_request", format!("line exceeds {MAX_LINE_BYTES} bytes")));
                        break framed.send(reply.to_string()).await;
                    }
                    Some(Err(e)) => break Err(e),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = handle_line(&line, &service, &hub, &mut subs).await;
                if let Err(e) = framed.send(reply.to_string()).await {
                    break Err(e);
                }
            }
            Some(notice) = subs.streams.next(), if !subs.streams.is_empty() => {
                let line = json!({ "notice": notice });
                if let Err(e) = framed.send(line.to_string()).await {
                    break Err(e);
                }
            }
        }
    };

    let Subscriptions { hotels, streams, .. } = subs;
    drop(streams);
    for hotel_id in &hotels {
        hub.prune(hotel_id);
    }
    result
}

async fn handle_line(
    line: &str,
    service: &AvailabilityService,
    hub: &NotifyHub,
    subs: &mut Subscriptions,
) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            record_request("unknown", "error");
            return failure_reply(("bad_request", e.to_string()));
        }
    };
    let op = request.op();
    debug!(op, "request");
    match handle(request, service, hub, subs).await {
        Ok(reply) => {
            record_request(op, "ok");
            reply
        }
        Err(failure) => {
            record_request(op, "error");
            failure_reply(failure)
        }
    }
}

async fn handle(
    request: Request,
    service: &AvailabilityService,
    hub: &NotifyHub,
    subs: &mut Subscriptions,
) -> Result<Value, Failure> {
    match request {
        Request::Check(req) => {
            let outcome = service.check_availability(&req).await.map_err(engine_failure)?;
            Ok(json!({
                "ok": true,
                "from_cache": outcome.from_cache,
                "result": outcome.result,
            }))
        }
        Request::Invalidate { hotel_id } => {
            let hotel_id = parse_hotel_id(&hotel_id)?;
            let removed = service.invalidate(hotel_id);
            Ok(json!({ "ok": true, "removed": removed }))
        }
        Request::Stats => Ok(json!({ "ok": true, "cache": service.cache_stats() })),
        Request::Listen { hotel_id } => {
            let hotel_id = parse_hotel_id(&hotel_id)?;
            if subs.hotels.insert(hotel_id) {
                subs.streams.push(notice_stream(hub.subscribe(hotel_id)));
            }
            Ok(json!({ "ok": true, "listening": hotel_id.to_string() }))
        }
        Request::ListenAdmin => {
            if !subs.admin {
                subs.admin = true;
                subs.streams.push(notice_stream(hub.subscribe_admin()));
            }
            Ok(json!({ "ok": true, "listening": "admin" }))
        }
    }
}

/// Turn a broadcast receiver into a stream. A lagging listener skips what it
/// missed rather than disconnecting.
fn notice_stream(rx: broadcast::Receiver<Notice>) -> BoxStream<'static, Notice> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notice) => return Some((notice, rx)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "listener lagged, notices dropped"),
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

// ── Helpers ──────────────────────────────────────────────

fn parse_hotel_id(raw: &str) -> Result<Ulid, Failure> {
    Ulid::from_string(raw).map_err(|_| engine_failure(ValidationError::InvalidHotelId(raw.to_string()).into()))
}

fn engine_failure(e: EngineError) -> Failure {
    (e.kind(), e.to_string())
}

fn failure_reply((kind, message): Failure) -> Value {
    json!({ "ok": false, "error": { "kind": kind, "message": message } })
}

fn record_request(op: &'static str, status: &'static str) {
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
}
