//! hyper 1 adapter for [`Gateway`]: one HTTP/1.1 connection per task,
//! request bodies buffered, record streams forwarded frame by frame.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use relay_gateway::{Gateway, ProtocolError, RelayBody, StreamError, protocol_error_response};
use relay_store::DocumentStore;
use tokio::net::TcpListener;

pub type ResponseBody = UnsyncBoxBody<Bytes, StreamError>;

/// How long open connections get to finish once shutdown begins.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections on `listener` until `shutdown` resolves, then drain
/// in-flight connections.
pub async fn serve<S, F>(listener: TcpListener, gateway: Gateway<S>, shutdown: F)
where
    S: DocumentStore,
    F: Future<Output = ()>,
{
    let http = http1::Builder::new();
    let graceful = GracefulShutdown::new();
    let mut shutdown = pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let gateway = gateway.clone();
                let conn = http.serve_connection(io, service_fn(move |req| {
                    let gateway = gateway.clone();
                    async move { Ok::<_, hyper::Error>(handle(&gateway, req).await) }
                }));
                let fut = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        tracing::debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                drop(listener);
                break;
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => tracing::info!("shutdown complete"),
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
            tracing::warn!("shutdown timed out after {}s", DRAIN_TIMEOUT.as_secs());
        }
    }
}

/// Buffer the request body and hand the request to the gateway.
pub async fn handle<S: DocumentStore>(
    gateway: &Gateway<S>,
    req: Request<Incoming>,
) -> Response<ResponseBody> {
    let (parts, body) = req.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let response = protocol_error_response(&ProtocolError::BodyRead(e.to_string()));
            return response.map(into_http_body);
        }
    };
    gateway
        .handle(Request::from_parts(parts, bytes))
        .await
        .map(into_http_body)
}

/// A streamed body that yields an error makes hyper abort the connection,
/// so the client never sees a clean end of stream. Records produced before
/// the error are flushed first.
pub fn into_http_body(body: RelayBody) -> ResponseBody {
    match body {
        RelayBody::Full(bytes) => Full::new(bytes)
            .map_err(|never| match never {})
            .boxed_unsync(),
        RelayBody::Stream(records) => {
            let frames = records.then(flush_before_error).map_ok(Frame::data);
            StreamBody::new(frames).boxed_unsync()
        }
    }
}

/// hyper discards its unflushed write buffer (headers included) when a body
/// errors. Returning `Pending` once lets it flush before the error arrives.
async fn flush_before_error(item: Result<Bytes, StreamError>) -> Result<Bytes, StreamError> {
    if item.is_err() {
        tokio::task::yield_now().await;
    }
    item
}
