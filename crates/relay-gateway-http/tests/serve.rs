use std::net::SocketAddr;

use relay_gateway::{Gateway, GatewayConfig};
use relay_store::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PASSWORD: &str = "hunter2";

struct Server {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

async fn start() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = Gateway::new(MemoryStore::new(), GatewayConfig::with_password(PASSWORD)).unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(relay_gateway_http::serve(listener, gateway, async {
        let _ = stopped.await;
    }));
    Server { addr, stop, task }
}

/// Send one request on a fresh connection and read until the server closes it.
async fn exchange(addr: SocketAddr, method: &str, target: &str, bearer: Option<&str>, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut head = format!("{method} {target} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n");
    if let Some(bearer) = bearer {
        head.push_str(&format!("bearer: {bearer}\r\n"));
    }
    if !body.is_empty() {
        head.push_str("content-type: application/json\r\n");
    }
    head.push_str(&format!("content-length: {}\r\n\r\n{body}", body.len()));
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

// ── Buffered operations ─────────────────────────────────────────

#[tokio::test]
async fn envelopes_travel_over_http() {
    let server = start().await;

    let inserted = exchange(
        server.addr,
        "POST",
        "/?op=insertOne&coll=items",
        Some(PASSWORD),
        r#"[{"_id":"a","n":1}]"#,
    )
    .await;
    assert!(inserted.starts_with("HTTP/1.1 200 OK"), "{inserted}");
    assert!(inserted.contains("content-type: application/json"));
    assert!(inserted.ends_with(r#"{"$result":{"acknowledged":true,"insertedId":"a"}}"#));

    let counted = exchange(server.addr, "GET", "/?op=estimatedDocumentCount&coll=items", Some(PASSWORD), "").await;
    assert!(counted.ends_with(r#"{"$result":1}"#), "{counted}");
}

#[tokio::test]
async fn rejects_without_credential() {
    let server = start().await;
    let response = exchange(server.addr, "POST", "/?op=findToArray&coll=items", None, "{}").await;
    assert!(response.starts_with("HTTP/1.1 401 Unauthorized"), "{response}");
    assert!(response.ends_with("Unauthorized"));
    assert!(!response.contains(PASSWORD));
}

// ── Streaming ───────────────────────────────────────────────────

#[tokio::test]
async fn find_stream_is_chunked() {
    let server = start().await;
    exchange(
        server.addr,
        "POST",
        "/?op=insertMany&coll=items",
        Some(PASSWORD),
        r#"[[{"_id":1},{"_id":2}]]"#,
    )
    .await;

    let response = exchange(server.addr, "POST", "/?op=findStream&coll=items", Some(PASSWORD), "{}").await;
    assert!(response.contains("content-type: application/x-ndjson"), "{response}");
    assert!(response.contains("transfer-encoding: chunked"));
    assert!(response.contains("{\"_id\":1}\n"));
    assert!(response.contains("{\"_id\":2}\n"));
    assert!(response.ends_with("0\r\n\r\n"));
}

// ── Shutdown ────────────────────────────────────────────────────

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let server = start().await;
    server.stop.send(()).unwrap();
    server.task.await.unwrap();
    assert!(TcpStream::connect(server.addr).await.is_err());
}
