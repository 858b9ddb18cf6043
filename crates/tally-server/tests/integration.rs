//! End-to-end tests against a live server over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tally_core::{Counter, CounterId};
use tally_server::{ServerConfig, ServerHandle, TallyServer};
use tally_settings::BroadcastScope;
use tally_store::{CounterRepo, Database};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(300);

struct Harness {
    handle: ServerHandle,
    repo: CounterRepo,
    id: CounterId,
}

impl Harness {
    async fn start(scope: BroadcastScope, report_not_found: bool) -> Self {
        let repo = CounterRepo::new(Database::in_memory().unwrap());
        let id = CounterId::from_raw("c1");
        let _ = repo
            .create_with(&Counter {
                count: 5,
                all_time_high: 5,
                player_count: 2,
                ..Counter::new(id.clone())
            })
            .unwrap();

        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            broadcast_scope: scope,
            report_not_found,
            ..ServerConfig::default()
        };
        let handle = TallyServer::new(config, Arc::new(repo.clone())).start().await.unwrap();
        Self { handle, repo, id }
    }

    /// A server with every setting at its default apart from the bind address.
    async fn with_defaults() -> Self {
        let defaults = ServerConfig::default();
        Self::start(defaults.broadcast_scope, defaults.report_not_found).await
    }

    /// Connect and wait until the server has registered the connection.
    async fn connect(&self) -> Client {
        let before = self.handle.connections().connection_count().await;
        let url = format!("ws://{}/ws", self.handle.local_addr());
        let (client, _) = connect_async(url).await.unwrap();
        self.wait_for_connections(before + 1).await;
        client
    }

    async fn wait_for_connections(&self, expected: usize) {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while self.handle.connections().connection_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count never settled");
    }

    async fn stored(&self) -> Counter {
        self.repo.fetch_by_id(&self.id).unwrap().unwrap()
    }
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::text(frame.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> Value {
    tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                Message::Ping(_) | Message::Pong(_) => {}
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

async fn assert_silent(client: &mut Client) {
    let got = tokio::time::timeout(QUIET_PERIOD, client.next()).await;
    assert!(got.is_err(), "expected no frame, got {got:?}");
}

#[tokio::test]
async fn scenario_broadcasts_exact_payloads() {
    let h = Harness::with_defaults().await;
    let mut client = h.connect().await;

    let steps = [
        ("increment", json!({"count": 6, "allTimeHigh": 6, "playerCount": 2})),
        ("reset", json!({"count": 0, "resetCount": 1})),
        ("firstLoad", json!({"count": 0, "allTimeHigh": 6, "playerCount": 1})),
        ("regret", json!({"count": 0, "regretCount": 1})),
    ];
    for (event, data) in steps {
        send(&mut client, json!({"event": event, "id": "c1"})).await;
        assert_eq!(
            recv(&mut client).await,
            json!({"event": "counterUpdated", "counterId": "c1", "data": data}),
            "after {event}"
        );
    }

    let stored = h.stored().await;
    assert_eq!(stored.all_time_high, 6);
    assert_eq!(stored.reset_count, 1);
    assert_eq!(stored.regret_count, 1);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn array_frames_are_accepted() {
    let h = Harness::with_defaults().await;
    let mut client = h.connect().await;

    send(&mut client, json!(["increment", "c1"])).await;
    let frame = recv(&mut client).await;
    assert_eq!(frame["data"]["count"], 6);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn default_settings_reach_bystanders() {
    let h = Harness::with_defaults().await;
    let mut actor = h.connect().await;
    let mut bystander = h.connect().await;

    send(&mut actor, json!({"event": "increment", "id": "c1"})).await;
    let expected = json!({"event": "counterUpdated", "counterId": "c1", "data": {"count": 6, "allTimeHigh": 6, "playerCount": 2}});
    assert_eq!(recv(&mut actor).await, expected);
    assert_eq!(recv(&mut bystander).await, expected);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn topic_scope_reaches_subscribers_only() {
    let h = Harness::start(BroadcastScope::Topic, false).await;
    let mut watcher = h.connect().await;
    let mut actor = h.connect().await;
    let mut bystander = h.connect().await;

    send(&mut watcher, json!({"event": "subscribe", "id": "c1"})).await;
    let snapshot = recv(&mut watcher).await;
    assert_eq!(snapshot["event"], "counterSnapshot");
    assert_eq!(snapshot["data"]["count"], 5);

    send(&mut actor, json!({"event": "increment", "id": "c1"})).await;
    assert_eq!(recv(&mut actor).await["data"]["count"], 6);
    assert_eq!(recv(&mut watcher).await["data"]["count"], 6);
    assert_silent(&mut bystander).await;

    send(&mut watcher, json!({"event": "unsubscribe", "id": "c1"})).await;
    // Unsubscribe has no reply; give it a moment to land before the next update.
    tokio::time::sleep(Duration::from_millis(100)).await;
    send(&mut actor, json!({"event": "regret", "id": "c1"})).await;
    assert_eq!(recv(&mut actor).await["data"]["regretCount"], 1);
    assert_silent(&mut watcher).await;
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn all_scope_reaches_every_connection() {
    let h = Harness::start(BroadcastScope::All, false).await;
    let mut actor = h.connect().await;
    let mut bystander = h.connect().await;

    send(&mut actor, json!({"event": "firstLoad", "id": "c1"})).await;
    let expected = json!({"event": "counterUpdated", "counterId": "c1", "data": {"count": 5, "allTimeHigh": 5, "playerCount": 3}});
    assert_eq!(recv(&mut actor).await, expected);
    assert_eq!(recv(&mut bystander).await, expected);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn unknown_counter_is_a_silent_no_op() {
    let h = Harness::start(BroadcastScope::All, false).await;
    let mut actor = h.connect().await;
    let mut bystander = h.connect().await;

    send(&mut actor, json!({"event": "increment", "id": "ghost"})).await;
    assert_silent(&mut actor).await;
    assert_silent(&mut bystander).await;
    assert_eq!(h.stored().await.count, 5);
    assert_eq!(h.repo.list().unwrap().len(), 1);

    // The connection is still usable.
    send(&mut actor, json!({"event": "increment", "id": "c1"})).await;
    assert_eq!(recv(&mut actor).await["data"]["count"], 6);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn unknown_counter_reported_to_initiator_when_enabled() {
    let h = Harness::start(BroadcastScope::All, true).await;
    let mut actor = h.connect().await;
    let mut bystander = h.connect().await;

    send(&mut actor, json!({"event": "reset", "id": "ghost"})).await;
    let frame = recv(&mut actor).await;
    assert_eq!(frame["event"], "error");
    assert_eq!(frame["data"]["code"], "COUNTER_NOT_FOUND");
    assert_silent(&mut bystander).await;
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn malformed_frames_get_errors_and_connection_survives() {
    let h = Harness::with_defaults().await;
    let mut client = h.connect().await;

    client.send(Message::text("not json".to_string())).await.unwrap();
    assert_eq!(recv(&mut client).await["data"]["code"], "INVALID_JSON");

    send(&mut client, json!({"event": "explode", "id": "c1"})).await;
    assert_eq!(recv(&mut client).await["data"]["code"], "UNKNOWN_EVENT");

    send(&mut client, json!({"event": "increment"})).await;
    assert_eq!(recv(&mut client).await["data"]["code"], "INVALID_ID");

    client.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    assert_eq!(recv(&mut client).await["data"]["code"], "INVALID_EVENT");

    assert_eq!(h.stored().await.count, 5);
    send(&mut client, json!({"event": "increment", "id": "c1"})).await;
    assert_eq!(recv(&mut client).await["data"]["count"], 6);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn concurrent_clients_lose_no_increments() {
    let h = Harness::with_defaults().await;
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(h.connect().await);
    }

    let senders: Vec<_> = clients
        .into_iter()
        .map(|mut client| {
            tokio::spawn(async move {
                for _ in 0..20 {
                    send(&mut client, json!({"event": "increment", "id": "c1"})).await;
                }
                client
            })
        })
        .collect();
    let _clients: Vec<Client> = futures::future::join_all(senders)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    tokio::time::timeout(RECV_TIMEOUT, async {
        while h.stored().await.count != 105 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("increments were lost");

    let stored = h.stored().await;
    assert_eq!(stored.all_time_high, 105);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn disconnect_unregisters_without_touching_counters() {
    let h = Harness::with_defaults().await;
    let mut client = h.connect().await;
    send(&mut client, json!({"event": "increment", "id": "c1"})).await;
    let _ = recv(&mut client).await;

    client.close(None).await.unwrap();
    drop(client);
    h.wait_for_connections(0).await;
    assert_eq!(h.stored().await.count, 6);
    h.handle.shutdown(None).await;
}

#[tokio::test]
async fn health_reports_live_connections() {
    let h = Harness::with_defaults().await;
    let _client = h.connect().await;

    let mut stream = TcpStream::connect(h.handle.local_addr()).await.unwrap();
    let request = format!(
        "GET /health HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        h.handle.local_addr()
    );
    tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes()).await.unwrap();
    let mut raw = String::new();
    let _ = tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200"), "got: {raw}");
    let body = raw.split("\r\n\r\n").nth(1).unwrap();
    let parsed: Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["status"], "OK");
    assert_eq!(parsed["connections"], 1);
    h.handle.shutdown(None).await;
}
