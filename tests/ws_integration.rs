use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use bitunix_api_client::auth::{Clock, RandomSource, Signer, StaticCredentials, sign_ws_login};
use bitunix_api_client::error::{BitunixError, ErrorKind, WsOperation};
use bitunix_api_client::futures::ws::{
    KlineInterval, KlinePriceType, PrivateWsClient, PublicWsClient, SessionConfig, SessionState,
    WsConfig, WsSession,
};

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

enum Control {
    Send(String),
    Kill,
}

/// One accepted connection, controllable from the test.
struct Conn {
    control: mpsc::UnboundedSender<Control>,
}

impl Conn {
    fn send(&self, frame: impl Into<String>) {
        let _ = self.control.send(Control::Send(frame.into()));
    }

    fn kill(&self) {
        let _ = self.control.send(Control::Kill);
    }
}

/// In-process venue stub: sends a welcome frame, answers logins and
/// records every frame the client writes, tagged with the connection index.
struct MockVenue {
    url: String,
    frames: Arc<Mutex<Vec<(usize, Value)>>>,
    conns: mpsc::UnboundedReceiver<Conn>,
    acceptor: JoinHandle<()>,
}

impl MockVenue {
    async fn start(accept_login: bool) -> Self {
        Self::start_with(accept_login, Duration::ZERO).await
    }

    /// Like [`MockVenue::start`], holding back the welcome frame for `welcome_delay`.
    async fn start_with(accept_login: bool, welcome_delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let (conn_tx, conns) = mpsc::unbounded_channel();

        let recorded = Arc::clone(&frames);
        let acceptor = tokio::spawn(async move {
            let mut index = 0;
            while let Ok((stream, _)) = listener.accept().await {
                let (control, control_rx) = mpsc::unbounded_channel();
                if conn_tx.send(Conn { control }).is_err() {
                    return;
                }
                tokio::spawn(serve(
                    stream,
                    index,
                    Arc::clone(&recorded),
                    accept_login,
                    welcome_delay,
                    control_rx,
                ));
                index += 1;
            }
        });

        Self {
            url: format!("ws://{addr}"),
            frames,
            conns,
            acceptor,
        }
    }

    fn config(&self) -> WsConfig {
        WsConfig::builder()
            .url(self.url.clone())
            .reconnect_delay(Duration::from_millis(50))
            .build()
    }

    /// Stop accepting; later dials are refused.
    fn stop_accepting(&self) {
        self.acceptor.abort();
    }

    async fn next_conn(&mut self) -> Conn {
        tokio::time::timeout(WAIT, self.conns.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("acceptor stopped")
    }

    async fn try_next_conn(&mut self, within: Duration) -> Option<Conn> {
        tokio::time::timeout(within, self.conns.recv()).await.ok().flatten()
    }

    fn frames(&self) -> Vec<(usize, Value)> {
        self.frames.lock().unwrap().clone()
    }

    fn frames_on(&self, conn: usize) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|(i, _)| *i == conn)
            .map(|(_, v)| v)
            .collect()
    }

    async fn wait_for<F>(&self, what: &str, done: F) -> Vec<(usize, Value)>
    where
        F: Fn(&[(usize, Value)]) -> bool,
    {
        let deadline = Instant::now() + WAIT;
        loop {
            let frames = self.frames();
            if done(&frames) {
                return frames;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {what}: {frames:?}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    index: usize,
    frames: Arc<Mutex<Vec<(usize, Value)>>>,
    accept_login: bool,
    welcome_delay: Duration,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut tx, mut rx) = ws.split();
    tokio::time::sleep(welcome_delay).await;
    let welcome = json!({"op": "connect", "data": {"result": true}}).to_string();
    if tx.send(Message::Text(welcome.into())).await.is_err() {
        return;
    }

    let mut controlled = true;
    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                    frames.lock().unwrap().push((index, value.clone()));
                    if value["op"] == "login" {
                        let reply = json!({"op": "login", "data": {"result": accept_login}}).to_string();
                        let _ = tx.send(Message::Text(reply.into())).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            ctrl = control.recv(), if controlled => match ctrl {
                Some(Control::Send(frame)) => {
                    let _ = tx.send(Message::Text(frame.into())).await;
                }
                Some(Control::Kill) => return,
                None => controlled = false,
            },
        }
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        1_732_178_884_994
    }
}

struct FixedRandom;

impl RandomSource for FixedRandom {
    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, BitunixError> {
        Ok(vec![0xab; n])
    }
}

fn signer() -> Signer {
    Signer::new(Arc::new(StaticCredentials::new("key", "secret")))
        .with_clock(Arc::new(FixedClock))
        .with_random_source(Arc::new(FixedRandom))
}

fn balance_push(available: usize) -> String {
    json!({
        "ch": "balance",
        "ts": 1732178884994u64,
        "data": {"coin": "USDT", "available": available.to_string(), "frozen": "0"}
    })
    .to_string()
}

fn op_count(frames: &[(usize, Value)], conn: usize, op: &str) -> usize {
    frames
        .iter()
        .filter(|(i, v)| *i == conn && v["op"] == op)
        .count()
}

async fn recv<T>(sub: &mut bitunix_api_client::futures::ws::Subscription<T>) -> T {
    tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for a push")
        .expect("subscription closed")
}

#[tokio::test]
async fn test_private_login_frame() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = PrivateWsClient::with_config(signer(), venue.config());

    client.connect().await.unwrap();
    let _conn = venue.next_conn().await;
    assert_eq!(client.state(), SessionState::Live);

    let frames = venue.frames_on(0);
    assert_eq!(frames[0]["op"], "login");
    let expected = sign_ws_login("key", "secret", 1_732_178_884, &[0xab; 32]);
    assert_eq!(frames[0]["args"][0], serde_json::to_value(&expected).unwrap());

    client.subscribe_balance().await.unwrap();
    venue
        .wait_for("balance subscribe", |f| {
            f.iter().any(|(_, v)| *v == json!({"op": "subscribe", "args": [{"ch": "balance"}]}))
        })
        .await;
    client.close().await;
}

#[tokio::test]
async fn test_rejected_login() {
    init_tracing();
    let venue = MockVenue::start(false).await;
    let client = PrivateWsClient::with_config(signer(), venue.config());

    let err = client.connect().await.unwrap_err();
    assert!(err.is(ErrorKind::WebSocket));
    assert_eq!(err.websocket_error().unwrap().operation, WsOperation::Login);
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_write_requires_connect() {
    let venue = MockVenue::start(true).await;
    let session = WsSession::new(SessionConfig::new(venue.url.clone()));

    let err = session.write("{}".into()).await.unwrap_err();
    assert_eq!(err.websocket_error().unwrap().operation, WsOperation::Write);

    session.connect().await.unwrap();
    session.write(r#"{"op":"hello"}"#.into()).await.unwrap();
    venue.wait_for("hello", |f| op_count(f, 0, "hello") == 1).await;

    session.close().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.write("{}".into()).await.is_err());
}

#[tokio::test]
async fn test_heartbeat_pings() {
    init_tracing();
    let venue = MockVenue::start(true).await;
    let config = WsConfig::builder()
        .url(venue.url.clone())
        .heartbeat_interval(Duration::from_millis(50))
        .build();
    let client = PublicWsClient::with_config(config);

    client.connect().await.unwrap();
    let frames = venue.wait_for("two pings", |f| op_count(f, 0, "ping") >= 2).await;
    let ping = frames.iter().find(|(_, v)| v["op"] == "ping").unwrap();
    assert!(ping.1["ping"].is_u64());

    client.close().await;
}

#[tokio::test]
async fn test_balance_routing_survives_garbage() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = Arc::new(PrivateWsClient::with_config(signer(), venue.config()));
    client.connect().await.unwrap();
    let conn = venue.next_conn().await;

    let mut balance = client.subscribe_balance().await.unwrap();
    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });

    conn.send("definitely not json");
    conn.send(r#"{"op":"pong","pong":1}"#);
    conn.send(balance_push(42));

    let push = recv(&mut balance).await;
    assert_eq!(push.data.coin, "USDT");
    assert_eq!(push.data.available, 42.0);

    client.close().await;
    assert!(stream.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_slow_subscriber_does_not_block_others() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = Arc::new(PrivateWsClient::with_config(signer(), venue.config()));
    client.connect().await.unwrap();
    let conn = venue.next_conn().await;

    let mut fast = client.subscribe_balance().await.unwrap();
    let mut slow = client.subscribe_balance().await.unwrap();
    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });

    for i in 0..15 {
        conn.send(balance_push(i));
        let push = recv(&mut fast).await;
        assert_eq!(push.data.available, i as f64);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut buffered = Vec::new();
    while let Some(push) = slow.try_recv() {
        buffered.push(push.data.available);
    }
    assert_eq!(buffered, (0..10).map(|i| i as f64).collect::<Vec<_>>());

    client.close().await;
    assert!(stream.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_reconnect_replays_subscriptions() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = Arc::new(PrivateWsClient::with_config(signer(), venue.config()));
    client.connect().await.unwrap();
    let first = venue.next_conn().await;

    let mut balance = client.subscribe_balance().await.unwrap();
    let _positions = client.subscribe_positions().await.unwrap();
    let _orders = client.subscribe_orders().await.unwrap();
    venue
        .wait_for("three subscribes", |f| op_count(f, 0, "subscribe") == 3)
        .await;

    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });
    first.kill();

    let second = venue.next_conn().await;
    venue
        .wait_for("replayed subscribes", |f| op_count(f, 1, "subscribe") == 3)
        .await;

    let replayed = venue.frames_on(1);
    assert_eq!(replayed[0]["op"], "login");
    let mut channels: Vec<String> = replayed
        .iter()
        .filter(|v| v["op"] == "subscribe")
        .map(|v| v["args"][0]["ch"].as_str().unwrap().to_string())
        .collect();
    channels.sort();
    assert_eq!(channels, vec!["balance", "order", "position"]);

    second.send(balance_push(7));
    assert_eq!(recv(&mut balance).await.data.available, 7.0);
    assert_eq!(client.state(), SessionState::Live);

    client.close().await;
    assert!(stream.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_close_during_backoff_is_terminal() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let config = WsConfig::builder()
        .url(venue.url.clone())
        .reconnect_delay(Duration::from_secs(10))
        .build();
    let client = Arc::new(PrivateWsClient::with_config(signer(), config));
    client.connect().await.unwrap();
    let conn = venue.next_conn().await;

    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });
    conn.kill();
    tokio::time::sleep(Duration::from_millis(100)).await;

    client.close().await;
    let result = tokio::time::timeout(Duration::from_secs(2), stream)
        .await
        .expect("stream did not stop after close")
        .unwrap();
    assert!(result.is_ok());
    assert!(venue.try_next_conn(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn test_close_during_connect_is_terminal() {
    init_tracing();
    let mut venue = MockVenue::start_with(true, Duration::from_millis(300)).await;
    let config = WsConfig::builder()
        .url(venue.url.clone())
        .heartbeat_interval(Duration::from_millis(20))
        .build();
    let client = Arc::new(PublicWsClient::with_config(config));

    let dialer = Arc::clone(&client);
    let connect = tokio::spawn(async move { dialer.connect().await });
    let _conn = venue.next_conn().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close().await;

    let result = tokio::time::timeout(Duration::from_secs(2), connect)
        .await
        .expect("connect did not stop after close")
        .unwrap();
    assert!(result.is_err());
    assert_eq!(client.state(), SessionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(op_count(&venue.frames(), 0, "ping"), 0);
    assert!(client.stream().await.is_ok());
}

#[tokio::test]
async fn test_stream_before_connect_fails() {
    let venue = MockVenue::start(true).await;
    let client = PublicWsClient::with_config(venue.config());

    let err = tokio::time::timeout(Duration::from_secs(1), client.stream())
        .await
        .expect("stream should not dial by itself")
        .unwrap_err();
    assert_eq!(err.websocket_error().unwrap().operation, WsOperation::Read);
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_zero_heartbeat_interval_still_pings() {
    let venue = MockVenue::start(true).await;
    let config = WsConfig::builder()
        .url(venue.url.clone())
        .heartbeat_interval(Duration::ZERO)
        .build();
    let client = PublicWsClient::with_config(config);

    client.connect().await.unwrap();
    venue.wait_for("pings", |f| op_count(f, 0, "ping") >= 2).await;
    client.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unsubscribe_and_subscribe_survive_reconnect() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = Arc::new(PrivateWsClient::with_config(signer(), venue.config()));
    client.connect().await.unwrap();
    let first = venue.next_conn().await;

    let old = client.subscribe_balance().await.unwrap();
    let leaving = Arc::clone(&client);
    let joining = Arc::clone(&client);
    let unsubscribe = tokio::spawn(async move { leaving.unsubscribe_balance(old.id()).await });
    let subscribe = tokio::spawn(async move { joining.subscribe_balance().await });
    unsubscribe.await.unwrap().unwrap();
    let mut balance = subscribe.await.unwrap().unwrap();

    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });
    first.kill();

    let second = venue.next_conn().await;
    venue
        .wait_for("balance resubscribe", |f| op_count(f, 1, "subscribe") == 1)
        .await;
    second.send(balance_push(3));
    assert_eq!(recv(&mut balance).await.data.available, 3.0);

    client.close().await;
    assert!(stream.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let config = WsConfig::builder()
        .url(venue.url.clone())
        .max_reconnect_attempts(2)
        .reconnect_delay(Duration::from_millis(20))
        .build();
    let client = Arc::new(PublicWsClient::with_config(config));
    client.connect().await.unwrap();
    let conn = venue.next_conn().await;

    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });
    venue.stop_accepting();
    tokio::time::sleep(Duration::from_millis(50)).await;
    conn.kill();

    let err = tokio::time::timeout(WAIT, stream)
        .await
        .expect("stream did not give up")
        .unwrap()
        .unwrap_err();
    assert_eq!(err.websocket_error().unwrap().operation, WsOperation::Dial);
    assert_eq!(client.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_kline_subscribe_route_unsubscribe() {
    init_tracing();
    let mut venue = MockVenue::start(true).await;
    let client = Arc::new(PublicWsClient::with_config(venue.config()));
    client.connect().await.unwrap();
    let conn = venue.next_conn().await;

    let mut klines = client
        .subscribe_kline("BTCUSDT", KlineInterval::Min1, KlinePriceType::Market)
        .await
        .unwrap();
    venue
        .wait_for("kline subscribe", |f| {
            f.iter().any(|(_, v)| {
                *v == json!({"op": "subscribe", "args": [{"symbol": "BTCUSDT", "ch": "market_kline_1min"}]})
            })
        })
        .await;

    let reader = Arc::clone(&client);
    let stream = tokio::spawn(async move { reader.stream().await });
    conn.send(
        json!({
            "ch": "market_kline_1min",
            "symbol": "BTCUSDT",
            "ts": 1732178884994u64,
            "data": {"o": "60000", "c": "60100.5", "h": "60200", "l": "59900", "b": "12.5", "q": "751256.25"}
        })
        .to_string(),
    );
    let kline = recv(&mut klines).await;
    assert_eq!(kline.symbol, "BTCUSDT");
    assert_eq!(kline.close, 60100.5);
    assert_eq!(kline.interval, KlineInterval::Min1);

    client.unsubscribe_kline(klines.id()).await.unwrap();
    venue
        .wait_for("kline unsubscribe", |f| {
            f.iter().any(|(_, v)| {
                *v == json!({"op": "unsubscribe", "args": [{"symbol": "BTCUSDT", "ch": "market_kline_1min"}]})
            })
        })
        .await;

    client.close().await;
    assert!(stream.await.unwrap().is_ok());
}
