use std::{
    sync::{
        Arc,
        OnceLock,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    time::Duration,
};

use futures_util::{
    SinkExt,
    StreamExt,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::{
    net::{
        TcpListener,
        TcpStream,
    },
    sync::{
        mpsc::{
            UnboundedReceiver,
            UnboundedSender,
            unbounded_channel,
        },
        oneshot,
    },
};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        Message as WsMessage,
        handshake::server::{
            ErrorResponse,
            Request,
            Response,
        },
        http::{
            HeaderValue,
            header::SEC_WEBSOCKET_PROTOCOL,
        },
        protocol::{
            CloseFrame,
            frame::coding::CloseCode,
        },
    },
};
use wamp_client::{
    core::{
        close::CloseReason,
        id::Id,
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::Uri,
    },
    peer::{
        Peer,
        PeerBuilder,
        PeerConfig,
        PeerObserver,
        RpcCall,
        SessionState,
        new_web_socket_peer,
    },
    serializer::serializer::SerializerType,
    transport::web_socket_transport::WebSocketConfig,
};

const REALM: &str = "com.wamp.test";

#[derive(Debug, PartialEq)]
enum SessionEvent {
    Established(Id),
    Ended(String),
}

struct ChannelObserver {
    events_tx: UnboundedSender<SessionEvent>,
}

impl PeerObserver for ChannelObserver {
    fn session_established(&self, session_id: Id, _: &Dictionary) {
        self.events_tx
            .send(SessionEvent::Established(session_id))
            .ok();
    }

    fn session_ended(&self, reason: &str) {
        self.events_tx
            .send(SessionEvent::Ended(reason.to_owned()))
            .ok();
    }
}

fn create_peer(
    web_socket: WebSocketConfig,
) -> (Peer, UnboundedReceiver<SessionEvent>) {
    let (events_tx, events_rx) = unbounded_channel();
    let peer = PeerBuilder::new(PeerConfig::new(Uri::try_from(REALM).unwrap()))
        .observer(Arc::new(ChannelObserver { events_tx }))
        .build_web_socket(web_socket)
        .unwrap();
    (peer, events_rx)
}

/// Accepts a single WebSocket connection, selecting the first sub-protocol the client offers.
async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
            let protocol = request
                .headers()
                .get(SEC_WEBSOCKET_PROTOCOL)
                .and_then(|protocols| protocols.to_str().ok())
                .and_then(|protocols| protocols.split(',').next())
                .unwrap_or_default()
                .trim()
                .to_owned();
            response.headers_mut().insert(
                SEC_WEBSOCKET_PROTOCOL,
                HeaderValue::from_str(&protocol).unwrap(),
            );
            Ok(response)
        },
    )
    .await
    .unwrap()
}

async fn next_json(stream: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        match stream.next().await.unwrap().unwrap() {
            WsMessage::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            WsMessage::Binary(_) => panic!("expected a text frame"),
            _ => (),
        }
    }
}

async fn send_json(stream: &mut WebSocketStream<TcpStream>, value: serde_json::Value) {
    stream
        .send(WsMessage::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn next_msgpack(stream: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        match stream.next().await.unwrap().unwrap() {
            WsMessage::Binary(data) => return rmp_serde::from_slice(&data).unwrap(),
            WsMessage::Text(_) => panic!("expected a binary frame"),
            _ => (),
        }
    }
}

async fn send_msgpack(stream: &mut WebSocketStream<TcpStream>, value: serde_json::Value) {
    stream
        .send(WsMessage::Binary(rmp_serde::to_vec(&value).unwrap().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn joins_realm_and_calls_procedure_over_json() {
    test_utils::setup::setup_test_environment();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = tokio::spawn(async move {
        let mut stream = accept(&listener).await;

        let hello = next_json(&mut stream).await;
        assert_eq!(hello[0], json!(1));
        assert_eq!(hello[1], json!(REALM));
        assert_eq!(
            hello[2]["roles"],
            json!({ "callee": {}, "caller": {}, "publisher": {}, "subscriber": {} })
        );
        send_json(&mut stream, json!([2, 1234, { "roles": { "dealer": {} } }])).await;

        let call = next_json(&mut stream).await;
        assert_eq!(call, json!([48, 1, {}, "com.test.add", [1, 2]]));
        send_json(&mut stream, json!([50, 1, {}, [3]])).await;

        send_json(&mut stream, json!([6, {}, "wamp.close.system_shutdown"])).await;
        let goodbye = next_json(&mut stream).await;
        assert_eq!(goodbye, json!([6, {}, "wamp.close.goodbye_and_out"]));
    });

    let (peer, mut events_rx) = create_peer(WebSocketConfig::new(format!("ws://{addr}")));
    peer.connect().unwrap();
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Established(Id::try_from(1234).unwrap()))
    );

    let (result_tx, result_rx) = oneshot::channel();
    peer.call(
        Uri::try_from("com.test.add").unwrap(),
        RpcCall {
            arguments: List::from_iter([Value::Integer(1), Value::Integer(2)]),
            arguments_keyword: Dictionary::default(),
            ..Default::default()
        },
        move |result| {
            result_tx.send(result).ok();
        },
    );
    assert_eq!(
        result_rx.await.unwrap().unwrap().arguments,
        List::from_iter([Value::Integer(3)])
    );

    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Ended("wamp.close.system_shutdown".to_owned()))
    );
    assert_eq!(peer.state(), SessionState::Closed);
    router.await.unwrap();
}

#[tokio::test]
async fn negotiates_message_pack() {
    test_utils::setup::setup_test_environment();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = tokio::spawn(async move {
        let mut stream = accept(&listener).await;

        let hello = next_msgpack(&mut stream).await;
        assert_eq!(hello[1], json!(REALM));
        send_msgpack(&mut stream, json!([2, 99, {}])).await;

        let goodbye = next_msgpack(&mut stream).await;
        assert_eq!(goodbye, json!([6, {}, "wamp.close.normal"]));
        send_msgpack(&mut stream, json!([6, {}, "wamp.close.goodbye_and_out"])).await;
    });

    let mut web_socket = WebSocketConfig::new(format!("ws://{addr}"));
    web_socket.serializers = Vec::from_iter([SerializerType::MessagePack]);
    let (peer, mut events_rx) = create_peer(web_socket);
    peer.connect().unwrap();
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Established(Id::try_from(99).unwrap()))
    );

    peer.disconnect(CloseReason::Normal);
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Ended("wamp.close.goodbye_and_out".to_owned()))
    );
    router.await.unwrap();
}

#[tokio::test]
async fn reports_close_frame_from_router() {
    test_utils::setup::setup_test_environment();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = tokio::spawn(async move {
        let mut stream = accept(&listener).await;
        next_json(&mut stream).await;
        send_json(&mut stream, json!([2, 5, {}])).await;
        stream
            .close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "going away".into(),
            }))
            .await
            .unwrap();
    });

    let (peer, mut events_rx) = create_peer(WebSocketConfig::new(format!("ws://{addr}")));
    peer.connect().unwrap();
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Established(Id::try_from(5).unwrap()))
    );
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Ended("going away".to_owned()))
    );
    router.await.unwrap();
}

/// Reconnects the peer the first time its session ends.
struct ReconnectingObserver {
    events_tx: UnboundedSender<SessionEvent>,
    peer: OnceLock<Peer>,
    reconnected: AtomicBool,
}

impl PeerObserver for ReconnectingObserver {
    fn session_established(&self, session_id: Id, _: &Dictionary) {
        self.events_tx
            .send(SessionEvent::Established(session_id))
            .ok();
    }

    fn session_ended(&self, reason: &str) {
        self.events_tx
            .send(SessionEvent::Ended(reason.to_owned()))
            .ok();
        if self.reconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(Err(err)) = self.peer.get().map(|peer| peer.connect()) {
            self.events_tx
                .send(SessionEvent::Ended(format!("failed to reconnect: {err:#}")))
                .ok();
        }
    }
}

async fn reconnect_while_router_closes_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        next_json(&mut first).await;
        send_json(&mut first, json!([2, 5, {}])).await;
        send_json(&mut first, json!([6, {}, "wamp.close.system_shutdown"])).await;
        first.close(None).await.ok();

        let mut second = accept(&listener).await;
        let hello = next_json(&mut second).await;
        assert_eq!(hello[0], json!(1));
        send_json(&mut second, json!([2, 6, {}])).await;
        let goodbye = next_json(&mut second).await;
        assert_eq!(goodbye, json!([6, {}, "wamp.close.normal"]));
        send_json(&mut second, json!([6, {}, "wamp.close.goodbye_and_out"])).await;
    });

    let (events_tx, mut events_rx) = unbounded_channel();
    let observer = Arc::new(ReconnectingObserver {
        events_tx,
        peer: OnceLock::new(),
        reconnected: AtomicBool::new(false),
    });
    let peer = PeerBuilder::new(PeerConfig::new(Uri::try_from(REALM).unwrap()))
        .observer(observer.clone())
        .build_web_socket(WebSocketConfig::new(format!("ws://{addr}")))
        .unwrap();
    observer.peer.set(peer.clone()).unwrap();

    peer.connect().unwrap();
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Established(Id::try_from(5).unwrap()))
    );
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Ended("wamp.close.system_shutdown".to_owned()))
    );
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Established(Id::try_from(6).unwrap()))
    );

    // Give the first connection time to finish closing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(peer.state(), SessionState::Established(Id::try_from(6).unwrap()));
    assert_matches::assert_matches!(events_rx.try_recv(), Err(_));

    peer.disconnect(CloseReason::Normal);
    assert_eq!(
        events_rx.recv().await,
        Some(SessionEvent::Ended("wamp.close.goodbye_and_out".to_owned()))
    );
    router.await.unwrap();
}

#[tokio::test]
async fn reconnected_session_survives_close_of_previous_connection() {
    test_utils::setup::setup_test_environment();

    // The order in which the old connection sees the router's close is not deterministic.
    for _ in 0..10 {
        reconnect_while_router_closes_connection().await;
    }
}

#[tokio::test]
async fn connection_failure_ends_session() {
    test_utils::setup::setup_test_environment();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (peer, mut events_rx) = create_peer(WebSocketConfig::new(format!("ws://{addr}")));
    peer.connect().unwrap();
    assert_matches::assert_matches!(events_rx.recv().await, Some(SessionEvent::Ended(_)));
    assert_eq!(peer.state(), SessionState::Closed);
}

#[test]
fn connect_requires_runtime() {
    test_utils::setup::setup_test_environment();

    let peer = new_web_socket_peer(
        PeerConfig::new(Uri::try_from(REALM).unwrap()),
        WebSocketConfig::new("ws://127.0.0.1:1"),
    )
    .unwrap();
    assert_matches::assert_matches!(peer.connect(), Err(_));
    assert_eq!(peer.state(), SessionState::Closed);
}

#[test]
fn rejects_config_without_serializers() {
    let mut web_socket = WebSocketConfig::new("ws://127.0.0.1:1");
    web_socket.serializers.clear();
    assert_matches::assert_matches!(
        new_web_socket_peer(PeerConfig::new(Uri::try_from(REALM).unwrap()), web_socket),
        Err(_)
    );
}
