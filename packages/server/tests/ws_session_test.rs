//! Integration tests running the full coordinator in-process and driving
//! it with real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use costream_server::{
    infrastructure::{
        Broadcaster, ConnectionRegistry, EvictFn, InMemoryDurableStore, InMemoryUserDirectory,
        InMemoryVerificationService, LivenessMonitor, SessionStore,
    },
    ui::state::AppState,
    usecase::{
        ChatUseCase, DisconnectUseCase, LifecycleUseCase, MembershipUseCase, ModerationUseCase,
        ProductionUseCase, SignalingUseCase,
    },
};
use costream_shared::time::SystemClock;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestApp {
    addr: SocketAddr,
    verification: Arc<InMemoryVerificationService>,
}

/// Boot the coordinator on an ephemeral port.
async fn spawn_app(heartbeat: Duration) -> TestApp {
    let registry = Arc::new(ConnectionRegistry::new());
    let store = Arc::new(SessionStore::new());
    let directory = Arc::new(InMemoryUserDirectory::accepting_anyone());
    let verification = Arc::new(InMemoryVerificationService::new());
    let durable = Arc::new(InMemoryDurableStore::new());
    let clock = Arc::new(SystemClock);
    let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

    let disconnect_usecase = Arc::new(DisconnectUseCase::new(
        store.clone(),
        registry.clone(),
        broadcaster.clone(),
    ));
    let state = Arc::new(AppState {
        registry: registry.clone(),
        store: store.clone(),
        directory: directory.clone(),
        lifecycle_usecase: Arc::new(LifecycleUseCase::new(
            store.clone(),
            broadcaster.clone(),
            clock.clone(),
        )),
        membership_usecase: Arc::new(MembershipUseCase::new(
            store.clone(),
            broadcaster.clone(),
            verification.clone(),
            directory.clone(),
            clock.clone(),
        )),
        chat_usecase: Arc::new(ChatUseCase::new(
            store.clone(),
            broadcaster.clone(),
            clock.clone(),
        )),
        moderation_usecase: Arc::new(ModerationUseCase::new(store.clone(), broadcaster.clone())),
        signaling_usecase: Arc::new(SignalingUseCase::new(store.clone(), broadcaster.clone())),
        production_usecase: Arc::new(ProductionUseCase::new(
            store.clone(),
            broadcaster.clone(),
            durable,
        )),
        disconnect_usecase: disconnect_usecase.clone(),
    });

    let evict: EvictFn = Arc::new(move |user_id, connection_id| {
        let disconnect = disconnect_usecase.clone();
        Box::pin(async move {
            disconnect.execute(&user_id, connection_id).await;
        })
    });
    LivenessMonitor::new(registry, heartbeat, evict).spawn();

    let app: Router = costream_server::ui::routes(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestApp { addr, verification }
}

async fn connect(app: &TestApp) -> WsClient {
    let (client, _) = connect_async(format!("ws://{}/ws", app.addr))
        .await
        .expect("websocket connect");
    client
}

async fn send(client: &mut WsClient, value: serde_json::Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

/// Receive the next text frame as JSON, skipping control frames.
async fn recv_event(client: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("transport error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("frame is not JSON");
        }
    }
}

/// Receive events until one of the given type arrives.
async fn recv_until(client: &mut WsClient, event_type: &str) -> serde_json::Value {
    loop {
        let event = recv_event(client).await;
        if event["type"] == event_type {
            return event;
        }
    }
}

/// Open a connection and authenticate it.
async fn authenticated_client(app: &TestApp, user_id: &str) -> WsClient {
    let mut client = connect(app).await;
    let established = recv_event(&mut client).await;
    assert_eq!(established["type"], "connection_established");
    send(
        &mut client,
        serde_json::json!({"type": "authenticate", "user_id": user_id}),
    )
    .await;
    let authenticated = recv_event(&mut client).await;
    assert_eq!(authenticated["type"], "authenticated");
    client
}

#[tokio::test]
async fn test_full_session_lifecycle_with_costar_viewer_and_chat() {
    // given: a host, a verified co-star and a viewer
    let app = spawn_app(Duration::from_secs(30)).await;
    app.verification
        .mark_verified("costar".to_string().try_into().unwrap())
        .await;
    let mut host = authenticated_client(&app, "host").await;

    // when: the host creates a session
    send(
        &mut host,
        serde_json::json!({"type": "create_stream", "title": "launch party"}),
    )
    .await;
    let created = recv_until(&mut host, "stream_created").await;
    let session_id = created["session"]["session_id"]
        .as_str()
        .expect("session id")
        .to_string();
    assert_eq!(created["session"]["status"], "created");

    // and: invites the co-star
    send(
        &mut host,
        serde_json::json!({"type": "invite_costar", "session_id": session_id, "user_id": "costar"}),
    )
    .await;
    recv_until(&mut host, "costar_invited").await;

    // and: the verified co-star joins on camera
    let mut costar = authenticated_client(&app, "costar").await;
    send(
        &mut costar,
        serde_json::json!({"type": "join_costar", "session_id": session_id}),
    )
    .await;
    let joined = recv_until(&mut costar, "joined_as_participant").await;
    assert_eq!(joined["user_id"], "costar");
    recv_until(&mut host, "joined_as_participant").await;

    // and: the host goes live and a viewer joins
    send(
        &mut host,
        serde_json::json!({"type": "start_stream", "session_id": session_id}),
    )
    .await;
    recv_until(&mut host, "stream_started").await;
    recv_until(&mut costar, "stream_started").await;

    let mut viewer = authenticated_client(&app, "viewer").await;
    send(
        &mut viewer,
        serde_json::json!({"type": "join_stream", "session_id": session_id}),
    )
    .await;
    let as_viewer = recv_until(&mut viewer, "joined_as_viewer").await;
    assert_eq!(as_viewer["session"]["current_viewers"], 1);
    let viewer_joined = recv_until(&mut host, "viewer_joined").await;
    assert_eq!(viewer_joined["user_id"], "viewer");

    // and: two chat messages are sent
    send(
        &mut host,
        serde_json::json!({"type": "chat_message", "session_id": session_id, "body": "first"}),
    )
    .await;
    send(
        &mut host,
        serde_json::json!({"type": "chat_message", "session_id": session_id, "body": "second"}),
    )
    .await;

    // then: the viewer sees them in accepted order
    let first = recv_until(&mut viewer, "chat_message").await;
    assert_eq!(first["message"]["body"], "first");
    let second = recv_until(&mut viewer, "chat_message").await;
    assert_eq!(second["message"]["body"], "second");

    // when: the host ends the stream
    send(
        &mut host,
        serde_json::json!({"type": "end_stream", "session_id": session_id}),
    )
    .await;

    // then: everyone present hears the end, with final analytics
    let ended = recv_until(&mut viewer, "stream_ended").await;
    assert_eq!(ended["reason"], "ended");
    assert_eq!(ended["analytics"]["total_messages"], 2);
    assert_eq!(ended["analytics"]["peak_viewers"], 1);
    recv_until(&mut costar, "stream_ended").await;
    recv_until(&mut host, "stream_ended").await;
}

#[tokio::test]
async fn test_unverified_costar_join_is_rejected() {
    // given: an invited but unverified user
    let app = spawn_app(Duration::from_secs(30)).await;
    let mut host = authenticated_client(&app, "host").await;
    send(
        &mut host,
        serde_json::json!({"type": "create_stream", "title": "vip only"}),
    )
    .await;
    let created = recv_until(&mut host, "stream_created").await;
    let session_id = created["session"]["session_id"].as_str().unwrap().to_string();
    send(
        &mut host,
        serde_json::json!({"type": "invite_costar", "session_id": session_id, "user_id": "bob"}),
    )
    .await;

    // when: bob tries to join on camera
    let mut bob = authenticated_client(&app, "bob").await;
    send(
        &mut bob,
        serde_json::json!({"type": "join_costar", "session_id": session_id}),
    )
    .await;

    // then: rejected with a stable code, and bob never becomes a participant
    let error = recv_until(&mut bob, "error").await;
    assert_eq!(error["code"], "verification_required");

    // bob can still watch from the audience
    send(
        &mut bob,
        serde_json::json!({"type": "join_stream", "session_id": session_id}),
    )
    .await;
    let joined = recv_until(&mut bob, "joined_as_viewer").await;
    assert_eq!(joined["session"]["participants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_operations_require_authentication() {
    // given: a connection that never authenticates
    let app = spawn_app(Duration::from_secs(30)).await;
    let mut client = connect(&app).await;
    recv_event(&mut client).await; // connection_established

    // when:
    send(
        &mut client,
        serde_json::json!({"type": "create_stream", "title": "nope"}),
    )
    .await;

    // then:
    let error = recv_until(&mut client, "error").await;
    assert_eq!(error["code"], "unauthenticated");
}

#[tokio::test]
async fn test_broadcasts_stay_inside_their_session() {
    // given: two independent sessions with one viewer in the first
    let app = spawn_app(Duration::from_secs(30)).await;
    let mut host_a = authenticated_client(&app, "host_a").await;
    send(
        &mut host_a,
        serde_json::json!({"type": "create_stream", "title": "session a"}),
    )
    .await;
    let session_a = recv_until(&mut host_a, "stream_created").await["session"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut host_b = authenticated_client(&app, "host_b").await;
    send(
        &mut host_b,
        serde_json::json!({"type": "create_stream", "title": "session b"}),
    )
    .await;
    let session_b = recv_until(&mut host_b, "stream_created").await["session"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut viewer = authenticated_client(&app, "viewer").await;
    send(
        &mut viewer,
        serde_json::json!({"type": "join_stream", "session_id": session_a}),
    )
    .await;
    recv_until(&mut viewer, "joined_as_viewer").await;

    // when: a message lands in session b, then one in session a
    send(
        &mut host_b,
        serde_json::json!({"type": "chat_message", "session_id": session_b, "body": "b only"}),
    )
    .await;
    recv_until(&mut host_b, "chat_message").await;
    send(
        &mut host_a,
        serde_json::json!({"type": "chat_message", "session_id": session_a, "body": "a only"}),
    )
    .await;

    // then: the viewer's next chat message is session a's
    let message = recv_until(&mut viewer, "chat_message").await;
    assert_eq!(message["message"]["body"], "a only");
    assert_eq!(message["session_id"], session_a);

    // and: nothing else arrives
    let silence =
        tokio::time::timeout(Duration::from_millis(300), recv_event(&mut viewer)).await;
    assert!(silence.is_err(), "viewer received a frame from the wrong session");
}

#[tokio::test]
async fn test_silent_connection_is_evicted_by_heartbeat() {
    // given: a short heartbeat and a viewer that stops responding
    let app = spawn_app(Duration::from_millis(200)).await;
    let mut host = authenticated_client(&app, "host").await;
    send(
        &mut host,
        serde_json::json!({"type": "create_stream", "title": "show"}),
    )
    .await;
    let session_id = recv_until(&mut host, "stream_created").await["session"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut viewer = authenticated_client(&app, "viewer").await;
    send(
        &mut viewer,
        serde_json::json!({"type": "join_stream", "session_id": session_id}),
    )
    .await;
    recv_until(&mut viewer, "joined_as_viewer").await;
    recv_until(&mut host, "viewer_joined").await;

    // when: the viewer's socket goes silent. Holding the stream without
    // reading means pings are never answered.
    let _parked = viewer;

    // then: the host sees the viewer leave without any explicit action
    let left = recv_until(&mut host, "left_stream").await;
    assert_eq!(left["user_id"], "viewer");
}
