//! Live co-streaming session coordinator server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin costream-server
//! cargo run --bin costream-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use costream_server::{
    infrastructure::{
        Broadcaster, ConnectionRegistry, InMemoryDurableStore, InMemoryUserDirectory,
        InMemoryVerificationService, SessionStore,
    },
    ui::{Server, state::AppState},
    usecase::{
        ChatUseCase, DisconnectUseCase, LifecycleUseCase, MembershipUseCase, ModerationUseCase,
        ProductionUseCase, SignalingUseCase,
    },
};
use costream_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "costream-server")]
#[command(about = "Live co-streaming session coordinator", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds between liveness pings; a connection silent for a full
    /// interval is evicted
    #[arg(long, default_value = "30")]
    heartbeat_secs: u64,

    /// Require users to be marked verified before joining as a co-star.
    /// Off by default so local runs work without a seeded verification set.
    #[arg(long)]
    strict_verification: bool,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Registry, store and collaborators
    // 2. Broadcaster
    // 3. UseCases
    // 4. AppState and server

    let registry = Arc::new(ConnectionRegistry::new());
    let store = Arc::new(SessionStore::new());
    let directory = Arc::new(InMemoryUserDirectory::accepting_anyone());
    let verification = if args.strict_verification {
        Arc::new(InMemoryVerificationService::new())
    } else {
        Arc::new(InMemoryVerificationService::approving_everyone())
    };
    let durable = Arc::new(InMemoryDurableStore::new());
    let clock = Arc::new(SystemClock);

    let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

    let lifecycle_usecase = Arc::new(LifecycleUseCase::new(
        store.clone(),
        broadcaster.clone(),
        clock.clone(),
    ));
    let membership_usecase = Arc::new(MembershipUseCase::new(
        store.clone(),
        broadcaster.clone(),
        verification,
        directory.clone(),
        clock.clone(),
    ));
    let chat_usecase = Arc::new(ChatUseCase::new(
        store.clone(),
        broadcaster.clone(),
        clock.clone(),
    ));
    let moderation_usecase = Arc::new(ModerationUseCase::new(store.clone(), broadcaster.clone()));
    let signaling_usecase = Arc::new(SignalingUseCase::new(store.clone(), broadcaster.clone()));
    let production_usecase = Arc::new(ProductionUseCase::new(
        store.clone(),
        broadcaster.clone(),
        durable,
    ));
    let disconnect_usecase = Arc::new(DisconnectUseCase::new(
        store.clone(),
        registry.clone(),
        broadcaster,
    ));

    let state = Arc::new(AppState {
        registry,
        store,
        directory,
        lifecycle_usecase,
        membership_usecase,
        chat_usecase,
        moderation_usecase,
        signaling_usecase,
        production_usecase,
        disconnect_usecase,
    });

    let server = Server::new(state, Duration::from_secs(args.heartbeat_secs));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
