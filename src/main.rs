//! Blast Arena Game Server
//!
//! Authoritative server binary: binds a TCP listener, upgrades connections to
//! WebSocket at `/ws`, and hands every session to the shared room manager.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use blast_arena::game::world::PlayerId;
use blast_arena::net::protocol::parse_client;
use blast_arena::net::{self, ClientMessage, ConnectionEvent};
use blast_arena::ratings::Ratings;
use blast_arena::room::{run_grace_sweep, spawn_room_loop, RoomManager, SharedManager};
use blast_arena::store::Store;
use blast_arena::{TICK_HZ, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

    info!("Blast Arena Server v{VERSION}");
    info!("Tick rate: {TICK_HZ} Hz");

    let store = Arc::new(Store::open(&data_dir).await?);
    let ratings = Ratings::open(&store).await?;
    let manager: SharedManager = Arc::new(Mutex::new(RoomManager::new(store, ratings)));

    tokio::spawn(run_grace_sweep(manager.clone()));

    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    info!("Listening on {host}:{port}");

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let manager = manager.clone();
                tokio::spawn(handle_socket(manager, stream, addr));
            }
            Err(e) => error!("accept error: {e}"),
        }
    }
}

/// Upgrade one connection and pump its messages through the manager until it
/// closes. The session token binds on the first message; a hello carrying a
/// known reconnect token resumes that session.
async fn handle_socket(manager: SharedManager, stream: TcpStream, addr: SocketAddr) {
    let (conn, mut events) = match net::accept(stream, "/ws").await {
        Ok(pair) => pair,
        Err(e) => {
            debug!(%addr, "handshake failed: {e}");
            return;
        }
    };
    debug!(%addr, "connection upgraded");

    let mut token: Option<PlayerId> = None;
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Text(text) => {
                let Some(msg) = parse_client(&text) else {
                    continue;
                };
                let mut mgr = manager.lock().await;
                let bound = *token.get_or_insert_with(|| {
                    let reconnect = match &msg {
                        ClientMessage::Hello {
                            reconnect_token, ..
                        } => reconnect_token.as_deref(),
                        _ => None,
                    };
                    mgr.bind_connection(&conn, reconnect)
                });
                if let Some(code) = mgr.on_message(bound, msg) {
                    drop(mgr);
                    spawn_room_loop(manager.clone(), code);
                }
            }
            // Clients speak JSON; binary frames flow server-to-client only.
            ConnectionEvent::Binary(_) => {}
            ConnectionEvent::Closed => break,
        }
    }

    if let Some(token) = token {
        manager.lock().await.on_socket_closed(token);
        debug!(%addr, %token, "connection closed");
    }
}
