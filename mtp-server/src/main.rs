//! mtp-server — terminates the MTP handshake and encrypted envelope.
//!
//! ```text
//! RUST_LOG=mtp_server=info,mtp_proto=info cargo run -p mtp-server
//! ```

mod config;
mod connection;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mtp_crypto::CryptoCfg;
use mtp_store::{AuthKeyStore, InMemoryBackend};
use tokio::net::TcpListener;

use config::ServerConfig;
use connection::Shared;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, no other threads reading env
        unsafe { std::env::set_var("RUST_LOG", "mtp_server=info,mtp_proto=info"); }
    }
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("[main] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    let cfg = CryptoCfg::new(
        &config.rsa_n,
        &config.rsa_d,
        &config.rsa_pub_n,
        &config.rsa_pub_e,
        config.pq,
        config.dh_g,
        config.dh_prime,
    )
    .ok_or("invalid crypto configuration")?;

    let store: Arc<dyn AuthKeyStore> = match &config.sqlite_path {
        Some(path) => Arc::new(mtp_store::SqliteBackend::open(path)?),
        None => Arc::new(InMemoryBackend::new()),
    };
    log::info!("[main] auth-key store: {}", store.name());

    let shared = Arc::new(Shared {
        cfg: Arc::new(cfg),
        store,
        registry: mtp_proto::session_registry::ClientSessionRegistry::new(),
    });

    let listener = TcpListener::bind(&config.listen_addr).await?;
    log::info!("[main] listening on {}", config.listen_addr);

    let next_connection_id = Arc::new(AtomicU64::new(1));

    loop {
        let (stream, peer) = listener.accept().await?;
        let shared = shared.clone();
        let connection_id = next_connection_id.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            log::info!("[connection] accepted {peer} as connection {connection_id}");
            if let Err(e) = connection::handle(stream, connection_id, shared).await {
                log::warn!("[connection] {connection_id} ended: {e}");
            }
        });
    }
}
