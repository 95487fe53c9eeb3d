//! Binary entry point: loads configuration, initializes logging, and
//! constructs the single top-level [`lobby_core::MatchmakingCore`] instance,
//! mirroring `PocketRelay-Server/src/main.rs`'s `load_config` →
//! `logging::setup` → `Arc<...>` wiring sequence. The concrete collaborator
//! implementations (match registry, identity, storage, chat platform,
//! matchmaker) are owned by the host platform and are out of scope for this
//! crate (spec §1); this binary wires in-memory fakes so the core can be
//! exercised standalone.

use lobby_core::collaborators::fake::{
    FakeChatPlatform, FakeIdentityService, FakeMatchRegistry, FakeMatchmaker, FakeStorage,
};
use lobby_core::{config, logging, MatchmakingCore};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = config::load_config();
    logging::setup(&config);

    log::info!("starting matchmaking core on port {}", config.port);

    let core = MatchmakingCore::new(
        config,
        Arc::new(FakeMatchRegistry::new()),
        Arc::new(FakeIdentityService::new()),
        Arc::new(FakeStorage::new()),
        Arc::new(FakeChatPlatform::new()),
        Arc::new(FakeMatchmaker::new()),
    );

    log::info!("matchmaking core ready");

    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {error}");
    }

    log::info!("shutting down, {} broadcasters registered", core.broadcasters.count());
}
