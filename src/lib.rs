//! Core gameplay logic for Nocturne, a night-exploration game built around
//! anomaly points: world props that perturb at night and are calmed back by
//! the player.
//!
//! The crate is platform-agnostic. It owns scheduling, variant selection,
//! resolution accounting, the reaction minigame, and zone triggers; rendering,
//! input capture, and persistence stay with the embedding engine, which drives
//! a [`NightSession`] and listens on its [`EventBus`].

pub mod data;
pub mod events;
pub mod instance;
pub mod phase;
pub mod point;
pub mod reaction;
pub mod rng;
pub mod scheduler;
pub mod seed;
pub mod session;
pub mod world;
pub mod zone;

pub use data::{ConfigError, PoolData, PointSpec, VariantKind, VariantSpec};
pub use events::{
    AnomalyResolved, EventBus, FatalFailure, NightCompleted, NightProgress, ReactionResult,
    SubscriptionId,
};
pub use instance::{AnomalyInstance, InstanceState};
pub use phase::{FixedCalendar, GameCalendar, GamePhase};
pub use point::AnomalyPoint;
pub use reaction::{InputKey, ReactionConfig, ReactionGame, ReactionSlot};
pub use rng::RngBundle;
pub use scheduler::{InteractOutcome, NightConfig, NightScheduler};
pub use session::{NightSession, SessionConfig};
pub use world::{Prop, PropSnapshot, Transform};
pub use zone::{ZoneConfig, ZoneTrigger};

use serde::de::DeserializeOwned;

/// Platform data access used to assemble a session.
///
/// Implementations live with the embedding engine: a filesystem loader on
/// desktop, an asset-bundle loader inside the engine runtime, an in-memory
/// fixture in tests.
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the authored anomaly-point pool.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the pool cannot be read or parsed.
    fn load_pool(&self) -> Result<PoolData, Self::Error>;

    /// Load a named configuration document.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the document cannot be read or parsed.
    fn load_config<T: DeserializeOwned>(&self, name: &str) -> Result<T, Self::Error>;
}

/// Entry point tying a [`DataLoader`] to session construction.
#[derive(Debug)]
pub struct GameEngine<L: DataLoader> {
    loader: L,
}

impl<L: DataLoader> GameEngine<L> {
    #[must_use]
    pub const fn new(loader: L) -> Self {
        Self { loader }
    }

    #[must_use]
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    /// Load the pool, validate `cfg`, and build a deterministic session on a
    /// fresh event bus.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool fails to load or the tuning fails
    /// validation.
    pub fn create_session(&self, seed: u64, cfg: SessionConfig) -> anyhow::Result<NightSession> {
        let pool = self.loader.load_pool()?;
        let session = NightSession::new(seed, pool, cfg, EventBus::new())?;
        Ok(session)
    }

    /// Convenience wrapper: build a session from a friendly share code.
    ///
    /// # Errors
    ///
    /// Returns an error when the code does not decode, the pool fails to
    /// load, or the tuning fails validation.
    pub fn create_session_from_code(
        &self,
        code: &str,
        cfg: SessionConfig,
    ) -> anyhow::Result<NightSession> {
        let seed = seed::decode_to_seed(code)
            .ok_or_else(|| anyhow::anyhow!("unrecognized share code: {code}"))?;
        self.create_session(seed, cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixtureLoader {
        pool_json: &'static str,
    }

    impl DataLoader for FixtureLoader {
        type Error = serde_json::Error;

        fn load_pool(&self) -> Result<PoolData, Self::Error> {
            PoolData::from_json(self.pool_json)
        }

        fn load_config<T: DeserializeOwned>(&self, _name: &str) -> Result<T, Self::Error> {
            serde_json::from_str("{}")
        }
    }

    const POOL_JSON: &str = r#"{
        "points": [
            {
                "id": "hall_clock",
                "variants": [{"id": "clock_flip", "kind": "flip"}]
            },
            {
                "id": "attic_mirror",
                "variants": [{"id": "mirror_hide", "kind": "hide"}]
            }
        ]
    }"#;

    #[test]
    fn engine_builds_a_session_from_loaded_data() {
        let engine = GameEngine::new(FixtureLoader { pool_json: POOL_JSON });
        let session = engine
            .create_session(42, SessionConfig::default())
            .expect("pool and config are valid");
        assert_eq!(session.scheduler().point_ids().len(), 2);
    }

    #[test]
    fn engine_surfaces_pool_parse_failures() {
        let engine = GameEngine::new(FixtureLoader { pool_json: "not json" });
        assert!(engine.create_session(1, SessionConfig::default()).is_err());
    }

    #[test]
    fn engine_accepts_share_codes() {
        let engine = GameEngine::new(FixtureLoader { pool_json: POOL_JSON });
        assert!(
            engine
                .create_session_from_code("NV-LANTERN42", SessionConfig::default())
                .is_ok()
        );
        assert!(
            engine
                .create_session_from_code("garbage", SessionConfig::default())
                .is_err()
        );
    }

    #[test]
    fn loaded_config_documents_deserialize_with_defaults() {
        let loader = FixtureLoader { pool_json: POOL_JSON };
        let cfg: SessionConfig = loader.load_config("session").expect("defaults apply");
        assert_eq!(cfg, SessionConfig::default());
    }
}
