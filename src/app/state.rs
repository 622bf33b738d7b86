//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::GameWorld;
use crate::map::MapStore;
use crate::session::LoginPolicy;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: Arc<GameWorld>,
    pub login: Arc<LoginPolicy>,
}

impl AppState {
    pub fn new(config: Config, maps: MapStore) -> Self {
        let config = Arc::new(config);

        // Game world owns both registries; connection tasks and the
        // detonation task each get a clone of the Arc
        let world = Arc::new(GameWorld::new(maps, config.rules.clone(), config.rng_seed));

        let login = Arc::new(LoginPolicy::from_config(&config));

        Self {
            config,
            world,
            login,
        }
    }
}
