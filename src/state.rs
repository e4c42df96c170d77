//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::monitor::MonitorRegistry;
use crate::session::SessionMap;
use crate::store::MonitorStore;
use crate::telegram::TelegramService;

/// Shared application state, cloneable across tasks via Arc-wrapped fields.
///
/// Bundles the configuration, the Telegram worker-pool service, the
/// persistent monitoring registry, its in-memory counterpart, and the
/// operator session map. The update dispatcher, mirror jobs, and the HTTP
/// router all hold clones of this.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub telegram: TelegramService,
    pub store: MonitorStore,
    pub monitors: MonitorRegistry,
    pub sessions: Arc<SessionMap>,
}

impl AppState {
    /// Creates a new application state from the given configuration,
    /// Telegram service, and monitoring registry.
    pub fn new(config: AppConfig, telegram: TelegramService, store: MonitorStore) -> Self {
        Self {
            config: Arc::new(config),
            telegram,
            store,
            monitors: MonitorRegistry::new(),
            sessions: Arc::new(SessionMap::new()),
        }
    }
}
