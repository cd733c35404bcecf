use std::sync::Arc;

use crate::game_logic::Theme;
use crate::leaderboard::LeaderboardStore;
use crate::session::SessionManagerHandle;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: SessionManagerHandle,
    pub leaderboard: Arc<LeaderboardStore>,
    pub default_theme: Theme,
}
