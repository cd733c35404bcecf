use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use millionaire::build_question_loader;
use millionaire::config::load_settings;
use millionaire::error::Result as AppResult;
use millionaire::leaderboard::LeaderboardStore;
use millionaire::session::{SessionManagerHandle, SessionResources};
use millionaire::state::AppState;
use millionaire::web::run_server;

#[tokio::main]
async fn main() -> AppResult<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {}", e);
        }
    }

    // Setup tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{}=info,tower_http=debug", env!("CARGO_PKG_NAME")).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load Configuration
    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let loader = build_question_loader(&app_settings)?;
    let leaderboard = Arc::new(LeaderboardStore::new(&app_settings.leaderboard.file_path));
    tracing::info!(
        leaderboard.path = %leaderboard.path().display(),
        model = %app_settings.groq.model,
        "Question loader and leaderboard initialized"
    );

    let session_manager = SessionManagerHandle::spawn(
        32,
        SessionResources {
            loader,
            leaderboard: Arc::clone(&leaderboard),
            questions_per_round: app_settings.game.questions_per_round,
            idle_timeout: app_settings.game.session_idle_timeout(),
        },
    );

    let app_state = AppState {
        session_manager,
        leaderboard,
        default_theme: app_settings.game.default_theme,
    };

    // Run the web server
    run_server(app_state, app_settings.server).await?;

    Ok(())
}
