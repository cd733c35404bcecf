use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use millionaire::build_question_loader;
use millionaire::config::load_settings;
use millionaire::console::{ConsoleGame, ConsoleOptions};
use millionaire::error::Result as AppResult;
use millionaire::leaderboard::LeaderboardStore;

/// Forwards stdin lines to the game from a plain thread, so a pending read
/// never holds up runtime shutdown. Dropping the sender on EOF tells the game
/// that input is closed.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read from stdin");
                    break;
                }
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> AppResult<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {}", e);
        }
    }

    // Logs go to stderr so they stay out of the game display.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app_settings = load_settings()?;
    tracing::debug!("Configuration loaded: {:?}", app_settings);

    let loader = build_question_loader(&app_settings)?;
    let leaderboard = Arc::new(LeaderboardStore::new(&app_settings.leaderboard.file_path));
    let options = ConsoleOptions::from_config(&app_settings.game);

    ConsoleGame::new(
        loader,
        leaderboard,
        options,
        spawn_stdin_reader(),
        tokio::io::stdout(),
    )
    .run()
    .await
}
