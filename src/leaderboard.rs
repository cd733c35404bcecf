use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("Leaderboard file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Leaderboard CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    #[serde(rename = "Name")]
    pub player_name: String,
    #[serde(rename = "Score")]
    pub score: u32,
}

/// Flat `Name,Score` CSV file. Entries stay in insertion order.
#[derive(Debug)]
pub struct LeaderboardStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LeaderboardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries. A missing file is an empty leaderboard.
    pub async fn load(&self) -> Result<Vec<HighScoreEntry>, LeaderboardError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        decode(&bytes)
    }

    /// Appends `entry` by rewriting the whole file, and returns the updated
    /// leaderboard.
    #[tracing::instrument(skip(self, entry), fields(player = %entry.player_name, score = entry.score))]
    pub async fn append(&self, entry: HighScoreEntry) -> Result<Vec<HighScoreEntry>, LeaderboardError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await?;
        entries.push(entry);
        let bytes = encode(&entries)?;

        let tmp_path = self.temp_path();
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::info!(entries = entries.len(), path = %self.path.display(), "High score saved");
        Ok(entries)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "highscores.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn decode(bytes: &[u8]) -> Result<Vec<HighScoreEntry>, LeaderboardError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    reader
        .deserialize()
        .collect::<Result<Vec<HighScoreEntry>, csv::Error>>()
        .map_err(Into::into)
}

fn encode(entries: &[HighScoreEntry]) -> Result<Vec<u8>, LeaderboardError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(name: &str, score: u32) -> HighScoreEntry {
        HighScoreEntry {
            player_name: name.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LeaderboardStore::new(dir.path().join("highscores.csv"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = LeaderboardStore::new(dir.path().join("highscores.csv"));

        store.append(entry("Asha", 3)).await.unwrap();
        store.append(entry("Ravi", 5)).await.unwrap();
        let all = store.append(entry("Meera", 1)).await.unwrap();

        assert_eq!(all, vec![entry("Asha", 3), entry("Ravi", 5), entry("Meera", 1)]);
        assert_eq!(store.load().await.unwrap(), all);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_uses_name_score_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscores.csv");
        let store = LeaderboardStore::new(&path);
        store.append(entry("Asha", 4)).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "Name,Score\nAsha,4\n");
    }

    #[tokio::test]
    async fn test_reads_existing_file_with_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscores.csv");
        std::fs::write(&path, "Name,Score\n").unwrap();
        let store = LeaderboardStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());

        store.append(entry("Ravi", 2)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![entry("Ravi", 2)]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LeaderboardStore::new(dir.path().join("highscores.csv")));

        let mut handles = Vec::new();
        for i in 0..10u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(entry(&format!("p{}", i), i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("highscores.csv");
        std::fs::write(&path, "Name,Score\nAsha,lots\n").unwrap();
        let store = LeaderboardStore::new(&path);
        assert!(matches!(store.load().await, Err(LeaderboardError::Csv(_))));
    }
}
