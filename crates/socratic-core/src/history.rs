use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcript::{Message, Origin, Transcript};

/// Somewhere a transcript survives between runs.
pub trait TranscriptStore {
    fn load(&self) -> Transcript;
    fn save(&self, transcript: &Transcript) -> Result<()>;
    /// Forget everything. Not an error when nothing was stored.
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

fn role_label(origin: Origin) -> &'static str {
    match origin {
        Origin::User => "human",
        Origin::Agent => "ai",
    }
}

fn origin_of(label: &str) -> Option<Origin> {
    match label {
        "human" | "user" => Some(Origin::User),
        "ai" | "agent" | "assistant" => Some(Origin::Agent),
        _ => None,
    }
}

/// Transcript kept as a JSON array of `{role, content, timestamp}` records.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TranscriptStore for HistoryStore {
    /// Missing, empty or corrupt file = empty transcript. Records with an
    /// unknown role are skipped.
    fn load(&self) -> Transcript {
        let records: Vec<Record> = match std::fs::read_to_string(&self.path) {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)
                .unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse history file {}: {e}", self.path.display());
                    Vec::new()
                }),
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read history file {}: {e}", self.path.display());
                Vec::new()
            }
        };

        let messages: Vec<Message> = records
            .into_iter()
            .filter_map(|r| match origin_of(&r.role) {
                Some(origin) => Some(Message {
                    origin,
                    content: r.content,
                }),
                None => {
                    tracing::debug!("Skipping history record with role {:?}", r.role);
                    None
                }
            })
            .collect();
        tracing::debug!("Loaded {} messages from {}", messages.len(), self.path.display());
        Transcript::from(messages)
    }

    fn save(&self, transcript: &Transcript) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory {}", parent.display())
            })?;
        }
        let now = Utc::now();
        let records: Vec<Record> = transcript
            .iter()
            .map(|m| Record {
                role: role_label(m.origin).to_string(),
                content: m.content.clone(),
                timestamp: Some(now),
            })
            .collect();
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write history {}", self.path.display()))?;
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove history {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("message_history.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(HistoryStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_load_unreadable_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("message_history.json");
        std::fs::write(&path, b"\xff\xfe\x00[").unwrap();
        assert!(HistoryStore::new(&path).load().is_empty());

        // A directory in place of the file cannot be read either.
        assert!(HistoryStore::new(dir.path()).load().is_empty());
    }

    #[test]
    fn test_save_reports_unusable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = HistoryStore::new(blocker.join("message_history.json"));

        let err = store
            .save(&Transcript::from(vec![Message::user("hi")]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to create history directory"));
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/message_history.json"));
        let transcript = Transcript::from(vec![
            Message::user("What is virtue?"),
            Message::agent("Can virtue be taught?"),
        ]);

        store.save(&transcript).unwrap();

        assert_eq!(store.load(), transcript);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"human\""));
        assert!(raw.contains("\"ai\""));
        assert!(raw.contains("timestamp"));
    }

    #[test]
    fn test_unknown_roles_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("message_history.json");
        std::fs::write(
            &path,
            r#"[
                {"role": "human", "content": "hi", "timestamp": "2024-05-01T10:00:00Z"},
                {"role": "system", "content": "ignored"},
                {"role": "ai", "content": "hello"}
            ]"#,
        )
        .unwrap();

        let transcript = HistoryStore::new(&path).load();

        assert_eq!(
            transcript,
            Transcript::from(vec![Message::user("hi"), Message::agent("hello")])
        );
    }

    #[test]
    fn test_reset() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("message_history.json"));
        store
            .save(&Transcript::from(vec![Message::user("hi")]))
            .unwrap();

        store.reset().unwrap();
        assert!(!store.path().exists());
        // Second reset is a no-op.
        store.reset().unwrap();
        assert!(store.load().is_empty());
    }
}
