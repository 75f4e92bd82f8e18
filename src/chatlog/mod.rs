//! Append-only exchange log, one JSON object per line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::config::ChatLogConfig;

/// One completed exchange as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub session_id: String,
    pub user: String,
    pub bot: String,
}

impl LogRecord {
    /// A record stamped with the current local time.
    pub fn now(session_id: &str, user: &str, bot: &str) -> Self {
        Self {
            timestamp: Some(Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
            session_id: session_id.to_string(),
            user: user.to_string(),
            bot: bot.to_string(),
        }
    }
}

/// Sink for completed exchanges. Records are never rewritten or removed.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, record: &LogRecord) -> Result<()>;

    fn name(&self) -> &str;
}

/// Writes records to a JSON Lines file, reopening it in append mode for every record.
pub struct JsonlConversationLog {
    path: PathBuf,
}

impl JsonlConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConversationLog for JsonlConversationLog {
    async fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize log record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open chat log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to chat log {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

/// Factory: the configured log sink, or `None` when logging is disabled.
pub fn create_conversation_log(config: &ChatLogConfig) -> Option<Arc<dyn ConversationLog>> {
    if !config.enabled {
        return None;
    }
    Some(Arc::new(JsonlConversationLog::new(config.resolved_path())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_fields_in_order() {
        let record = LogRecord {
            timestamp: Some("2024-05-01T10:00:00.000000+00:00".into()),
            session_id: "s1".into(),
            user: "hi".into(),
            bot: "hello".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":"2024-05-01T10:00:00.000000+00:00","session_id":"s1","user":"hi","bot":"hello"}"#
        );
    }

    #[test]
    fn record_without_timestamp_omits_field() {
        let record = LogRecord {
            timestamp: None,
            session_id: "s1".into(),
            user: "hi".into(),
            bot: "hello".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn now_stamps_parseable_timestamp() {
        let record = LogRecord::now("s", "u", "b");
        let ts = record.timestamp.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[tokio::test]
    async fn append_writes_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chat_log.jsonl");
        let log = JsonlConversationLog::new(&path);

        for i in 0..3 {
            log.append(&LogRecord::now("s1", &format!("q{i}"), "multi\nline"))
                .await
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            let record: LogRecord = serde_json::from_str(line).unwrap();
            assert_eq!(record.user, format!("q{i}"));
            assert_eq!(record.bot, "multi\nline");
        }
    }

    #[tokio::test]
    async fn append_preserves_existing_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chat_log.jsonl");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();

        let log = JsonlConversationLog::new(&path);
        log.append(&LogRecord::now("s", "u", "b")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("{\"existing\":true}\n"));
    }

    #[tokio::test]
    async fn append_fails_for_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let log = JsonlConversationLog::new(tmp.path().join("missing").join("log.jsonl"));
        let err = log.append(&LogRecord::now("s", "u", "b")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to open chat log"));
    }

    #[test]
    fn factory_respects_enabled_flag() {
        let disabled = ChatLogConfig {
            enabled: false,
            path: "chat_log.jsonl".into(),
        };
        assert!(create_conversation_log(&disabled).is_none());

        let enabled = ChatLogConfig::default();
        let log = create_conversation_log(&enabled).unwrap();
        assert_eq!(log.name(), "jsonl");
    }
}
