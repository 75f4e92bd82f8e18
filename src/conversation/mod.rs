//! One chat exchange: history lookup, prompt rendering, generation, bookkeeping.

pub mod prompt;

pub use prompt::build_prompt;

use crate::providers::Provider;
use crate::sessions::{SessionStore, Turn};
use std::sync::Arc;

/// Why an exchange produced no reply. No turn is recorded in either case.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The generation backend could not be reached or failed mid-response.
    /// Displays the whole cause chain.
    #[error("{0:#}")]
    Inference(anyhow::Error),
    #[error("session store failure: {0:#}")]
    Session(anyhow::Error),
}

/// Drives exchanges against a session store and a generation backend.
pub struct Conversation {
    sessions: Arc<dyn SessionStore>,
    provider: Arc<dyn Provider>,
}

impl Conversation {
    pub fn new(sessions: Arc<dyn SessionStore>, provider: Arc<dyn Provider>) -> Self {
        Self { sessions, provider }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Run one exchange and return the model's reply.
    ///
    /// The session is created if unknown. The turn is appended only after the
    /// backend has produced a complete reply.
    pub async fn exchange(
        &self,
        session_id: &str,
        user_input: &str,
        user_name: Option<&str>,
    ) -> Result<String, ExchangeError> {
        let history = self
            .sessions
            .get_or_create(session_id)
            .await
            .map_err(ExchangeError::Session)?;

        let prompt = build_prompt(&history, user_input, user_name);
        tracing::debug!(
            session_id,
            turns = history.len(),
            model = self.provider.model(),
            "Sending prompt"
        );

        let reply = self
            .provider
            .generate(&prompt)
            .await
            .map_err(ExchangeError::Inference)?;

        self.sessions
            .append(session_id, Turn::new(user_input, reply.clone()))
            .await
            .map_err(ExchangeError::Session)?;

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::InMemorySessionStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned replies and records every prompt it was given.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().push(prompt.to_string());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("default".to_string()))
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn conversation(
        replies: Vec<anyhow::Result<String>>,
    ) -> (Conversation, Arc<ScriptedProvider>, Arc<InMemorySessionStore>) {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let sessions = Arc::new(InMemorySessionStore::new());
        let conv = Conversation::new(sessions.clone(), provider.clone());
        (conv, provider, sessions)
    }

    #[tokio::test]
    async fn exchanges_accumulate_turns_and_history_feeds_prompt() {
        let (conv, provider, sessions) =
            conversation(vec![Ok("Hello!".into()), Ok("Fine.".into())]);

        assert_eq!(conv.exchange("s", "Hi", None).await.unwrap(), "Hello!");
        assert_eq!(
            conv.exchange("s", "How are you?", Some("Ada")).await.unwrap(),
            "Fine."
        );

        let prompts = provider.prompts.lock().clone();
        assert_eq!(prompts[0], "User: Hi\nBot: ");
        assert_eq!(prompts[1], "User: Hi\nBot: Hello!\nAda: How are you?\nBot: ");

        let turns = sessions.get("s").await.unwrap().unwrap();
        assert_eq!(
            turns,
            vec![Turn::new("Hi", "Hello!"), Turn::new("How are you?", "Fine.")]
        );
    }

    #[tokio::test]
    async fn n_exchanges_leave_n_turns_and_other_sessions_untouched() {
        let (conv, _, sessions) = conversation(Vec::new());
        conv.exchange("t", "other", None).await.unwrap();

        for i in 0..5 {
            conv.exchange("s", &format!("msg {i}"), None).await.unwrap();
        }

        let turns = sessions.get("s").await.unwrap().unwrap();
        assert_eq!(turns.len(), 5);
        for (i, turn) in turns.iter().enumerate() {
            assert_eq!(turn.user, format!("msg {i}"));
        }
        assert_eq!(sessions.get("t").await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_generation_records_no_turn_but_leaves_session() {
        let (conv, _, sessions) =
            conversation(vec![Err(anyhow::anyhow!("connection refused"))]);

        let err = conv.exchange("s", "Hi", None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Inference(_)));
        assert_eq!(err.to_string(), "connection refused");

        assert_eq!(sessions.get("s").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn inference_error_renders_full_cause_chain() {
        let cause = std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused",
        );
        let err = anyhow::Error::new(cause).context("request to http://127.0.0.1:1 failed");
        let (conv, _, sessions) = conversation(vec![Err(err)]);

        let err = conv.exchange("s", "Hi", None).await.unwrap_err();
        assert_eq!(err.to_string(), "request to http://127.0.0.1:1 failed: Connection refused");

        assert_eq!(sessions.get("s").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn exchange_after_failure_does_not_see_failed_input() {
        let (conv, provider, _) =
            conversation(vec![Err(anyhow::anyhow!("timeout")), Ok("ok".into())]);

        assert!(conv.exchange("s", "lost", None).await.is_err());
        conv.exchange("s", "kept", None).await.unwrap();

        assert_eq!(provider.prompts.lock()[1], "User: kept\nBot: ");
    }
}
