//! Chat message orchestration.

use docchat_core::error::{DocChatError, Result};
use docchat_core::session::{ChatStore, Message, Source};
use docchat_gateway::query::{QueryGateway, QueryReply};
use std::sync::Arc;

/// Sends user messages through the query gateway and applies the replies to
/// the session store.
///
/// Each send bumps the session's request generation; a reply whose
/// generation is no longer current at completion time is stale (a newer
/// query superseded it) and is discarded instead of appended out of order.
/// The pending placeholder is resolved or removed on every path, so the
/// conversation never stays stuck in a loading state.
pub struct ChatService {
    store: Arc<ChatStore>,
    gateway: Arc<dyn QueryGateway>,
}

impl ChatService {
    /// Creates a new `ChatService`.
    ///
    /// # Arguments
    ///
    /// * `store` - The session store mutated by sends and replies
    /// * `gateway` - The query gateway client
    pub fn new(store: Arc<ChatStore>, gateway: Arc<dyn QueryGateway>) -> Self {
        Self { store, gateway }
    }

    /// Sends a chat message and waits for the reply.
    ///
    /// Returns the finalized assistant message, or `None` when the reply
    /// arrived stale (superseded by a newer query, or the session was
    /// deleted while the request was in flight) and was discarded.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidInput` error for empty text and a `NotFound` error
    /// when the session does not exist at send time. Gateway failures are
    /// not errors; they surface as readable assistant messages.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Option<Message>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DocChatError::invalid_input("message text must not be empty"));
        }

        self.store
            .append_message(session_id, Message::user(text))
            .await?;

        let placeholder = Message::pending();
        let placeholder_id = placeholder.id.clone();
        self.store.append_message(session_id, placeholder).await?;
        let generation = self.store.begin_query(session_id).await?;

        let reply = self.gateway.submit_query(text).await;

        if self.store.generation(session_id).await != generation {
            tracing::debug!(session_id, "discarding stale query reply");
            if let Err(err) = self.store.remove_message(session_id, &placeholder_id).await {
                tracing::debug!(session_id, "stale placeholder already gone: {}", err);
            }
            return Ok(None);
        }

        let (content, sources) = render_reply(reply);
        match self
            .store
            .resolve_message(session_id, &placeholder_id, content, sources)
            .await
        {
            Ok(message) => Ok(Some(message)),
            // The session disappeared mid-flight; nothing left to update.
            Err(err) if err.is_not_found() => {
                tracing::debug!(session_id, "session vanished before reply: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Renders a gateway reply as chat text.
fn render_reply(reply: QueryReply) -> (String, Vec<Source>) {
    match reply {
        QueryReply::Answer { text, sources } => (text, sources),
        QueryReply::Refused { message } => (format!("Error: {}", message), Vec::new()),
        QueryReply::Malformed => ("An unknown error occurred.".to_string(), Vec::new()),
        QueryReply::Transport { reason } => (
            format!(
                "Failed to connect to the RAG backend. Please ensure the backend server is running. Error: {}",
                reason
            ),
            Vec::new(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_core::session::{MessageRole, MessageStatus};
    use tokio::sync::Notify;

    struct MockQueryGateway {
        reply: QueryReply,
        gate: Option<Arc<Notify>>,
    }

    impl MockQueryGateway {
        fn answering(text: &str) -> Self {
            Self {
                reply: QueryReply::Answer {
                    text: text.to_string(),
                    sources: Vec::new(),
                },
                gate: None,
            }
        }

        fn replying(reply: QueryReply) -> Self {
            Self { reply, gate: None }
        }

        fn gated(reply: QueryReply, gate: Arc<Notify>) -> Self {
            Self {
                reply,
                gate: Some(gate),
            }
        }
    }

    #[async_trait]
    impl QueryGateway for MockQueryGateway {
        async fn submit_query(&self, _text: &str) -> QueryReply {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply.clone()
        }
    }

    fn service(gateway: MockQueryGateway) -> (Arc<ChatStore>, ChatService) {
        let store = Arc::new(ChatStore::new());
        let service = ChatService::new(store.clone(), Arc::new(gateway));
        (store, service)
    }

    #[tokio::test]
    async fn test_answer_becomes_assistant_message() {
        let (store, service) = service(MockQueryGateway::answering("Hi there"));
        let session = store.create_session("Greeting").await;

        let message = service
            .send_message(&session.id, "Hello")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.content, "Hi there");
        assert!(message.sources.is_empty());

        let loaded = store.get(&session.id).await.unwrap();
        assert_eq!(loaded.message_count, 2);
        assert_eq!(loaded.messages[0].content, "Hello");
        assert!(loaded.messages[0].is_user());
        assert_eq!(loaded.messages[1].status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn test_refusal_renders_error_prefix() {
        let (store, service) = service(MockQueryGateway::replying(QueryReply::Refused {
            message: "no documents indexed".to_string(),
        }));
        let session = store.create_session("Refused").await;

        let message = service
            .send_message(&session.id, "Hello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.content, "Error: no documents indexed");
    }

    #[tokio::test]
    async fn test_malformed_reply_renders_unknown_error() {
        let (store, service) = service(MockQueryGateway::replying(QueryReply::Malformed));
        let session = store.create_session("Malformed").await;

        let message = service
            .send_message(&session.id, "Hello")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.content, "An unknown error occurred.");
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_message_not_an_error() {
        let (store, service) = service(MockQueryGateway::replying(QueryReply::Transport {
            reason: "connection refused".to_string(),
        }));
        let session = store.create_session("Offline").await;

        let message = service
            .send_message(&session.id, "Hello")
            .await
            .unwrap()
            .unwrap();
        assert!(message.content.contains("connection refused"));
        assert!(message.content.contains("backend server is running"));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let (store, service) = service(MockQueryGateway::answering("unused"));
        let session = store.create_session("Empty").await;

        let err = service.send_message(&session.id, "   ").await.unwrap_err();
        assert!(matches!(err, DocChatError::InvalidInput(_)));
        assert_eq!(store.get(&session.id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (_store, service) = service(MockQueryGateway::answering("unused"));
        let err = service.send_message("missing", "Hello").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_reply_is_discarded() {
        let gate = Arc::new(Notify::new());
        let (store, service) = service(MockQueryGateway::gated(
            QueryReply::Answer {
                text: "too late".to_string(),
                sources: Vec::new(),
            },
            gate.clone(),
        ));
        let service = Arc::new(service);
        let session = store.create_session("Racing").await;

        let session_id = session.id.clone();
        let racer = {
            let service = service.clone();
            tokio::spawn(async move { service.send_message(&session_id, "first").await })
        };

        // Wait until the first send has parked inside the gateway, then
        // supersede it.
        while store.generation(&session.id).await == 0 {
            tokio::task::yield_now().await;
        }
        store.begin_query(&session.id).await.unwrap();
        gate.notify_one();

        let outcome = racer.await.unwrap().unwrap();
        assert!(outcome.is_none());

        // The user message stays; the stale placeholder is gone.
        let loaded = store.get(&session.id).await.unwrap();
        assert_eq!(loaded.message_count, 1);
        assert!(loaded.messages[0].is_user());
        assert_eq!(loaded.message_count, loaded.messages.len());
    }
}
