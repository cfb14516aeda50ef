//! Query gateway contract and wire format.
//!
//! The backend answers `POST {base_url}/query` with either
//! `{ "response": string }` or `{ "error": string }`. The body is decoded
//! into an explicit tagged result at the boundary; anything that matches
//! neither shape is a distinct `Malformed` outcome rather than a silent
//! fallthrough.

use async_trait::async_trait;
use docchat_core::session::Source;
use serde::{Deserialize, Serialize};

/// JSON body sent to the query endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub text: String,
}

/// Decoded outcome of one query exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReply {
    /// The backend produced an answer.
    Answer { text: String, sources: Vec<Source> },
    /// Transport success, application-level failure (the `error` field).
    Refused { message: String },
    /// The body was JSON of an unrecognized shape (or an empty answer).
    Malformed,
    /// The exchange itself failed: network, timeout, or a non-JSON body.
    Transport { reason: String },
}

/// Boundary component translating a chat query into one HTTP exchange.
///
/// Implementations fold every failure into [`QueryReply`]; this call never
/// returns an error to the caller.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn submit_query(&self, text: &str) -> QueryReply;
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AnswerBody {
    response: String,
    #[serde(default)]
    sources: Vec<WireSource>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RefusalBody {
    error: String,
}

/// Source payload the backend may attach when extended to supply citations.
#[derive(Deserialize)]
struct WireSource {
    id: String,
    title: String,
    excerpt: String,
    #[serde(default)]
    url: Option<String>,
}

impl From<WireSource> for Source {
    fn from(wire: WireSource) -> Self {
        Self {
            id: wire.id,
            title: wire.title,
            excerpt: wire.excerpt,
            url: wire.url,
        }
    }
}

/// Strictly decodes a response body into the tagged reply.
pub(crate) fn decode_reply_body(body: &str) -> QueryReply {
    if let Ok(answer) = serde_json::from_str::<AnswerBody>(body) {
        if answer.response.is_empty() {
            return QueryReply::Malformed;
        }
        return QueryReply::Answer {
            text: answer.response,
            sources: answer.sources.into_iter().map(Source::from).collect(),
        };
    }

    if let Ok(refusal) = serde_json::from_str::<RefusalBody>(body) {
        return QueryReply::Refused {
            message: refusal.error,
        };
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        // Valid JSON that matches neither contract shape.
        Ok(_) => QueryReply::Malformed,
        // Not JSON at all: the exchange is broken, not the application.
        Err(err) => QueryReply::Transport {
            reason: format!("response body is not valid JSON: {}", err),
        },
    }
}
