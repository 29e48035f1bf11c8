// Scripted HTTP sender for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::core::errors::NetworkError;
use crate::services::gemini::transport::{HttpReply, HttpSender};

/// Replays a fixed list of replies; the last one repeats once the script runs out
pub struct ScriptedSender {
    script: Mutex<VecDeque<Result<HttpReply, NetworkError>>>,
    fallback: Result<HttpReply, NetworkError>,
    calls: AtomicUsize,
    created: tokio::time::Instant,
    offsets: Mutex<Vec<Duration>>,
    bodies: Mutex<Vec<serde_json::Value>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSender {
    pub fn new(script: Vec<Result<HttpReply, NetworkError>>) -> Self {
        let fallback = script
            .last()
            .cloned()
            .unwrap_or_else(|| Ok(HttpReply::new(500, "")));
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            created: tokio::time::Instant::now(),
            offsets: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn repeating(reply: HttpReply) -> Self {
        Self::new(vec![Ok(reply)])
    }

    /// Every call waits for `gate.notify_one()` before replying
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Time of each call relative to construction
    pub fn call_offsets(&self) -> Vec<Duration> {
        self.offsets.lock().clone()
    }

    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.bodies.lock().clone()
    }
}

#[async_trait]
impl HttpSender for ScriptedSender {
    async fn post_json(
        &self,
        _url: &str,
        _api_key: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.offsets.lock().push(self.created.elapsed());
        self.bodies.lock().push(body.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// A well-formed `generateContent` reply wrapping `text`
pub fn candidate_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 1290, "candidatesTokenCount": 87 }
    })
    .to_string()
}
