//! In-memory provider used by unit tests across the crate.

use crate::api::{AiChunk, AiProvider, AiStream, ApiError, Prompt};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

enum Script {
    Chunks(Vec<Result<AiChunk, ApiError>>),
    Fail(ApiError),
}

/// Replays canned responses in order and records every prompt it receives.
///
/// With [`ScriptedProvider::gated`] each call parks until the gate is
/// notified, which keeps an action `Busy` for as long as a test needs.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Prompt>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.reply_chunks(&[text])
    }

    pub fn reply_chunks(self, parts: &[&str]) -> Self {
        let chunks = parts
            .iter()
            .map(|p| Ok(AiChunk::Content(p.to_string())))
            .collect();
        self.push(Script::Chunks(chunks))
    }

    pub fn reply_then_fail(self, text: &str, err: ApiError) -> Self {
        self.push(Script::Chunks(vec![
            Ok(AiChunk::Content(text.to_string())),
            Err(err),
        ]))
    }

    pub fn fail(self, err: ApiError) -> Self {
        self.push(Script::Fail(err))
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn chat_stream(&self, prompt: &Prompt) -> Result<AiStream, ApiError> {
        self.calls.lock().unwrap().push(prompt.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(chunks))),
            Some(Script::Fail(err)) => Err(err),
            None => Err(ApiError::Response("no scripted response left".to_string())),
        }
    }

    async fn check_availability(&self) -> Result<(), ApiError> {
        Ok(())
    }
}
