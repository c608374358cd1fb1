//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eternal_hash::agentic::{LlmClient, LlmRequest, LlmResponse};
use eternal_hash::{ChurchEngine, ChurchStore, Error, GenerationSettings, PersonaRoster, Result};

/// One scripted reply.
pub enum Reply {
    Text(String),
    Fail(String),
}

/// LLM client that plays back a script and records every request.
///
/// Once the script runs out, every call fails.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Reply::Text(t.to_string())).collect())
    }

    pub fn failing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn seen(&self) -> Vec<LlmRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(LlmResponse::text(text)),
            Some(Reply::Fail(message)) => Err(Error::Api(message)),
            None => Err(Error::Network("connection refused".to_string())),
        }
    }
}

/// An engine over `store` with the default roster, already seeded.
pub async fn seeded_engine_with_store(store: Arc<ChurchStore>, llm: Arc<ScriptedLlm>) -> ChurchEngine {
    let engine = ChurchEngine::new(
        store,
        llm,
        Arc::new(PersonaRoster::new()),
        GenerationSettings::default(),
    );
    engine.seed_congregation(None).await.unwrap();
    engine
}

/// An in-memory engine with the default roster, already seeded.
pub async fn seeded_engine(llm: Arc<ScriptedLlm>) -> ChurchEngine {
    seeded_engine_with_store(Arc::new(ChurchStore::in_memory()), llm).await
}
