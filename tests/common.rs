// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory database setup and a scripted LLM provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `parley_chat_server`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_chat_server::config::{DatabaseConfig, LlmConfig, ServerConfig};
use parley_chat_server::database::Database;
use parley_chat_server::errors::AppError;
use parley_chat_server::llm::{
    ChatRequest, ChatResponse, ChatStream, LlmCapabilities, LlmProvider, StreamChunk,
};
use parley_chat_server::resources::ServerResources;

/// Create a fresh in-memory database with the schema applied
pub async fn create_test_database() -> Database {
    Database::new("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Create a test configuration (never used to bind a real port)
pub fn create_test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database: DatabaseConfig {
            url: "sqlite::memory:".to_owned(),
        },
        llm: LlmConfig {
            base_url: "http://localhost:11434/v1".to_owned(),
            model: "scripted-model".to_owned(),
            api_key: None,
        },
    }
}

/// Create server resources backed by a scripted provider
pub async fn create_test_resources(provider: Arc<ScriptedProvider>) -> Arc<ServerResources> {
    let database = create_test_database().await;
    Arc::new(ServerResources::new(
        database,
        provider,
        create_test_config(),
    ))
}

/// One step of a scripted stream: a content fragment or a failure message
pub type StreamStep = Result<String, String>;

/// A deterministic `LlmProvider` for tests
///
/// `complete()` pops queued responses (falling back to a fixed reply), and
/// `complete_stream()` replays a scripted fragment sequence, optionally
/// ending in an error.
pub struct ScriptedProvider {
    completions: Mutex<VecDeque<Result<String, String>>>,
    stream_script: Mutex<Vec<StreamStep>>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            stream_script: Mutex::new(Vec::new()),
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a response for the next `complete()` call
    pub fn push_completion(&self, content: &str) {
        self.completions
            .lock()
            .unwrap()
            .push_back(Ok(content.to_owned()));
    }

    /// Queue a failure for the next `complete()` call
    pub fn push_completion_error(&self, message: &str) {
        self.completions
            .lock()
            .unwrap()
            .push_back(Err(message.to_owned()));
    }

    /// Set the fragment script replayed by every `complete_stream()` call
    pub fn set_stream_script(&self, steps: Vec<StreamStep>) {
        *self.stream_script.lock().unwrap() = steps;
    }

    /// Convenience: stream these fragments, then end cleanly
    pub fn stream_fragments(&self, fragments: &[&str]) {
        self.set_stream_script(fragments.iter().map(|f| Ok((*f).to_owned())).collect());
    }

    /// Number of `complete()` calls observed
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Number of `complete_stream()` calls observed
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);

        let next = self.completions.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                model: "scripted-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
            Some(Err(message)) => Err(AppError::external_service("scripted", message)),
            None => Ok(ChatResponse {
                content: "Scripted reply".to_owned(),
                model: "scripted-model".to_owned(),
                usage: None,
                finish_reason: Some("stop".to_owned()),
            }),
        }
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let items: Vec<Result<StreamChunk, AppError>> = self
            .stream_script
            .lock()
            .unwrap()
            .iter()
            .map(|step| match step {
                Ok(fragment) => Ok(StreamChunk {
                    delta: fragment.clone(),
                    is_final: false,
                    finish_reason: None,
                }),
                Err(message) => Err(AppError::external_service("scripted", message.clone())),
            })
            .collect();

        Ok(Box::pin(tokio_stream::iter(items)))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}
