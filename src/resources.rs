// ABOUTME: Centralized resource container for dependency injection in the chat server
// ABOUTME: Holds the shared database handle, LLM provider, and configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! # Server Resources Module
//!
//! Centralized resource container for dependency injection. Handlers and
//! background tasks receive an `Arc<ServerResources>` instead of recreating
//! clients or reaching for process-global state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::database::Database;
use crate::llm::LlmProvider;

/// Centralized resource container shared across handlers and tasks
#[derive(Clone)]
pub struct ServerResources {
    /// SQLite-backed conversation store
    pub database: Database,
    /// Chat completion backend
    pub provider: Arc<dyn LlmProvider>,
    /// Startup configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Create new server resources with proper Arc sharing
    #[must_use]
    pub fn new(database: Database, provider: Arc<dyn LlmProvider>, config: ServerConfig) -> Self {
        Self {
            database,
            provider,
            config: Arc::new(config),
        }
    }
}
