// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables and runtime configuration parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! Environment-based configuration management for production deployment
//!
//! Configuration is environment-only: no config files, no hidden process-wide
//! state. The binary builds a `ServerConfig` once at startup and threads it
//! through `ServerResources`.

use crate::errors::{AppError, AppResult};
use std::env;

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default SQLite database URL
const DEFAULT_DATABASE_URL: &str = "sqlite:./parley.db";
/// Default LLM gateway base URL (Ollama's OpenAI-compatible endpoint)
const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
/// Default model served by the gateway
const DEFAULT_LLM_MODEL: &str = "qwen2.5:14b-instruct";

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the REST API
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// LLM gateway configuration
    pub llm: LlmConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (`sqlite:...` or `sqlite::memory:`)
    pub url: String,
}

/// LLM gateway configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completions endpoint
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Optional bearer token for hosted gateways
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if `HTTP_PORT` is set but not a valid port number.
    pub fn from_env() -> AppResult<Self> {
        let http_port = match env::var("HTTP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| AppError::config(format!("Invalid HTTP_PORT '{value}': {e}")))?,
            Err(_) => DEFAULT_HTTP_PORT,
        };

        Ok(Self {
            http_port,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into()),
            },
            llm: LlmConfig {
                base_url: env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.into()),
                model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.into()),
                api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            },
        })
    }

    /// Human-readable configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Parley Chat Server Configuration:\n\
             - HTTP Port: {}\n\
             - Database: {}\n\
             - LLM Gateway: {}\n\
             - LLM Model: {}\n\
             - LLM API Key: {}",
            self.http_port,
            self.database.url,
            self.llm.base_url,
            self.llm.model,
            if self.llm.api_key.is_some() {
                "set"
            } else {
                "not set"
            },
        )
    }
}
