// ABOUTME: Main library entry point for the Parley chat server
// ABOUTME: Provides conversation storage, turn dispatch, and streaming over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

#![deny(unsafe_code)]

//! # Parley Chat Server
//!
//! A backend that stores multi-turn chat conversations in SQLite and proxies
//! user turns to an OpenAI-compatible LLM gateway, with synchronous and
//! NDJSON-streamed responses plus best-effort background title generation.
//!
//! ## Architecture
//!
//! - **`database`**: SQLite conversation/message store (`sqlx`)
//! - **`llm`**: Gateway abstraction with streaming SSE client
//! - **`services`**: Turn orchestration and title synthesis
//! - **`routes`**: axum HTTP surface (REST + NDJSON streaming)
//! - **`resources`**: Shared dependency container threaded through handlers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use parley_chat_server::config::ServerConfig;
//! use parley_chat_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Parley configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-based configuration
pub mod config;

/// SQLite-backed conversation and message storage
pub mod database;

/// Unified error handling with HTTP response mapping
pub mod errors;

/// LLM gateway abstraction and OpenAI-compatible client
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Shared dependency container for handlers and background tasks
pub mod resources;

/// HTTP route definitions
pub mod routes;

/// Domain services for turns and title synthesis
pub mod services;
