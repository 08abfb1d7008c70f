// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: Re-exports the environment configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! Environment-based configuration management

pub mod environment;

pub use environment::{DatabaseConfig, LlmConfig, ServerConfig};
