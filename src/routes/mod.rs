// ABOUTME: Route module organization for the Parley chat server HTTP endpoints
// ABOUTME: Provides centralized route definitions organized by domain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! Route module for the Parley chat server
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the service layer.

/// Chat conversation routes
pub mod chat;
/// Health check routes
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;

use crate::resources::ServerResources;
use axum::Router;
use std::sync::Arc;

/// Assemble the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(ChatRoutes::routes(resources))
}
