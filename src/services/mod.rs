// ABOUTME: Domain services for multi-step chat operations
// ABOUTME: Keeps turn orchestration and title synthesis out of the HTTP handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

//! Domain service layer
//!
//! Route handlers stay thin; the multi-step logic of a chat turn and the
//! background title synthesis live here where they can be tested directly.

pub mod chat_orchestration;
pub mod title;
