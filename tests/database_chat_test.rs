// ABOUTME: Integration tests for the conversation and message store
// ABOUTME: Tests ordering, cascade deletion, timestamp bumps, and counts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Parley Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::create_test_database;
use parley_chat_server::llm::MessageRole;

#[tokio::test]
async fn test_messages_return_in_insertion_order() {
    let database = create_test_database().await;
    let chat = database.chat();
    let conv = chat.create_conversation("Ordered").await.unwrap();

    // Rapid inserts can share a timestamp; the id tiebreak keeps order stable
    for content in ["one", "two", "three", "four"] {
        chat.add_message(conv.id, MessageRole::User, content)
            .await
            .unwrap();
    }

    let messages = chat.get_messages(conv.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "three", "four"]);
}

#[tokio::test]
async fn test_add_message_bumps_conversation_updated_at() {
    let database = create_test_database().await;
    let chat = database.chat();
    let conv = chat.create_conversation("Bumped").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    chat.add_message(conv.id, MessageRole::User, "hi")
        .await
        .unwrap();

    let after = chat.get_conversation(conv.id).await.unwrap().unwrap();
    assert!(after.updated_at > conv.updated_at);
    assert_eq!(after.created_at, conv.created_at);
}

#[tokio::test]
async fn test_delete_conversation_removes_messages() {
    let database = create_test_database().await;
    let chat = database.chat();
    let conv = chat.create_conversation("Doomed").await.unwrap();
    let other = chat.create_conversation("Survivor").await.unwrap();

    chat.add_message(conv.id, MessageRole::User, "gone")
        .await
        .unwrap();
    chat.add_message(other.id, MessageRole::User, "kept")
        .await
        .unwrap();

    assert!(chat.delete_conversation(conv.id).await.unwrap());

    assert!(chat.get_conversation(conv.id).await.unwrap().is_none());
    assert_eq!(chat.get_message_count(conv.id).await.unwrap(), 0);

    // Unrelated conversations are untouched
    assert_eq!(chat.get_message_count(other.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_missing_conversation_returns_false() {
    let database = create_test_database().await;
    assert!(!database.chat().delete_conversation(123).await.unwrap());
}

#[tokio::test]
async fn test_message_count_tracks_both_roles() {
    let database = create_test_database().await;
    let chat = database.chat();
    let conv = chat.create_conversation("Counted").await.unwrap();

    assert_eq!(chat.get_message_count(conv.id).await.unwrap(), 0);

    chat.add_message(conv.id, MessageRole::User, "hi")
        .await
        .unwrap();
    assert_eq!(chat.get_message_count(conv.id).await.unwrap(), 1);

    chat.add_message(conv.id, MessageRole::Assistant, "hello")
        .await
        .unwrap();
    assert_eq!(chat.get_message_count(conv.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_title_reports_missing_row() {
    let database = create_test_database().await;
    let chat = database.chat();

    assert!(!chat.update_conversation_title(55, "nope").await.unwrap());

    let conv = chat.create_conversation("Before").await.unwrap();
    assert!(chat
        .update_conversation_title(conv.id, "After")
        .await
        .unwrap());
    let updated = chat.get_conversation(conv.id).await.unwrap().unwrap();
    assert_eq!(updated.title, "After");
}
