//! Integration tests for the player routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{get_json, id_of, player, post_json, server};

#[tokio::test]
async fn test_leave_abandons_empty_instance() {
    // Arrange
    let server = server().await;
    let owner = player();
    let created = server.create("crypt", owner, false).await;

    // Act
    let (status, json) = post_json(
        server.app.clone(),
        &format!("/api/v1/players/{owner}/leave"),
        &json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], created["id"]);
    assert_eq!(json["state"], "EXPIRING");
    assert_eq!(json["occupants"], json!([]));
}

#[tokio::test]
async fn test_leave_without_instance_returns_404() {
    let server = server().await;

    let (status, json) = post_json(
        server.app.clone(),
        &format!("/api/v1/players/{}/leave", player()),
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_in_instance");
}

#[tokio::test]
async fn test_disconnect_reports_instance_left() {
    // Arrange
    let server = server().await;
    let owner = player();
    let created = server.create("crypt", owner, false).await;

    // Act
    let (status, json) = post_json(
        server.app.clone(),
        &format!("/api/v1/players/{owner}/disconnect"),
        &json!({}),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["instance"], created["id"]);
    let (_, instance) = get_json(
        server.app.clone(),
        &format!("/api/v1/instances/{}", id_of(&created)),
    )
    .await;
    assert_eq!(instance["state"], "EXPIRING");
}

#[tokio::test]
async fn test_disconnect_outside_instance_returns_null() {
    let server = server().await;

    let (status, json) = post_json(
        server.app.clone(),
        &format!("/api/v1/players/{}/disconnect", player()),
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["instance"].is_null());
}

#[tokio::test]
async fn test_instance_created_for_disconnected_player_is_abandoned() {
    // Arrange
    let server = server().await;
    let owner = player();
    post_json(
        server.app.clone(),
        &format!("/api/v1/players/{owner}/disconnect"),
        &json!({}),
    )
    .await;

    // Act
    let created = server.create("crypt", owner, false).await;

    // Assert
    assert_eq!(created["state"], "EXPIRING");
    assert_eq!(created["occupants"], json!([]));
}
