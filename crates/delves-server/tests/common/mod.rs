//! Shared test helpers for server integration tests.
#![allow(dead_code)]

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use delves_server::config::ServerConfig;
use delves_server::routes;
use delves_server::startup::{self, Delves};
use delves_test_support::TemplateFixture;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

/// Catalog used by every server test.
pub const CATALOG: &str = r#"
templates:
  - name: crypt
    display_name: The Crypt
    cooldown_secs: 60
    max_occupants: 2
    spawn: "5,70,5"
    conditions:
      - { type: kill_count, count: 2, priority: 1 }
  - name: arena
    conditions:
      - { type: kill_all }
"#;

/// A started server over a temporary directory tree.
pub struct TestServer {
    pub fixture: TemplateFixture,
    pub config: ServerConfig,
    pub delves: Delves,
    pub app: Router,
}

/// Configuration pointing every path into `fixture`.
pub fn config_for(fixture: &TemplateFixture) -> ServerConfig {
    let root = fixture.root();
    let vars: HashMap<&str, String> = [
        ("DELVES_WORLD_CONTAINER", fixture.world_container()),
        ("DELVES_TEMPLATE_DIR", fixture.template_dir()),
        ("DELVES_TEMPLATE_CATALOG", root.join("templates.yaml")),
        ("DELVES_COOLDOWN_SNAPSHOT", root.join("cooldowns.json")),
    ]
    .into_iter()
    .map(|(key, path)| (key, path.display().to_string()))
    .collect();
    ServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Fixture with the `crypt` and `arena` templates and the catalog file.
pub fn fixture() -> TemplateFixture {
    let fixture = TemplateFixture::new()
        .with_template("crypt")
        .with_template("arena");
    std::fs::write(fixture.root().join("templates.yaml"), CATALOG).unwrap();
    fixture
}

/// Starts a server over `fixture`.
pub async fn start_with(fixture: TemplateFixture) -> TestServer {
    let config = config_for(&fixture);
    let delves = startup::start(&config).await.unwrap();
    let app = routes::app(delves.state.clone());
    TestServer {
        fixture,
        config,
        delves,
        app,
    }
}

/// Starts a server over a fresh fixture.
pub async fn server() -> TestServer {
    start_with(fixture()).await
}

/// A fresh player id.
pub fn player() -> Uuid {
    Uuid::new_v4()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

impl TestServer {
    /// Creates an instance through the API and returns its JSON summary.
    pub async fn create(&self, template: &str, owner: Uuid, public: bool) -> serde_json::Value {
        let (status, json) = post_json(
            self.app.clone(),
            "/api/v1/instances",
            &serde_json::json!({ "template": template, "owner": owner, "public": public }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
        json
    }
}

/// Instance id of a summary.
pub fn id_of(summary: &serde_json::Value) -> String {
    summary["id"].as_str().unwrap().to_owned()
}

/// World name of a summary.
pub fn world_of(summary: &serde_json::Value) -> String {
    summary["world"].as_str().unwrap().to_owned()
}
