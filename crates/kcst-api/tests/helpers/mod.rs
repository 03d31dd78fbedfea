//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p kcst-api --test files_test`.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::TestServer;
use kcst_api::setup::{routes, services};
use kcst_api::state::AppState;
use kcst_core::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_BASE_URL: &str = "http://files.test";

/// Test application: server plus the owned temp directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        &self.config.storage.upload_dir
    }
}

/// Setup test app with default retention on a fresh temp directory.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// Setup test app with extra configuration variables, e.g. `("MAX_FILE_SIZE", "16B")`.
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("BASE_URL".into(), TEST_BASE_URL.into());
    vars.insert(
        "UPLOAD_DIR".into(),
        temp_dir.path().join("uploads").display().to_string(),
    );
    vars.insert(
        "DB_PATH".into(),
        temp_dir.path().join("data").join("kcst.db").display().to_string(),
    );
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_vars(&vars).expect("Failed to build test config");
    config.validate().expect("Invalid test config");

    let state = services::initialize_services(&config)
        .await
        .expect("Failed to initialize services");

    let app = routes::setup_routes(&config, state.clone())
        .await
        .expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        config,
        _temp_dir: temp_dir,
    }
}
