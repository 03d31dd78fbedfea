//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod services;

use crate::constants::SERVICE_NAME;
use crate::state::AppState;
use anyhow::{Context, Result};
use kcst_core::Config;
use kcst_infra::LogFormat;
use std::sync::Arc;

pub use services::BackgroundTasks;

/// Initialize the entire application
pub async fn initialize_app(
    config: Config,
) -> Result<(Arc<AppState>, axum::Router, BackgroundTasks)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    kcst_infra::init_telemetry(
        SERVICE_NAME,
        config.environment(),
        LogFormat::for_environment(config.environment()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let state = services::initialize_services(&config).await?;
    let tasks = services::start_background_tasks(&state);
    let router = routes::setup_routes(&config, state.clone()).await?;

    Ok((state, router, tasks))
}
