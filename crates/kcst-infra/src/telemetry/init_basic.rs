use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "kcst=debug,tower_http=debug";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

impl LogFormat {
    /// JSON in production, pretty everywhere else.
    pub fn for_environment(environment: &str) -> Self {
        match environment.to_ascii_lowercase().as_str() {
            "production" | "prod" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize tracing for the process.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(
    service_name: &str,
    environment: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    tracing::info!(
        service = service_name,
        environment,
        format = ?format,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_environment() {
        assert_eq!(LogFormat::for_environment("production"), LogFormat::Json);
        assert_eq!(LogFormat::for_environment("PROD"), LogFormat::Json);
        assert_eq!(LogFormat::for_environment("development"), LogFormat::Pretty);
        assert_eq!(LogFormat::for_environment(""), LogFormat::Pretty);
    }
}
