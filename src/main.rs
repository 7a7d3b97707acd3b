use std::sync::Arc;

use anyhow::Context;
use poem::listener::TcpListener;
use poem::EndpointExt;
use poem_openapi::OpenApiService;

use weathergate::api::{HealthApi, MetricsApi, TemperatureApi};
use weathergate::config::Config;
use weathergate::downstream::{ResilientTemperatureClient, TemperatureClient, TEMPERATURE_SERVICE};
use weathergate::health::HealthRegistry;
use weathergate::logging::init;
use weathergate::observability::RequestTracingMiddleware;
use weathergate::resilience::{BreakerHooks, CircuitBreaker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    let temperature_client = TemperatureClient::new(&config.temperature_service_url, config.request_timeout)
        .context("failed to create temperature client")?;

    let breaker = CircuitBreaker::with_config(TEMPERATURE_SERVICE, config.breaker_config())
        .with_hooks(BreakerHooks::logging());
    let resilient_client = Arc::new(ResilientTemperatureClient::with_breaker(
        Arc::new(temperature_client),
        Arc::new(breaker),
        config.backoff_schedule.clone(),
        config.call_timeout,
    ));

    let registry = Arc::new(HealthRegistry::new());
    registry.register_executor(TEMPERATURE_SERVICE, resilient_client.executor());

    let api_service = OpenApiService::new(
        (
            HealthApi::new(Arc::clone(&registry)),
            MetricsApi::new(registry),
            TemperatureApi::new(resilient_client),
        ),
        "WeatherGate API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(format!("http://localhost:{}", config.port));

    let spec = api_service.spec_endpoint();

    let app = poem::Route::new()
        .nest("/", api_service)
        .nest("/spec", spec)
        .with(RequestTracingMiddleware);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        temperature_service = %config.temperature_service_url,
        failure_threshold = config.failure_threshold,
        break_secs = config.break_duration.as_secs(),
        "Starting WeatherGate server on {}",
        addr
    );

    poem::Server::new(TcpListener::bind(&addr)).run(app).await?;

    Ok(())
}
