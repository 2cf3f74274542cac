use std::net::SocketAddr;
use tourdesk_api::{app, worker, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourdesk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tourdesk_store::Config::load()?;
    tracing::info!("Starting TourDesk API on port {}", config.server.port);

    let app_state = AppState::from_config(&config)?;

    // Side effects run off the request path
    let collaborators = collaborators(&config)?;
    tokio::spawn(worker::start_booking_worker(
        app_state.lifecycle.subscribe(),
        collaborators,
        app_state.metrics.clone(),
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn collaborators(config: &tourdesk_store::Config) -> anyhow::Result<worker::Collaborators> {
    let collaborators = worker::Collaborators::logging();
    let Some(brokers) = config.kafka.brokers.as_deref() else {
        return Ok(collaborators);
    };

    let producer = tourdesk_store::EventProducer::new(brokers)?;
    tracing::info!(topic = %config.kafka.topic, "Publishing booking events to Kafka");
    Ok(collaborators.with_notifier(std::sync::Arc::new(tourdesk_store::KafkaNotifier::new(
        producer,
        config.kafka.topic.clone(),
    ))))
}

#[cfg(not(feature = "kafka"))]
fn collaborators(config: &tourdesk_store::Config) -> anyhow::Result<worker::Collaborators> {
    if config.kafka.brokers.is_some() {
        tracing::warn!("kafka.brokers is set but the kafka feature is disabled; events are only logged");
    }
    Ok(worker::Collaborators::logging())
}
