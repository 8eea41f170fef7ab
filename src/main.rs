use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

mod config;
mod error;
mod kafka;
mod metrics;
mod pipeline;
mod web;

use crate::config::Settings;
use crate::kafka::{KafkaConsumer, KafkaProducer, KafkaReadinessProbe};
use crate::metrics::{RoleMetrics, CONSUMER_METRICS, PRODUCER_METRICS};
use crate::pipeline::shutdown::{self, Shutdown, ShutdownTrigger};
use crate::pipeline::{
    ConsumerLoop, LineFeed, MessageFeed, Pacer, ProducerLoop, ThreadedLineFeed, TimestampedFeed,
};
use crate::web::HealthServer;

#[derive(Parser)]
#[command(name = "kafka-pacer")]
#[command(about = "Fixed-rate Kafka producer and consumer with metrics and health probes")]
struct Cli {
    /// Optional config file; environment variables take precedence
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long, default_value = "8080")]
    http_port: u16,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Produce messages to KAFKA_TOPIC at MESSAGES_PER_SECOND
    Produce {
        /// Read one message per line from a file ("-" for stdin) instead of generating them
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Consume messages from KAFKA_TOPIC at MESSAGES_PER_SECOND
    Consume,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let (trigger, shutdown) = shutdown::channel();
    let trigger = Arc::new(trigger);
    tokio::spawn({
        let trigger = trigger.clone();
        async move { forward_signal(wait_for_signal().await, &trigger) }
    });

    match cli.role {
        Role::Produce { input } => {
            run_producer(settings, input, cli.http_port, &trigger, shutdown).await
        }
        Role::Consume => run_consumer(settings, cli.http_port, &trigger, shutdown).await,
    }
}

async fn run_producer(
    settings: Settings,
    input: Option<String>,
    http_port: u16,
    trigger: &ShutdownTrigger,
    shutdown: Shutdown,
) -> Result<()> {
    match input.as_deref() {
        None => produce(settings, TimestampedFeed, http_port, trigger, shutdown).await,
        Some("-") => {
            let feed = ThreadedLineFeed::spawn(std::io::BufReader::new(std::io::stdin()))
                .context("Failed to start stdin reader")?;
            produce(settings, feed, http_port, trigger, shutdown).await
        }
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path))?;
            let feed = LineFeed::new(BufReader::new(file));
            produce(settings, feed, http_port, trigger, shutdown).await
        }
    }
}

async fn produce<F: MessageFeed>(
    settings: Settings,
    feed: F,
    http_port: u16,
    trigger: &ShutdownTrigger,
    shutdown: Shutdown,
) -> Result<()> {
    let metrics = RoleMetrics::new(&PRODUCER_METRICS)?;
    let producer = KafkaProducer::new(&settings.kafka)?;
    let server = spawn_health_server(&settings, metrics.clone(), http_port, shutdown.clone());

    info!(
        "Starting producer on topic {} at {} messages/s",
        settings.kafka.topic,
        settings.rate.per_second()
    );
    ProducerLoop::new(
        producer,
        feed,
        Pacer::new(settings.rate),
        metrics,
        settings.max_messages,
    )
    .run(shutdown)
    .await;

    trigger.trigger();
    join_health_server(server).await;
    Ok(())
}

async fn run_consumer(
    settings: Settings,
    http_port: u16,
    trigger: &ShutdownTrigger,
    shutdown: Shutdown,
) -> Result<()> {
    let metrics = RoleMetrics::new(&CONSUMER_METRICS)?;
    let consumer = KafkaConsumer::subscribe(&settings.kafka)?;
    let server = spawn_health_server(&settings, metrics.clone(), http_port, shutdown.clone());

    info!(
        "Starting consumer on topic {} at {} messages/s",
        settings.kafka.topic,
        settings.rate.per_second()
    );
    ConsumerLoop::new(
        consumer,
        Pacer::new(settings.rate),
        metrics,
        settings.max_messages,
    )
    .run(shutdown)
    .await;

    trigger.trigger();
    join_health_server(server).await;
    Ok(())
}

fn spawn_health_server(
    settings: &Settings,
    metrics: RoleMetrics,
    port: u16,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    let server = HealthServer::new(metrics, KafkaReadinessProbe::from_settings(&settings.kafka));
    tokio::spawn(async move {
        if let Err(e) = server.start(port, shutdown).await {
            warn!("Health server error: {}", e);
        }
    })
}

async fn join_health_server(server: JoinHandle<()>) {
    if let Err(e) = server.await {
        warn!("Health server task failed: {}", e);
    }
}

/// Only a received signal stops the loops; without signal handling the
/// process keeps running.
fn forward_signal(result: std::io::Result<()>, trigger: &ShutdownTrigger) {
    match result {
        Ok(()) => {
            info!("Shutdown signal received, stopping");
            trigger.trigger();
        }
        Err(e) => warn!("Failed to listen for shutdown signals: {}", e),
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn signal_listener_failure_keeps_running() {
        let (trigger, shutdown) = shutdown::channel();

        forward_signal(Err(io::Error::other("no signal support")), &trigger);
        assert!(!shutdown.is_triggered());

        forward_signal(Ok(()), &trigger);
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn panicked_health_server_is_joined() {
        let server = tokio::spawn(async { panic!("health server crashed") });
        join_health_server(server).await;
    }
}
