mod config;

use broker::{ConfigSynthesizer, UpstreamCache};
use clap::Parser;
use config::{Config, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::MetricType;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "peerbridge", about = "PeerTube plugin descriptor broker")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    if let Some(metrics) = &config.common.metrics {
        if let Err(err) = install_statsd_recorder(metrics) {
            eprintln!("could not install statsd recorder: {err}");
            return ExitCode::FAILURE;
        }
        describe_metrics();
    }

    let cache = Arc::new(UpstreamCache::new(Duration::from_secs(
        config.broker.upstream_timeout_secs,
    )));
    let synthesizer = match ConfigSynthesizer::try_new(config.broker, cache) {
        Ok(synthesizer) => Arc::new(synthesizer),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = gateway::serve(config.gateway, synthesizer).await {
        tracing::error!(error = %err, "gateway exited");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn install_statsd_recorder(config: &MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = StatsdBuilder::from(&config.statsd_host, config.statsd_port)
        .build(Some("peerbridge"))?;
    metrics::set_global_recorder(recorder).map_err(|err| err.to_string())?;
    Ok(())
}

fn describe_metrics() {
    for def in broker::metrics_defs::ALL_METRICS {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}
