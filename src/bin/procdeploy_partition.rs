//! procdeploy-partition: deploy process resources and print the partition log
//!
//! Starts an in-process cluster as configured, submits one deployment made of
//! the resource files given on the command line, and writes every record of
//! each partition's log to stdout as JSON lines.
//!
//! ## Usage
//! ```text
//! procdeploy-partition [--config procdeploy.yaml] order.yaml invoice.json
//! ```
//!
//! ## Configuration
//! - PROCDEPLOY_CONFIG: path to a configuration file
//! - PROCDEPLOY__*: configuration overrides (`PROCDEPLOY__PARTITION__PARTITIONS_COUNT=3`)
//! - PROCDEPLOY_LOG: log filter (default: info)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use procdeploy::clock::SystemClock;
use procdeploy::config::Config;
use procdeploy::partition::Cluster;
use procdeploy::protocol::DeploymentRecord;
use procdeploy::utils::bootstrap::init_tracing_with;

/// How long the log must stay unchanged before it is printed.
const SETTLE_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path = None;
    let mut resources = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(args.next().ok_or("--config requires a path")?);
        } else {
            resources.push(arg);
        }
    }

    let config = Config::load(config_path.as_deref())?;
    init_tracing_with(config.logging.format);

    let mut deployment = DeploymentRecord::new();
    for path in &resources {
        let content = std::fs::read_to_string(path)?;
        let name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path.as_str());
        deployment = deployment.with_resource(name, content);
    }

    let cluster = Cluster::start(&config, Arc::new(SystemClock));
    info!(resources = resources.len(), "submitting deployment");
    let response = cluster.deployment_partition().deploy(deployment).await?;
    if response.is_rejected() {
        warn!(response = %serde_json::to_string(&response)?, "deployment rejected");
    }

    settle(&cluster).await;
    for partition in cluster.partitions() {
        for record in partition.log().records() {
            println!("{}", serde_json::to_string(&record)?);
        }
    }

    cluster.shutdown();
    Ok(())
}

/// Wait until background workers stop appending to any log.
async fn settle(cluster: &Cluster) {
    let positions = || {
        cluster
            .partitions()
            .map(|p| p.log().last_position())
            .collect::<Vec<_>>()
    };
    let mut last = positions();
    loop {
        tokio::time::sleep(SETTLE_INTERVAL).await;
        let current = positions();
        if current == last {
            return;
        }
        last = current;
    }
}
