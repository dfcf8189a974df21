//! # Cluster Registry Controller
//!
//! A Kubernetes controller that maintains a live registry of remote clusters
//! participating in a multi-cluster fleet and continuously monitors their
//! reachability and health.
//!
//! ## Overview
//!
//! This controller provides the control-plane primitive other fleet services
//! depend on by:
//!
//! 1. **Watching RemoteCluster descriptors** - registration and
//!    deregistration of remote cluster connections
//! 2. **Deriving credentials** - one-time migration of legacy token-only
//!    secrets into structured client config documents
//! 3. **Caching connections** - one ready-to-use client per cluster in a
//!    concurrent in-process registry
//! 4. **Probing health** - periodic `/healthz` liveness checks classified
//!    into Ready/Offline condition pairs
//! 5. **Exposing cluster configs** - role-filtered listings joined with
//!    per-cluster provisioning policies
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for configuration and deployment notes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::{watcher, Controller};
use tracing::{error, info};

use cluster_registry_controller::reconciler::Reconciler;
use cluster_registry_controller::registry::{ClusterRegistry, ClusterRegistryService};
use cluster_registry_controller::server::{start_server, ServerState};
use cluster_registry_controller::{health, metrics, RemoteCluster};

fn env_duration_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_registry_controller=info".into()),
        )
        .init();

    info!("Starting Cluster Registry Controller");

    metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
    });

    let server_state_clone = server_state.clone();
    let server_port = std::env::var("METRICS_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Operator namespace scopes both the watched descriptors and the
    // credential secret lookups
    let namespace = std::env::var("POD_NAMESPACE")
        .unwrap_or_else(|_| "cluster-registry-system".to_string());
    let requeue_after =
        env_duration_secs("HEALTH_CHECK_INTERVAL_SECONDS", Duration::from_secs(10));
    let probe_timeout =
        env_duration_secs("HEALTH_CHECK_TIMEOUT_SECONDS", health::DEFAULT_PROBE_TIMEOUT);

    let client = Client::try_default().await?;

    let clusters: Api<RemoteCluster> = Api::namespaced(client.clone(), &namespace);

    let registry = Arc::new(ClusterRegistry::new());
    let registry_service = ClusterRegistryService::new(client.clone(), registry, probe_timeout);
    let reconciler = Arc::new(Reconciler::new(
        client,
        registry_service,
        requeue_after,
        probe_timeout,
    ));

    server_state
        .is_ready
        .store(true, std::sync::atomic::Ordering::Relaxed);

    info!(
        "Watching RemoteCluster resources in namespace {} (interval {:?}, probe timeout {:?})",
        namespace, requeue_after, probe_timeout
    );

    Controller::new(clusters, watcher::Config::default())
        .shutdown_on_signal()
        .run(Reconciler::reconcile, Reconciler::error_policy, reconciler)
        .for_each(|_| std::future::ready(()))
        .await;

    info!("Controller stopped");

    Ok(())
}
