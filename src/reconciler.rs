//! # Reconciler
//!
//! Core reconciliation logic for `RemoteCluster` resources.
//!
//! One cycle handles exactly one cluster name:
//!
//! 1. Fetch the descriptor; a deleted descriptor stops monitoring and
//!    removes the registry entry
//! 2. Migrate the legacy token secret into a structured client config
//! 3. Ensure the cluster is registered in the connection cache
//! 4. A registry miss is fatal for the cycle: the status is forced to a
//!    single `Offline=True` condition and the cycle is recorded as failed
//! 5. Otherwise probe the cluster's liveness endpoint and merge the
//!    resulting conditions into the existing status
//! 6. Re-queue after the configured interval regardless of outcome - health
//!    checking is continuous, not edge-triggered
//!
//! Transport failures never fail a cycle; they become an `Offline`
//! condition. Persistence failures propagate and rely on the re-queue for
//! retry.

use std::sync::Arc;
use std::time::Instant;

use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use crate::conditions::{cluster_offline_condition, set_conditions, CONDITION_TRUE};
use crate::health::{probe_cluster, ClusterHealth};
use crate::registry::ClusterRegistryService;
use crate::{credentials, metrics, Error, RemoteCluster, RemoteClusterStatus, Result};

/// Context shared by every reconciliation cycle.
#[derive(Clone)]
pub struct Reconciler {
    client: Client,
    registry: ClusterRegistryService,
    requeue_after: std::time::Duration,
    probe_timeout: std::time::Duration,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("requeue_after", &self.requeue_after)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Client,
        registry: ClusterRegistryService,
        requeue_after: std::time::Duration,
        probe_timeout: std::time::Duration,
    ) -> Self {
        Self {
            client,
            registry,
            requeue_after,
            probe_timeout,
        }
    }

    pub fn registry(&self) -> &ClusterRegistryService {
        &self.registry
    }

    /// One reconciliation cycle for a single `RemoteCluster`.
    pub async fn reconcile(
        cluster: Arc<RemoteCluster>,
        ctx: Arc<Reconciler>,
    ) -> Result<Action, Error> {
        let start = Instant::now();
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

        info!("Reconciling RemoteCluster: {}", name);
        metrics::increment_reconciliations();

        let api: Api<RemoteCluster> = Api::namespaced(ctx.client.clone(), &namespace);

        // re-read the descriptor so deletion is observed even when the
        // triggering event carried a stale object
        let Some(current) = api.get_opt(&name).await? else {
            ctx.registry.delete(&name);
            metrics::set_clusters_registered(ctx.registry.registry().len() as i64);
            info!("RemoteCluster {} is gone, monitoring stopped", name);
            return Ok(Action::await_change());
        };

        if credentials::migrate_secret_to_client_config(&ctx.client, &current).await? {
            metrics::increment_credential_migrations();
        }

        if let Err(err) = ctx.registry.add_or_update(&current).await {
            warn!("Failed to register cluster {}: {}", name, err);
        }
        metrics::set_clusters_registered(ctx.registry.registry().len() as i64);

        let Some(entry) = ctx.registry.registry().get(&name) else {
            // no connection could be established; claim nothing about
            // readiness and report the cluster as offline
            let mut status = current.status.clone().unwrap_or_default();
            force_offline(&mut status);
            if let Err(err) = ctx.update_status(&api, &name, &status).await {
                error!("Failed to update the status of RemoteCluster {}: {}", name, err);
            }
            metrics::increment_health_checks(metrics::HEALTH_OUTCOME_OFFLINE);
            return Err(Error::ClusterNotInCache(name));
        };

        let health = probe_cluster(&entry, ctx.probe_timeout).await;
        metrics::increment_health_checks(health_outcome(&health));

        let mut status = current.status.clone().unwrap_or_default();
        merge_health(&mut status, health);
        ctx.update_status(&api, &name, &status).await?;

        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        Ok(Action::requeue(ctx.requeue_after))
    }

    /// Invoked by the controller runtime whenever a cycle fails.
    pub fn error_policy(
        cluster: Arc<RemoteCluster>,
        error: &Error,
        ctx: Arc<Reconciler>,
    ) -> Action {
        error!(
            "Reconciliation error for {}: {}",
            cluster.name_any(),
            error
        );
        metrics::increment_reconciliation_errors();
        Action::requeue(ctx.requeue_after)
    }

    async fn update_status(
        &self,
        api: &Api<RemoteCluster>,
        name: &str,
        status: &RemoteClusterStatus,
    ) -> Result<()> {
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply("cluster-registry-controller"),
            &Patch::Merge(patch),
        )
        .await?;
        Ok(())
    }
}

/// Merge probed conditions into the status, replacing by type and keeping
/// everything else (unrelated condition types, region/zones metadata).
fn merge_health(status: &mut RemoteClusterStatus, health: ClusterHealth) {
    set_conditions(&mut status.conditions, health.into_conditions());
}

/// Force the status to a single `Offline=True` condition.
///
/// Deliberately drops any previously recorded `Ready` condition: callers
/// distinguish "never probed" from "actively unhealthy" by its absence.
fn force_offline(status: &mut RemoteClusterStatus) {
    status.conditions = vec![cluster_offline_condition()];
}

fn health_outcome(health: &ClusterHealth) -> &'static str {
    if health.offline.status == CONDITION_TRUE {
        return metrics::HEALTH_OUTCOME_OFFLINE;
    }
    match health.ready.as_ref().map(|c| c.status == CONDITION_TRUE) {
        Some(true) => metrics::HEALTH_OUTCOME_READY,
        _ => metrics::HEALTH_OUTCOME_NOT_READY,
    }
}
