//! # Health Prober
//!
//! Issues a single liveness request against a registered remote cluster and
//! classifies the outcome into a condition pair.
//!
//! Classification distinguishes network-level failure from application-level
//! failure, because consumers treat the two very differently (evacuate
//! workloads versus merely avoid scheduling):
//!
//! - transport error, timeout, or a non-success status: the cluster is
//!   treated as unreachable (`Offline=True`); no `Ready` claim is made, so
//!   any previously recorded `Ready` condition survives the merge
//! - 2xx with the body `ok`: `Ready=True`, `Offline=False`
//! - 2xx with any other body: `Ready=False`, `Offline=False`

use std::time::Duration;

use tracing::debug;

use crate::conditions::{
    cluster_not_ready_condition, cluster_offline_condition, cluster_reachable_condition,
    cluster_ready_condition, ClusterCondition,
};
use crate::registry::ClusterRegistration;

/// Liveness endpoint probed on every remote cluster
pub const HEALTHZ_PATH: &str = "/healthz";
/// Body a healthy cluster responds with
pub const HEALTHZ_OK_BODY: &str = "ok";
/// Default bound on one liveness probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probe outcome as a condition pair.
///
/// `ready` is `None` when the probe could not make any application-level
/// health claim (the cluster was unreachable); the merge then leaves the
/// previous `Ready` condition in place.
#[derive(Debug, Clone)]
pub struct ClusterHealth {
    pub ready: Option<ClusterCondition>,
    pub offline: ClusterCondition,
}

impl ClusterHealth {
    fn unreachable() -> Self {
        Self {
            ready: None,
            offline: cluster_offline_condition(),
        }
    }

    fn healthy() -> Self {
        Self {
            ready: Some(cluster_ready_condition()),
            offline: cluster_reachable_condition(),
        }
    }

    fn unhealthy() -> Self {
        Self {
            ready: Some(cluster_not_ready_condition()),
            offline: cluster_reachable_condition(),
        }
    }

    /// Conditions to merge into the descriptor status, offline first.
    pub fn into_conditions(self) -> impl Iterator<Item = ClusterCondition> {
        std::iter::once(self.offline).chain(self.ready)
    }
}

/// Issue one liveness probe against the registration's endpoint, bounded by
/// `timeout`.
pub async fn probe_cluster(entry: &ClusterRegistration, timeout: Duration) -> ClusterHealth {
    let url = format!(
        "{}{}",
        entry.api_endpoint.trim_end_matches('/'),
        HEALTHZ_PATH
    );

    let response = match entry.http.get(&url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(err) => {
            debug!("Cluster {} is not reachable: {}", entry.name, err);
            return ClusterHealth::unreachable();
        }
    };

    if !response.status().is_success() {
        debug!(
            "Cluster {} health endpoint returned {}",
            entry.name,
            response.status()
        );
        return ClusterHealth::unreachable();
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!(
                "Failed to read health response body from cluster {}: {}",
                entry.name, err
            );
            return ClusterHealth::unreachable();
        }
    };

    if body.eq_ignore_ascii_case(HEALTHZ_OK_BODY) {
        ClusterHealth::healthy()
    } else {
        ClusterHealth::unhealthy()
    }
}
