//! Cluster Registry Controller Library
//!
//! This library provides the core functionality for the Cluster Registry
//! Controller: a registry of remote fleet clusters and the health-monitoring
//! control loop that keeps their status conditions current.
//!
//! The controller:
//!
//! 1. **Watches `RemoteCluster` resources** - each descriptor declares a
//!    remote cluster's API endpoint, credentials secret, and fleet role
//! 2. **Derives connection credentials** - migrates legacy token-only
//!    secrets into a structured client config document
//! 3. **Caches connections** - keeps one ready-to-use HTTP client per
//!    registered cluster in an in-process registry
//! 4. **Probes liveness** - periodically issues a `/healthz` request against
//!    every registered cluster and classifies the result
//! 5. **Reports conditions** - persists `Ready`/`Offline` conditions to the
//!    descriptor status, distinguishing "unreachable" from "reachable but
//!    unhealthy"

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod conditions;
pub mod credentials;
pub mod health;
pub mod lister;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod server;

pub use conditions::{ClusterCondition, ClusterConditionType};

/// Errors surfaced by the controller.
///
/// Transport failures while probing a remote cluster are never represented
/// here - they are classified into an `Offline` condition instead. Only
/// persistence-class failures (Kubernetes API I/O), credential problems,
/// and registry misses fail a reconciliation cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid cluster credentials: {0}")]
    Credentials(String),

    #[error("cluster {0} not found in the registry")]
    ClusterNotInCache(String),

    #[error("failed to build remote cluster client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("failed to serialize client config: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// RemoteCluster Custom Resource Definition
///
/// The persisted descriptor of one remote cluster in the fleet. The
/// controller watches these resources, keeps an in-memory registration per
/// descriptor, and writes reachability/health conditions back to the status
/// subresource.
///
/// # Example
///
/// ```yaml
/// apiVersion: multicluster.octopilot.io/v1alpha1
/// kind: RemoteCluster
/// metadata:
///   name: member-east
///   namespace: cluster-registry-system
/// spec:
///   apiEndpoint: https://api.east.example.com:6443
///   secretRef:
///     name: member-east-token
///   role: Member
///   operatorNamespace: fleet-member-operator
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "RemoteCluster",
    group = "multicluster.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "RemoteClusterStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint", "type":"string", "jsonPath":".spec.apiEndpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RemoteClusterSpec {
    /// URL of the remote cluster API
    pub api_endpoint: String,
    /// Reference to the secret holding the bearer token for the remote
    /// cluster. The secret lives in the descriptor's namespace and must
    /// carry a `token` key.
    #[serde(default)]
    pub secret_ref: Option<LocalSecretReference>,
    /// CA certificate bundle (PEM) for the remote API endpoint
    #[serde(default)]
    pub ca_bundle: Option<String>,
    /// Role of the cluster within the fleet
    #[serde(default)]
    pub role: ClusterRole,
    /// Namespace the remote operator runs in; scopes the generated client
    /// config context. Defaults to the descriptor's own namespace.
    #[serde(default)]
    pub operator_namespace: Option<String>,
}

/// Reference to a secret within the descriptor's namespace
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    /// Name of the secret
    pub name: String,
}

/// Role of a cluster within the multi-cluster fleet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ClusterRole {
    /// A workload-bearing member cluster
    #[default]
    Member,
    /// The fleet control-plane cluster
    Host,
    /// Registered but not eligible for role-scoped listing
    Other,
}

/// Status of a RemoteCluster resource
///
/// Updated by the health-monitoring loop after every probe. Region and
/// zones are topology metadata; the liveness probe never reports them, so
/// once set they are preserved across status updates.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteClusterStatus {
    /// Current cluster conditions, exactly one per condition type
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
    /// Region all of the cluster's nodes run in
    #[serde(default)]
    pub region: Option<String>,
    /// Availability zones the cluster's nodes run in
    #[serde(default)]
    pub zones: Option<Vec<String>>,
}

/// ClusterProvisioningPolicy Custom Resource Definition
///
/// External capacity/placement configuration for a registered cluster.
/// Read-only from this controller's perspective: the config lister joins a
/// policy to its cluster by `clusterRef` when producing cluster configs.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ClusterProvisioningPolicy",
    group = "multicluster.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "ClusterProvisioningPolicyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProvisioningPolicySpec {
    /// Name of the RemoteCluster this policy applies to
    pub cluster_ref: String,
    /// Whether the referenced cluster may receive new workloads
    #[serde(default)]
    pub enabled: bool,
    /// Maximum number of spaces that may be provisioned on the cluster
    #[serde(default)]
    pub max_spaces: u32,
    /// Memory utilization threshold (percent) above which the cluster is
    /// not eligible for placement
    #[serde(default)]
    pub max_memory_utilization_percent: u32,
    /// Placement roles the cluster fulfils
    #[serde(default)]
    pub placement_roles: Vec<String>,
}

/// Status of a ClusterProvisioningPolicy resource
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProvisioningPolicyStatus {
    /// Readiness of the policy itself
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}
