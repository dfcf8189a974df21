//! # Cluster Registry
//!
//! The in-process connection cache for all known remote clusters.
//!
//! [`ClusterRegistry`] is the only shared mutable structure in the
//! controller. Structural mutation (`insert`/`delete`) takes the write
//! lock, lookups take the read lock, and no network call ever happens while
//! a lock is held: [`ClusterRegistryService`] resolves credentials, builds
//! the HTTP client, and validates connectivity *before* installing the
//! entry as the final atomic step. A failed registration leaves any
//! previous entry untouched.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::{debug, info};

use crate::credentials::{self, ClusterClientConfig};
use crate::{ClusterRole, Error, RemoteCluster, Result};

/// One registered remote cluster: descriptor data plus the derived,
/// ready-to-use HTTP client handle.
#[derive(Debug, Clone)]
pub struct ClusterRegistration {
    /// Unique cluster name, immutable once registered
    pub name: String,
    /// Fleet role, used for role-scoped listing
    pub role: ClusterRole,
    /// URL of the remote cluster API
    pub api_endpoint: String,
    /// Namespace the remote operator runs in
    pub operator_namespace: String,
    /// Derived connection credentials
    pub client_config: ClusterClientConfig,
    /// Handle used to issue requests against the remote cluster; rebuilt
    /// whenever the client config changes
    pub http: reqwest::Client,
    /// Time of the last (re)construction of this entry
    pub cached_at: DateTime<Utc>,
}

/// Concurrent cache of all known remote clusters, keyed by name.
///
/// At most one registration per name; an entry is either absent or carries
/// a fully constructed client.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    entries: RwLock<HashMap<String, Arc<ClusterRegistration>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the registration under its name.
    pub fn insert(&self, registration: ClusterRegistration) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(registration.name.clone(), Arc::new(registration));
    }

    /// O(1) lookup; never blocks on network I/O.
    pub fn get(&self, name: &str) -> Option<Arc<ClusterRegistration>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    /// Remove the entry; deleting an absent name is a no-op.
    pub fn delete(&self, name: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(name);
    }

    /// All registrations whose role matches.
    pub fn list(&self, role: ClusterRole) -> Vec<Arc<ClusterRegistration>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter(|entry| entry.role == role)
            .cloned()
            .collect()
    }

    /// Number of registered clusters, all roles.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maintains the [`ClusterRegistry`] from `RemoteCluster` descriptors:
/// resolves the credentials secret, constructs the per-cluster client, and
/// installs the registration.
#[derive(Clone)]
pub struct ClusterRegistryService {
    client: Client,
    registry: Arc<ClusterRegistry>,
    timeout: Duration,
}

impl std::fmt::Debug for ClusterRegistryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterRegistryService")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ClusterRegistryService {
    pub fn new(client: Client, registry: Arc<ClusterRegistry>, timeout: Duration) -> Self {
        Self {
            client,
            registry,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    /// Resolve the descriptor's credentials secret and register the cluster.
    ///
    /// Fails without touching any previous entry when the secret is missing
    /// or malformed, or when the endpoint cannot be reached at all.
    pub async fn add_or_update(&self, cluster: &RemoteCluster) -> Result<()> {
        let name = cluster.name_any();
        let secret_ref = cluster
            .spec
            .secret_ref
            .as_ref()
            .filter(|r| !r.name.is_empty())
            .ok_or_else(|| {
                Error::Credentials(format!("cluster {name} declares no secret reference"))
            })?;

        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        let secret = secrets.get(&secret_ref.name).await?;
        let token = credentials::secret_token(&secret)?;

        self.register(cluster, &token).await
    }

    /// Register a cluster from an already resolved bearer token.
    pub async fn register(&self, cluster: &RemoteCluster, token: &str) -> Result<()> {
        register_cluster(&self.registry, cluster, token, self.timeout).await
    }

    /// Remove the cluster from the registry; idempotent.
    pub fn delete(&self, name: &str) {
        self.registry.delete(name);
        info!("Removed cluster {} from the registry", name);
    }
}

/// Register a cluster in the given registry from a resolved bearer token.
///
/// Re-registration with an unchanged client config (and role) is a no-op:
/// the cached entry and its client are kept as they are. Otherwise builds
/// the HTTP client, validates connectivity with one bounded request against
/// the API endpoint (any HTTP response counts as reachable, only a
/// transport failure does not), and only then installs the entry under the
/// write lock.
pub async fn register_cluster(
    registry: &ClusterRegistry,
    cluster: &RemoteCluster,
    token: &str,
    timeout: Duration,
) -> Result<()> {
    let name = cluster.name_any();
    let operator_namespace = credentials::operator_namespace(cluster);
    let client_config = credentials::compose_client_config(
        token,
        &cluster.spec.api_endpoint,
        &operator_namespace,
        cluster.spec.ca_bundle.as_deref(),
    );

    // the client config carries endpoint, namespace, token, and CA, so an
    // unchanged config means the cached client is still valid
    if let Some(existing) = registry.get(&name) {
        if existing.role == cluster.spec.role && existing.client_config == client_config {
            debug!("Registration of cluster {} is up to date", name);
            return Ok(());
        }
    }

    let http = build_http_client(token, cluster.spec.ca_bundle.as_deref(), timeout)?;

    // reqwest constructs clients lazily, so reachability is validated with
    // an actual request before the entry becomes visible
    match http.get(&cluster.spec.api_endpoint).send().await {
        Ok(response) => {
            debug!(
                "Validated connection to cluster {} ({})",
                name,
                response.status()
            );
        }
        Err(err) => return Err(Error::ClientBuild(err)),
    }

    registry.insert(ClusterRegistration {
        name: name.clone(),
        role: cluster.spec.role,
        api_endpoint: cluster.spec.api_endpoint.clone(),
        operator_namespace,
        client_config,
        http,
        cached_at: Utc::now(),
    });
    info!("Registered cluster {}", name);
    Ok(())
}

/// Build the HTTP client handle for one remote cluster.
///
/// The bearer token is installed as a default header; a CA bundle, when
/// declared, becomes an additional trusted root. The timeout bounds every
/// request issued through the handle.
pub fn build_http_client(
    token: &str,
    ca_bundle: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::Credentials("token contains invalid header characters".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);

    if let Some(ca) = ca_bundle.filter(|ca| !ca.is_empty()) {
        let certificate = reqwest::Certificate::from_pem(ca.as_bytes())?;
        builder = builder.add_root_certificate(certificate);
    }

    Ok(builder.build()?)
}
