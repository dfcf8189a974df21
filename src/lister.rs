//! # Config Lister
//!
//! Produces the typed, role-filtered view of registered clusters that
//! downstream consumers (tenant placement, tier provisioning) read. Each
//! registered cluster is joined with the `ClusterProvisioningPolicy` that
//! references it by name; clusters without a policy are still listed with
//! disabled provisioning defaults.
//!
//! The call fails as a whole when the policy listing fails - consumers
//! never see partial results.

use std::sync::Arc;

use kube::api::ListParams;
use kube::{Api, Client};

use crate::registry::{ClusterRegistration, ClusterRegistry};
use crate::{ClusterProvisioningPolicy, ClusterRole, Result};

/// Provisioning settings joined from a cluster's policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub enabled: bool,
    pub max_spaces: u32,
    pub max_memory_utilization_percent: u32,
    pub placement_roles: Vec<String>,
}

/// One registered cluster as exposed to consumers.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub name: String,
    pub role: ClusterRole,
    pub api_endpoint: String,
    pub operator_namespace: String,
    pub provisioning: ProvisioningConfig,
}

/// List all registered clusters of the given role, joined with their
/// provisioning policies from the operator namespace.
pub async fn list_cluster_configs(
    client: &Client,
    registry: &ClusterRegistry,
    namespace: &str,
    role: ClusterRole,
) -> Result<Vec<ClusterConfig>> {
    let api: Api<ClusterProvisioningPolicy> = Api::namespaced(client.clone(), namespace);
    let policies = api.list(&ListParams::default()).await?;
    Ok(join_cluster_configs(registry.list(role), &policies.items))
}

/// Join registrations with the policies referencing them by cluster name.
pub fn join_cluster_configs(
    entries: Vec<Arc<ClusterRegistration>>,
    policies: &[ClusterProvisioningPolicy],
) -> Vec<ClusterConfig> {
    entries
        .into_iter()
        .map(|entry| {
            let provisioning = policies
                .iter()
                .find(|policy| policy.spec.cluster_ref == entry.name)
                .map(|policy| ProvisioningConfig {
                    enabled: policy.spec.enabled,
                    max_spaces: policy.spec.max_spaces,
                    max_memory_utilization_percent: policy.spec.max_memory_utilization_percent,
                    placement_roles: policy.spec.placement_roles.clone(),
                })
                .unwrap_or_default();

            ClusterConfig {
                name: entry.name.clone(),
                role: entry.role,
                api_endpoint: entry.api_endpoint.clone(),
                operator_namespace: entry.operator_namespace.clone(),
                provisioning,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::compose_client_config;
    use crate::ClusterProvisioningPolicySpec;

    fn registration(name: &str, role: ClusterRole) -> Arc<ClusterRegistration> {
        let endpoint = format!("http://{name}.com");
        Arc::new(ClusterRegistration {
            name: name.to_string(),
            role,
            api_endpoint: endpoint.clone(),
            operator_namespace: "fleet-member".to_string(),
            client_config: compose_client_config("token", &endpoint, "fleet-member", None),
            http: reqwest::Client::new(),
            cached_at: chrono::Utc::now(),
        })
    }

    fn policy(name: &str, cluster_ref: &str, max_spaces: u32, roles: &[&str]) -> ClusterProvisioningPolicy {
        ClusterProvisioningPolicy::new(
            name,
            ClusterProvisioningPolicySpec {
                cluster_ref: cluster_ref.to_string(),
                enabled: true,
                max_spaces,
                max_memory_utilization_percent: 80,
                placement_roles: roles.iter().map(ToString::to_string).collect(),
            },
        )
    }

    #[test]
    fn test_join_with_matching_policies() {
        let entries = vec![
            registration("east", ClusterRole::Member),
            registration("west", ClusterRole::Member),
        ];
        let policies = vec![
            policy("eastSpc", "east", 1000, &["tenant1"]),
            policy("westSpc", "west", 500, &["tenant2"]),
        ];

        let mut configs = join_cluster_configs(entries, &policies);
        configs.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "east");
        assert!(configs[0].provisioning.enabled);
        assert_eq!(configs[0].provisioning.max_spaces, 1000);
        assert_eq!(configs[0].provisioning.placement_roles, vec!["tenant1"]);
        assert_eq!(configs[1].name, "west");
        assert_eq!(configs[1].provisioning.max_spaces, 500);
    }

    #[test]
    fn test_join_without_policy_uses_disabled_defaults() {
        let entries = vec![registration("host", ClusterRole::Host)];
        let configs = join_cluster_configs(entries, &[]);

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].provisioning, ProvisioningConfig::default());
        assert!(!configs[0].provisioning.enabled);
        assert!(configs[0].provisioning.placement_roles.is_empty());
    }

    #[test]
    fn test_join_ignores_policies_for_other_clusters() {
        let entries = vec![registration("east", ClusterRole::Member)];
        let policies = vec![policy("noiseSpc", "noise", 10, &["tenant9"])];

        let configs = join_cluster_configs(entries, &policies);
        assert_eq!(configs.len(), 1);
        assert!(!configs[0].provisioning.enabled);
    }

    #[test]
    fn test_join_preserves_registration_fields() {
        let entries = vec![registration("east", ClusterRole::Member)];
        let configs = join_cluster_configs(entries, &[]);

        assert_eq!(configs[0].role, ClusterRole::Member);
        assert_eq!(configs[0].api_endpoint, "http://east.com");
        assert_eq!(configs[0].operator_namespace, "fleet-member");
    }
}
