//! # Credential Resolver
//!
//! Turns a stored bearer-token secret into a structured client config
//! document and performs the one-time migration of legacy token-only
//! secrets.
//!
//! The client config is kubeconfig-shaped: exactly one context, one cluster
//! endpoint (with optional CA data), and one bearer-token auth entry. The
//! migration serializes the composed document and writes it back into the
//! secret only when the bytes differ from what is already stored, so
//! repeated migrations with unchanged secret data issue exactly one write.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, RemoteCluster, Result};

/// Secret data key holding the bearer token for the remote cluster
pub const TOKEN_SECRET_KEY: &str = "token";
/// Secret data key holding the serialized client config document
pub const CLIENT_CONFIG_SECRET_KEY: &str = "clientConfig";

const CONTEXT_NAME: &str = "ctx";
const CLUSTER_NAME: &str = "cluster";
const AUTH_NAME: &str = "auth";

/// Structured connection credentials for one remote cluster.
///
/// Maps are kept ordered so serialization is deterministic and the
/// byte-for-byte idempotence check in [`migrate_secret_to_client_config`]
/// is reliable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterClientConfig {
    #[serde(rename = "current-context")]
    pub current_context: String,
    pub contexts: BTreeMap<String, ContextEntry>,
    pub clusters: BTreeMap<String, ClusterEntry>,
    #[serde(rename = "auth-infos")]
    pub auth_infos: BTreeMap<String, AuthInfoEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    pub namespace: String,
    #[serde(rename = "auth-info")]
    pub auth_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub server: String,
    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfoEntry {
    pub token: String,
}

/// Compose the single-context client config for a remote cluster.
pub fn compose_client_config(
    token: &str,
    api_endpoint: &str,
    operator_namespace: &str,
    ca_bundle: Option<&str>,
) -> ClusterClientConfig {
    let certificate_authority_data = ca_bundle
        .filter(|ca| !ca.is_empty())
        .map(|ca| BASE64.encode(ca.as_bytes()));

    ClusterClientConfig {
        current_context: CONTEXT_NAME.to_string(),
        contexts: BTreeMap::from([(
            CONTEXT_NAME.to_string(),
            ContextEntry {
                cluster: CLUSTER_NAME.to_string(),
                namespace: operator_namespace.to_string(),
                auth_info: AUTH_NAME.to_string(),
            },
        )]),
        clusters: BTreeMap::from([(
            CLUSTER_NAME.to_string(),
            ClusterEntry {
                server: api_endpoint.to_string(),
                certificate_authority_data,
            },
        )]),
        auth_infos: BTreeMap::from([(
            AUTH_NAME.to_string(),
            AuthInfoEntry {
                token: token.to_string(),
            },
        )]),
    }
}

/// Serialize a client config to the bytes stored in the secret.
pub fn client_config_bytes(config: &ClusterClientConfig) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(config)?.into_bytes())
}

/// Extract the bearer token from a cluster credentials secret.
pub fn secret_token(secret: &Secret) -> Result<String> {
    let name = secret.name_any();
    let data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(TOKEN_SECRET_KEY))
        .ok_or_else(|| Error::Credentials(format!("secret {name} has no token key")))?;

    let token = String::from_utf8(data.0.clone())
        .map_err(|_| Error::Credentials(format!("secret {name} token is not valid utf-8")))?;
    if token.is_empty() {
        return Err(Error::Credentials(format!("secret {name} token is empty")));
    }
    Ok(token)
}

/// The operator namespace declared by the descriptor, falling back to the
/// namespace the descriptor itself lives in.
pub fn operator_namespace(cluster: &RemoteCluster) -> String {
    cluster
        .spec
        .operator_namespace
        .clone()
        .or_else(|| cluster.namespace())
        .unwrap_or_else(|| "default".to_string())
}

/// Migrate a legacy token-only secret into a structured client config.
///
/// No-op (returns `Ok(false)`) when the descriptor carries no secret
/// reference. Otherwise composes the config from the secret token and the
/// descriptor's endpoint/CA, and writes the serialized document back into
/// the secret only when the stored bytes differ. Returns whether a write
/// occurred. Read/write failures propagate; the surrounding control loop's
/// re-queue takes care of retries.
pub async fn migrate_secret_to_client_config(
    client: &Client,
    cluster: &RemoteCluster,
) -> Result<bool> {
    let Some(secret_ref) = cluster.spec.secret_ref.as_ref().filter(|r| !r.name.is_empty()) else {
        return Ok(false);
    };

    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let mut secret = secrets.get(&secret_ref.name).await?;

    let token = secret_token(&secret)?;
    let config = compose_client_config(
        &token,
        &cluster.spec.api_endpoint,
        &operator_namespace(cluster),
        cluster.spec.ca_bundle.as_deref(),
    );
    let desired = client_config_bytes(&config)?;

    let existing = secret
        .data
        .as_ref()
        .and_then(|data| data.get(CLIENT_CONFIG_SECRET_KEY))
        .map(|bytes| bytes.0.as_slice());

    if existing == Some(desired.as_slice()) {
        return Ok(false);
    }

    secret
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(CLIENT_CONFIG_SECRET_KEY.to_string(), ByteString(desired));
    secrets
        .replace(&secret_ref.name, &PostParams::default(), &secret)
        .await?;

    info!(
        "Migrated secret {} to a structured client config",
        secret_ref.name
    );
    Ok(true)
}
