//! Shared helpers for integration tests: loopback cluster endpoints and
//! RemoteCluster fixtures.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use cluster_registry_controller::{
    ClusterRole, LocalSecretReference, RemoteCluster, RemoteClusterSpec,
};

/// Serve a fixed `/healthz` response on a loopback listener and return the
/// base URL. Requests to any other path get a plain 404, which is enough
/// for registration-time connectivity validation.
pub async fn spawn_cluster_endpoint(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route("/healthz", get(move || async move { (status, body) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn new_remote_cluster(name: &str, api_endpoint: &str, role: ClusterRole) -> RemoteCluster {
    RemoteCluster::new(
        name,
        RemoteClusterSpec {
            api_endpoint: api_endpoint.to_string(),
            secret_ref: Some(LocalSecretReference {
                name: format!("{name}-token"),
            }),
            ca_bundle: None,
            role,
            operator_namespace: Some("fleet-member-operator".to_string()),
        },
    )
}
