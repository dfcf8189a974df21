//! Cluster registry integration tests
//!
//! Registration against loopback endpoints: a reachable endpoint yields a
//! cached entry with a working client, an unreachable one never obtains an
//! entry, and a failed re-registration leaves the previous entry intact.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;

use cluster_registry_controller::registry::{register_cluster, ClusterRegistry};
use cluster_registry_controller::{ClusterRole, Error};

use common::{new_remote_cluster, spawn_cluster_endpoint};

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_register_reachable_cluster() {
    let endpoint = spawn_cluster_endpoint(StatusCode::OK, "ok").await;
    let registry = ClusterRegistry::new();
    let cluster = new_remote_cluster("east", &endpoint, ClusterRole::Member);

    register_cluster(&registry, &cluster, "mycooltoken", TIMEOUT)
        .await
        .expect("registration should succeed");

    let entry = registry.get("east").expect("entry should be cached");
    assert_eq!(entry.name, "east");
    assert_eq!(entry.role, ClusterRole::Member);
    assert_eq!(entry.api_endpoint, endpoint);
    assert_eq!(entry.operator_namespace, "fleet-member-operator");
    assert_eq!(entry.client_config.auth_infos["auth"].token, "mycooltoken");

    // the cached client is usable for requests against the endpoint
    let response = entry
        .http
        .get(format!("{endpoint}/healthz"))
        .send()
        .await
        .expect("cached client should reach the endpoint");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_register_cluster_with_missing_health_endpoint() {
    // any HTTP response counts as reachable at registration time, even 404
    let endpoint = spawn_cluster_endpoint(StatusCode::NOT_FOUND, "").await;
    let registry = ClusterRegistry::new();
    let cluster = new_remote_cluster("not-found", &endpoint, ClusterRole::Member);

    register_cluster(&registry, &cluster, "mycooltoken", TIMEOUT)
        .await
        .expect("an HTTP 404 endpoint is still reachable");

    assert!(registry.get("not-found").is_some());
}

#[tokio::test]
async fn test_register_unreachable_cluster_fails() {
    let registry = ClusterRegistry::new();
    let cluster = new_remote_cluster("failing", "http://127.0.0.1:1", ClusterRole::Member);

    let err = register_cluster(&registry, &cluster, "mycooltoken", TIMEOUT)
        .await
        .expect_err("registration should fail for an unreachable endpoint");

    assert!(matches!(err, Error::ClientBuild(_)));
    assert!(registry.get("failing").is_none());
}

#[tokio::test]
async fn test_failed_reregistration_preserves_previous_entry() {
    let endpoint = spawn_cluster_endpoint(StatusCode::OK, "ok").await;
    let registry = ClusterRegistry::new();

    let cluster = new_remote_cluster("east", &endpoint, ClusterRole::Member);
    register_cluster(&registry, &cluster, "token-1", TIMEOUT)
        .await
        .expect("initial registration should succeed");

    // the descriptor moves to an endpoint nothing listens on
    let moved = new_remote_cluster("east", "http://127.0.0.1:1", ClusterRole::Member);
    register_cluster(&registry, &moved, "token-2", TIMEOUT)
        .await
        .expect_err("re-registration should fail");

    let entry = registry.get("east").expect("previous entry should survive");
    assert_eq!(entry.api_endpoint, endpoint);
    assert_eq!(entry.client_config.auth_infos["auth"].token, "token-1");
}

#[tokio::test]
async fn test_reregistration_rebuilds_client_and_timestamp() {
    let endpoint = spawn_cluster_endpoint(StatusCode::OK, "ok").await;
    let registry = ClusterRegistry::new();

    let cluster = new_remote_cluster("east", &endpoint, ClusterRole::Member);
    register_cluster(&registry, &cluster, "token-1", TIMEOUT)
        .await
        .unwrap();
    let first = registry.get("east").unwrap();

    register_cluster(&registry, &cluster, "token-2", TIMEOUT)
        .await
        .unwrap();
    let second = registry.get("east").unwrap();

    assert_eq!(second.client_config.auth_infos["auth"].token, "token-2");
    assert!(second.cached_at >= first.cached_at);
}

/// Serve `200 ok` on every path and count the requests received.
async fn spawn_counting_endpoint() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = Router::new().fallback(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (StatusCode::OK, "ok")
        }
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

#[tokio::test]
async fn test_reregistration_with_unchanged_credentials_is_noop() {
    let (endpoint, hits) = spawn_counting_endpoint().await;
    let registry = ClusterRegistry::new();
    let cluster = new_remote_cluster("east", &endpoint, ClusterRole::Member);

    register_cluster(&registry, &cluster, "token-1", TIMEOUT)
        .await
        .unwrap();
    let first = registry.get("east").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // same descriptor and token: the cached entry and its client are kept,
    // no validation request goes out
    register_cluster(&registry, &cluster, "token-1", TIMEOUT)
        .await
        .unwrap();
    let second = registry.get("east").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));

    // a changed token forces reconstruction and a fresh validation request
    register_cluster(&registry, &cluster, "token-2", TIMEOUT)
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(
        registry.get("east").unwrap().client_config.auth_infos["auth"].token,
        "token-2"
    );
}

#[tokio::test]
async fn test_delete_after_register() {
    let endpoint = spawn_cluster_endpoint(StatusCode::OK, "ok").await;
    let registry = ClusterRegistry::new();
    let cluster = new_remote_cluster("east", &endpoint, ClusterRole::Member);
    register_cluster(&registry, &cluster, "mycooltoken", TIMEOUT)
        .await
        .unwrap();

    registry.delete("east");
    assert!(registry.get("east").is_none());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_role_scoped_listing() {
    let endpoint = spawn_cluster_endpoint(StatusCode::OK, "ok").await;
    let registry = ClusterRegistry::new();

    for (name, role) in [
        ("east", ClusterRole::Member),
        ("west", ClusterRole::Member),
        ("host", ClusterRole::Host),
    ] {
        let cluster = new_remote_cluster(name, &endpoint, role);
        register_cluster(&registry, &cluster, "mycooltoken", TIMEOUT)
            .await
            .unwrap();
    }

    let mut members: Vec<String> = registry
        .list(ClusterRole::Member)
        .into_iter()
        .map(|entry| entry.name.clone())
        .collect();
    members.sort();
    assert_eq!(members, vec!["east", "west"]);

    let hosts = registry.list(ClusterRole::Host);
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name, "host");
}
