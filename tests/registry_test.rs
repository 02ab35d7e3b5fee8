// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session registry lifecycle.

mod common;

use cluster_exec::{Command, ExecError};
use common::{hosts_vec, LocalCluster};

#[tokio::test]
async fn test_open_all_hosts() {
    let cluster = LocalCluster::new();
    let registry = cluster.registry();
    assert!(!registry.is_usable());

    registry
        .open(&hosts_vec(&["hostA", "hostB", "hostA"]))
        .await
        .unwrap();

    assert!(registry.is_usable());
    assert_eq!(registry.hosts().await, vec!["hostA", "hostB"]);
    assert_eq!(cluster.attempts("hostA"), 1);
    registry.close().await;
}

#[tokio::test]
async fn test_open_is_best_effort() {
    let cluster = LocalCluster::new();
    cluster.set_unreachable("hostB", true);
    let registry = cluster.registry();

    let err = registry
        .open(&hosts_vec(&["hostA", "hostB", "hostC"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Connect { .. }));
    assert_eq!(err.failed_hosts(), vec!["hostB"]);
    assert!(err.to_string().contains("hostB"));
    assert!(!registry.is_usable());

    // Every host was attempted and stays registered.
    assert_eq!(cluster.attempts("hostC"), 1);
    assert_eq!(registry.hosts().await, vec!["hostA", "hostB", "hostC"]);

    // The healthy hosts are usable right away.
    let lease = registry.session("hostC").await.unwrap();
    assert_eq!(lease.host(), "hostC");
    drop(lease);

    // The failed host is retried on demand once it comes back.
    cluster.set_unreachable("hostB", false);
    let registry_ref = std::sync::Arc::clone(&registry);
    let executor = cluster_exec::Executor::new(registry_ref);
    let outcome = executor
        .execute(&Command::new("hostname").on("hostB"))
        .await
        .unwrap();
    assert_eq!(outcome.lines().unwrap(), ["hostB"]);
    registry.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let cluster = LocalCluster::new();
    let registry = cluster.registry();

    // Never opened.
    registry.close().await;

    registry.open(&hosts_vec(&["hostA"])).await.unwrap();
    registry.close().await;
    registry.close().await;

    assert!(registry.hosts().await.is_empty());
    assert!(!registry.is_usable());
    assert!(matches!(
        registry.any_host().await,
        Err(ExecError::NoHostsAvailable)
    ));
}

#[tokio::test]
async fn test_any_host_covers_registered_hosts() {
    let cluster = LocalCluster::new();
    let registry = cluster.registry();
    registry
        .open(&hosts_vec(&["hostA", "hostB"]))
        .await
        .unwrap();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        seen.insert(registry.any_host().await.unwrap());
    }
    assert_eq!(seen.len(), 2);
    registry.close().await;
}

#[tokio::test]
async fn test_discard_forces_reconnect() {
    let cluster = LocalCluster::new();
    let registry = cluster.registry();
    registry.open(&hosts_vec(&["hostA"])).await.unwrap();

    registry.discard("hostA").await;
    registry.discard("unknown").await;
    let _lease = registry.session("hostA").await.unwrap();
    assert_eq!(cluster.attempts("hostA"), 2);
}
