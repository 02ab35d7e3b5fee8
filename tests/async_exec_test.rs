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

//! Non-blocking launch, polling, collection and bounded waits.

mod common;

use cluster_exec::executor::{INCOMPLETE_EXIT_CODE, INCOMPLETE_MESSAGE};
use cluster_exec::Command;
use common::LocalCluster;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn test_start_and_collect() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let handle = executor
        .start(&Command::new("sleep 0.3; printf done").on("hostA"))
        .await
        .unwrap();
    assert_eq!(handle.host(), "hostA");
    assert!(!handle.is_finished());

    let outcome = handle.collect().await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.lines().unwrap(), ["done"]);
    registry.close().await;
}

#[tokio::test]
async fn test_poll_reports_completion() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let handle = executor
        .start(&Command::new("exit 4").on("hostA"))
        .await
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "process never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let outcome = handle.collect().await.unwrap();
    assert_eq!(outcome.exit_code(), 4);
    assert!(!outcome.is_success());
    registry.close().await;
}

#[tokio::test]
async fn test_stdin_is_live() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let mut handle = executor
        .start(&Command::new("cat").on("hostA"))
        .await
        .unwrap();
    let stdin = handle.stdin().unwrap();
    stdin.write_all(b"line one\nline two\n").await.unwrap();
    stdin.flush().await.unwrap();

    // Waiting closes stdin, so cat exits.
    let outcome = handle.wait(None).await.unwrap();
    assert_eq!(outcome.lines().unwrap(), ["line one", "line two"]);
    registry.close().await;
}

#[tokio::test]
async fn test_wait_without_timeout_collects() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let handle = executor
        .start(&Command::new("printf ok").on("hostA"))
        .await
        .unwrap();
    let outcome = handle.wait(None).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.lines().unwrap(), ["ok"]);
    registry.close().await;
}

#[tokio::test]
async fn test_wait_finishes_before_timeout() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let handle = executor
        .start(&Command::new("printf quick").on("hostA"))
        .await
        .unwrap();
    let outcome = handle.wait(Some(Duration::from_secs(10))).await.unwrap();
    assert!(outcome.is_success());
    assert!(!outcome.is_incomplete());
    registry.close().await;
}

#[tokio::test]
async fn test_wait_timeout_leaves_process_running() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;
    let marker = cluster.remote_path("hostA", "finished");

    let handle = executor
        .start(&Command::new("sleep 3; touch finished").on("hostA"))
        .await
        .unwrap();

    let timeout = Duration::from_millis(1500);
    let started = Instant::now();
    let outcome = handle.wait(Some(timeout)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= timeout, "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2800), "returned too late: {elapsed:?}");
    assert!(!outcome.is_success());
    assert!(outcome.is_incomplete());
    assert_eq!(outcome.exit_code(), INCOMPLETE_EXIT_CODE);
    assert_eq!(outcome.error(), INCOMPLETE_MESSAGE);
    assert_eq!(outcome.host(), "hostA");

    // The abandoned command still completes on its own.
    assert!(!marker.exists());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(marker.exists());
    registry.close().await;
}

#[tokio::test]
async fn test_start_reconnects_after_kill() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    cluster.kill("hostA");
    let handle = executor
        .start(&Command::new("hostname").on("hostA"))
        .await
        .unwrap();
    let outcome = handle.collect().await.unwrap();
    assert_eq!(outcome.lines().unwrap(), ["hostA"]);
    assert_eq!(cluster.attempts("hostA"), 2);
    registry.close().await;
}

#[tokio::test]
async fn test_start_does_not_block_the_host() {
    let cluster = LocalCluster::new();
    let (registry, executor) = cluster.executor(&["hostA"]).await;

    let handle = executor
        .start(&Command::new("sleep 2").on("hostA"))
        .await
        .unwrap();

    let started = Instant::now();
    let outcome = executor
        .execute(&Command::new("printf free").on("hostA"))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!handle.is_finished());
    drop(handle);
    registry.close().await;
}
