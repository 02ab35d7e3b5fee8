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

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::{JoinError, JoinHandle};

use super::RawOutput;
use crate::error::SessionError;

/// Writable stdin of an in-flight remote process.
pub type ProcessStdin = Pin<Box<dyn AsyncWrite + Send>>;

/// stdout and stderr collected by a drain task.
///
/// Once the owning [`RemoteProcess`] is dropped the output can no longer be
/// read, so the buffers are released and later data is discarded.
#[derive(Debug)]
pub struct OutputSink {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    detached: Arc<AtomicBool>,
}

impl OutputSink {
    /// A sink for a command awaited in place; it is never detached.
    pub fn attached() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }

    fn new(detached: Arc<AtomicBool>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            detached,
        }
    }

    pub fn reserve(&mut self, stdout: usize, stderr: usize) {
        self.stdout.reserve(stdout);
        self.stderr.reserve(stderr);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub fn stdout(&mut self, data: &[u8]) {
        if !self.release_if_detached() {
            self.stdout.extend_from_slice(data);
        }
    }

    pub fn stderr(&mut self, data: &[u8]) {
        if !self.release_if_detached() {
            self.stderr.extend_from_slice(data);
        }
    }

    /// Bytes currently held.
    pub fn retained(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    pub fn into_raw(self, exit_code: i32) -> RawOutput {
        RawOutput {
            exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }

    fn release_if_detached(&mut self) -> bool {
        if !self.is_detached() {
            return false;
        }
        if self.stdout.capacity() > 0 || self.stderr.capacity() > 0 {
            self.stdout = Vec::new();
            self.stderr = Vec::new();
        }
        true
    }
}

/// Marks the sink detached when the process handle goes away.
struct DetachOnDrop(Arc<AtomicBool>);

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// An in-flight remote process.
///
/// stdin stays live for the caller; stdout, stderr and the exit status are
/// drained by a background task so the remote side never stalls on a full
/// window. Dropping the process detaches that task: the remote command keeps
/// running and its output is discarded.
pub struct RemoteProcess {
    stdin: Option<ProcessStdin>,
    completion: JoinHandle<Result<RawOutput, SessionError>>,
    _detach: DetachOnDrop,
}

impl RemoteProcess {
    /// Start draining with `drain`, which must resolve once the remote
    /// process has exited.
    pub fn spawn<F>(stdin: Option<ProcessStdin>, drain: F) -> Self
    where
        F: Future<Output = Result<RawOutput, SessionError>> + Send + 'static,
    {
        Self::spawn_draining(stdin, |_| drain)
    }

    /// Like [`spawn`](Self::spawn), with `drain` writing into an
    /// [`OutputSink`] that stops retaining output once this process is dropped.
    pub fn spawn_draining<F, Fut>(stdin: Option<ProcessStdin>, drain: F) -> Self
    where
        F: FnOnce(OutputSink) -> Fut,
        Fut: Future<Output = Result<RawOutput, SessionError>> + Send + 'static,
    {
        let detached = Arc::new(AtomicBool::new(false));
        let sink = OutputSink::new(Arc::clone(&detached));
        Self {
            stdin,
            completion: tokio::spawn(drain(sink)),
            _detach: DetachOnDrop(detached),
        }
    }

    /// Non-blocking completion check.
    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    pub fn stdin(&mut self) -> Option<&mut ProcessStdin> {
        self.stdin.as_mut()
    }

    /// Block until the process exits.
    ///
    /// stdin is shut down first so commands reading it see end-of-file.
    pub async fn finish(mut self) -> Result<Result<RawOutput, SessionError>, JoinError> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                tracing::trace!("Closing stdin of finished process failed: {}", e);
            }
        }
        self.completion.await
    }
}

impl std::fmt::Debug for RemoteProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProcess")
            .field("stdin", &self.stdin.as_ref().map(|_| "ProcessStdin"))
            .field("finished", &self.completion.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_finish_returns_drained_output() {
        let process = RemoteProcess::spawn(None, async {
            Ok(RawOutput {
                exit_code: 3,
                stdout: b"done\n".to_vec(),
                stderr: Vec::new(),
            })
        });

        let raw = process.finish().await.unwrap().unwrap();
        assert_eq!(raw.exit_code, 3);
        assert_eq!(raw.stdout_string(), "done\n");
    }

    #[tokio::test]
    async fn test_is_finished_tracks_drain() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let process = RemoteProcess::spawn(None, async move {
            let _ = rx.await;
            Ok(RawOutput::default())
        });

        assert!(!process.is_finished());
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(process.is_finished());
    }

    #[tokio::test]
    async fn test_finished_process_keeps_sink_output() {
        let process = RemoteProcess::spawn_draining(None, |mut sink| async move {
            sink.stdout(b"line\n");
            sink.stderr(b"warning\n");
            Ok(sink.into_raw(0))
        });

        let raw = process.finish().await.unwrap().unwrap();
        assert_eq!(raw.stdout_string(), "line\n");
        assert_eq!(raw.stderr, b"warning\n");
    }

    #[tokio::test]
    async fn test_dropped_process_stops_retaining_output() {
        let (resume_tx, resume_rx) = tokio::sync::oneshot::channel::<()>();
        let (retained_tx, retained_rx) = tokio::sync::oneshot::channel::<(bool, usize)>();
        let process = RemoteProcess::spawn_draining(None, |mut sink| async move {
            sink.stdout(b"before detach\n");
            let _ = resume_rx.await;
            for _ in 0..1000 {
                sink.stdout(b"monitor output that nobody reads\n");
                sink.stderr(b"noise\n");
            }
            let _ = retained_tx.send((sink.is_detached(), sink.retained()));
            Ok(sink.into_raw(0))
        });

        drop(process);
        resume_tx.send(()).unwrap();

        let (detached, retained) = retained_rx.await.unwrap();
        assert!(detached);
        assert_eq!(retained, 0);
    }

    #[test]
    fn test_attached_sink_retains_everything() {
        let mut sink = OutputSink::attached();
        sink.stdout(b"abc");
        sink.stderr(b"de");
        assert!(!sink.is_detached());
        assert_eq!(sink.retained(), 5);
    }
}
