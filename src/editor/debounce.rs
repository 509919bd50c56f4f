// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The debounced auto-render scheduler.
//!
//! Every parameter change resets a fixed idle timer; only after the
//! editor has been quiet for the full window does the render fire, on a
//! blocking (non-real-time) task. A change arriving mid-render
//! supersedes it: the in-flight result is discarded and the newest
//! snapshot wins. Failures on this path are logged and never surface to
//! the editing flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::render::OfflineRenderer;
use super::session::SessionSnapshot;
use crate::model::RawBuffer;

/// The idle window before an auto-render fires.
pub(super) const DEBOUNCE: Duration = Duration::from_millis(1000);

/// Receives the committed canonical buffer.
pub(super) type CommitFn = Arc<dyn Fn(RawBuffer) + Send + Sync>;

/// One queued render request. Only the latest survives.
#[derive(Clone)]
struct RenderJob {
    generation: u64,
    buffer: RawBuffer,
    snapshot: SessionSnapshot,
}

pub(super) struct AutoRenderer {
    tx: watch::Sender<Option<RenderJob>>,
    /// Latest scheduled generation; a finished render only commits if it
    /// still matches (last-writer-wins).
    generation: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl AutoRenderer {
    pub(super) fn new(commit: CommitFn) -> Self {
        Self::with_debounce(commit, DEBOUNCE)
    }

    pub(super) fn with_debounce(commit: CommitFn, debounce: Duration) -> Self {
        let (tx, mut rx) = watch::channel(None::<RenderJob>);
        let generation = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn({
            let generation = generation.clone();
            async move {
                loop {
                    if rx.changed().await.is_err() {
                        return;
                    }
                    // Idle timer: every further change restarts it.
                    loop {
                        tokio::select! {
                            _ = tokio::time::sleep(debounce) => break,
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                            }
                        }
                    }

                    let job = rx.borrow_and_update().clone();
                    let Some(job) = job else { continue };
                    if generation.load(Ordering::SeqCst) != job.generation {
                        continue;
                    }

                    let job_generation = job.generation;
                    let rendered = tokio::task::spawn_blocking(move || {
                        OfflineRenderer::render(&job.buffer, &job.snapshot)
                    })
                    .await;

                    match rendered {
                        Ok(Ok(buffer)) => {
                            if generation.load(Ordering::SeqCst) == job_generation {
                                commit(buffer);
                                debug!("Auto-render committed");
                            } else {
                                debug!("Auto-render superseded, result discarded");
                            }
                        }
                        // Auto-save failures must not interrupt editing.
                        Ok(Err(err)) => error!(%err, "Auto-render failed"),
                        Err(err) => error!(%err, "Auto-render task failed"),
                    }
                }
            }
        });

        Self {
            tx,
            generation,
            task,
        }
    }

    /// Arms (or re-arms) the idle timer with the newest state.
    pub(super) fn schedule(&self, buffer: RawBuffer, snapshot: SessionSnapshot) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(Some(RenderJob {
            generation,
            buffer,
            snapshot,
        }));
    }

    /// Invalidates anything scheduled or in flight. Explicit renders
    /// call this so a stale auto result can never overwrite them.
    pub(super) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for AutoRenderer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::editor::session::EditSession;
    use crate::testutil;

    fn collector() -> (CommitFn, Arc<Mutex<Vec<RawBuffer>>>) {
        let commits: Arc<Mutex<Vec<RawBuffer>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = commits.clone();
        (
            Arc::new(move |buffer| {
                sink.lock().push(buffer);
            }),
            commits,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_fires_after_idle_window() {
        let (commit, commits) = collector();
        let auto = AutoRenderer::with_debounce(commit, Duration::from_millis(50));

        let buffer = testutil::ramp_buffer(100, 44100);
        let session = EditSession::new(buffer.duration().as_secs_f64());
        auto.schedule(buffer, session.snapshot());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(commits.lock().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rapid_changes_collapse_to_latest() {
        let (commit, commits) = collector();
        let auto = AutoRenderer::with_debounce(commit, Duration::from_millis(80));

        let buffer = testutil::ramp_buffer(1000, 44100);
        let mut session = EditSession::new(buffer.duration().as_secs_f64());
        for volume in [0.2f32, 0.4, 0.6, 2.0] {
            session.set_volume(volume);
            auto.schedule(buffer.clone(), session.snapshot());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        let commits = commits.lock();
        // One render, reflecting only the final volume.
        assert_eq!(commits.len(), 1);
        let last = commits[0].channels()[0].last().copied().unwrap();
        let expected = 999.0 / 1000.0 * 2.0;
        assert!((last - expected).abs() < 1e-4, "{last} vs {expected}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalidate_discards_pending_job() {
        let (commit, commits) = collector();
        let auto = AutoRenderer::with_debounce(commit, Duration::from_millis(50));

        let buffer = testutil::ramp_buffer(100, 44100);
        let session = EditSession::new(buffer.duration().as_secs_f64());
        auto.schedule(buffer, session.snapshot());
        auto.invalidate();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(commits.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_render_is_silent() {
        let (commit, commits) = collector();
        let auto = AutoRenderer::with_debounce(commit, Duration::from_millis(50));

        // An empty working buffer cannot render; the auto path swallows it.
        let buffer = RawBuffer::empty(1, 44100);
        let session = EditSession::new(1.0);
        auto.schedule(buffer, session.snapshot());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(commits.lock().is_empty());
    }
}
