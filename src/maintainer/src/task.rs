// Copyright 2025 RiverCDC Authors
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

//! Shared periodic-task plumbing. Each tick must be short and non-blocking;
//! long work belongs behind its own timeout on the worker side.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle of one spawned periodic task. Dropping the handle does not stop
/// the task; call [`TaskHandle::cancel`].
pub struct TaskHandle {
    name: &'static str,
    join: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TaskHandle {
    /// Asks the task to retire. The task skips any further ticks and exits
    /// before the next one fires.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            tracing::info!(task = self.name, "periodic task cancelled");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawns `tick` on the shared runtime every `period`.
pub fn spawn_periodic<F>(name: &'static str, period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    return;
                }
                _ = interval.tick() => {
                    tick();
                }
            }
        }
    });
    TaskHandle {
        name,
        join,
        shutdown: Some(shutdown_tx),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_periodic_tick_and_cancel() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut handle = spawn_periodic("test", Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        let ticked = count.load(Ordering::SeqCst);
        assert!(ticked >= 3, "expected at least 3 ticks, got {ticked}");

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }
}
