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

//! Scheduling decisions. Schedulers only read db snapshots and emit
//! operators; every db mutation goes through the operator controller.

mod balance;
mod basic;
mod split;

use std::sync::Arc;
use std::time::Duration;

pub use balance::BalanceScheduler;
pub use basic::BasicScheduler;
pub use split::SplitScheduler;

use rivercdc_common::{ChangefeedId, NodeId, SchedulerConfig};

use crate::operator::OperatorController;
use crate::replica::ReplicationDb;
use crate::split::SpanSplitter;
use crate::task::{spawn_periodic, TaskHandle};
use crate::watcher::NodeRegistry;

/// How often the basic scheduler fills absent spans.
const BASIC_SCHEDULE_INTERVAL: Duration = Duration::from_millis(500);
/// How often group checkers are polled for split proposals.
const SPLIT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(10);

/// One periodic scheduling policy.
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &'static str;
    fn interval(&self) -> Duration;
    fn execute(&self);
}

/// Owns the schedulers of one changefeed and runs each as a periodic task.
pub struct SchedulerController {
    schedulers: Vec<Arc<dyn Scheduler>>,
}

impl SchedulerController {
    pub fn new(
        changefeed_id: ChangefeedId,
        config: &SchedulerConfig,
        db: Arc<ReplicationDb>,
        operator_controller: Arc<OperatorController>,
        nodes: Arc<NodeRegistry>,
        splitter: Option<Arc<dyn SpanSplitter>>,
    ) -> Self {
        let mut schedulers: Vec<Arc<dyn Scheduler>> = vec![
            Arc::new(BasicScheduler::new(
                changefeed_id.clone(),
                config.batch_size,
                db.clone(),
                operator_controller.clone(),
                nodes.clone(),
            )),
            Arc::new(BalanceScheduler::new(
                changefeed_id.clone(),
                config.batch_size,
                config.balance_interval(),
                db.clone(),
                operator_controller.clone(),
                nodes.clone(),
            )),
        ];
        if let Some(splitter) = splitter {
            schedulers.push(Arc::new(SplitScheduler::new(
                changefeed_id,
                config.batch_size,
                db,
                operator_controller,
                nodes,
                splitter,
            )));
        }
        Self { schedulers }
    }

    /// Spawns one periodic task per scheduler and returns their handles.
    pub fn start(&self) -> Vec<TaskHandle> {
        self.schedulers
            .iter()
            .map(|scheduler| {
                let scheduler = scheduler.clone();
                spawn_periodic(scheduler.name(), scheduler.interval(), move || {
                    scheduler.execute()
                })
            })
            .collect()
    }
}

/// Alive nodes in stable order, so round-robin and balance decisions are
/// reproducible for one membership snapshot.
fn sorted_alive_nodes(nodes: &NodeRegistry) -> Vec<NodeId> {
    let mut alive = nodes.alive_nodes();
    alive.sort();
    alive
}
