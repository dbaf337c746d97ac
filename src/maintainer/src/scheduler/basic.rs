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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rivercdc_common::ChangefeedId;

use crate::operator::OperatorController;
use crate::replica::ReplicationDb;
use crate::watcher::NodeRegistry;

use super::{sorted_alive_nodes, Scheduler, BASIC_SCHEDULE_INTERVAL};

/// Fills absent spans: batches them up and round-robins them over the alive
/// nodes through add operators.
pub struct BasicScheduler {
    changefeed_id: ChangefeedId,
    batch_size: usize,
    db: Arc<ReplicationDb>,
    operator_controller: Arc<OperatorController>,
    nodes: Arc<NodeRegistry>,
    /// Round robin cursor over the sorted alive nodes.
    node_rr: AtomicUsize,
}

impl BasicScheduler {
    pub fn new(
        changefeed_id: ChangefeedId,
        batch_size: usize,
        db: Arc<ReplicationDb>,
        operator_controller: Arc<OperatorController>,
        nodes: Arc<NodeRegistry>,
    ) -> Self {
        Self {
            changefeed_id,
            batch_size,
            db,
            operator_controller,
            nodes,
            node_rr: AtomicUsize::new(0),
        }
    }
}

impl Scheduler for BasicScheduler {
    fn name(&self) -> &'static str {
        "basic-scheduler"
    }

    fn interval(&self) -> Duration {
        BASIC_SCHEDULE_INTERVAL
    }

    fn execute(&self) {
        let absent = self.db.get_absent(self.batch_size);
        if absent.is_empty() {
            return;
        }
        let nodes = sorted_alive_nodes(&self.nodes);
        if nodes.is_empty() {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                absent = absent.len(),
                "no alive node to schedule absent spans"
            );
            return;
        }

        let mut scheduled = 0;
        for span in absent {
            let idx = self.node_rr.fetch_add(1, Ordering::Relaxed) % nodes.len();
            let dest = nodes[idx].clone();
            let op = self.operator_controller.new_add_operator(span, dest);
            if self.operator_controller.add_operator(op) {
                scheduled += 1;
            }
        }
        tracing::info!(
            changefeed = %self.changefeed_id,
            scheduled,
            "basic scheduler filled absent spans"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rivercdc_common::NodeId;

    use crate::test_utils::{new_db, new_span, MockMessageCenter};
    use crate::watcher::NodeInfo;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_round_robin_over_alive_nodes() {
        let db = Arc::new(new_db(false));
        let mc = Arc::new(MockMessageCenter::default());
        let oc = Arc::new(OperatorController::new(
            ChangefeedId::in_default_namespace("test"),
            db.clone(),
            mc,
            1000,
        ));
        let nodes = Arc::new(NodeRegistry::new());
        for name in ["node-a", "node-b"] {
            nodes.upsert_node(NodeInfo {
                id: NodeId::from(name),
                advertise_addr: String::new(),
            });
        }

        let spans = (0..4).map(|i| new_span(&db, 7, 40 + i, 100)).collect::<Vec<_>>();
        db.add_absent(spans.clone());

        let scheduler = BasicScheduler::new(
            ChangefeedId::in_default_namespace("test"),
            1000,
            db.clone(),
            oc.clone(),
            nodes,
        );
        scheduler.execute();

        assert_eq!(oc.operator_size(), 4);
        assert_eq!(db.absent_size(), 0);
        let mut per_node: HashMap<NodeId, usize> = HashMap::new();
        for span in &spans {
            *per_node.entry(span.node_id().unwrap()).or_default() += 1;
        }
        assert_eq!(per_node.len(), 2);
        assert!(per_node.values().all(|&count| count == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alive_nodes_keeps_spans_absent() {
        let db = Arc::new(new_db(false));
        let mc = Arc::new(MockMessageCenter::default());
        let oc = Arc::new(OperatorController::new(
            ChangefeedId::in_default_namespace("test"),
            db.clone(),
            mc,
            1000,
        ));
        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span]);

        let scheduler = BasicScheduler::new(
            ChangefeedId::in_default_namespace("test"),
            1000,
            db.clone(),
            oc.clone(),
            Arc::new(NodeRegistry::new()),
        );
        scheduler.execute();
        assert_eq!(oc.operator_size(), 0);
        assert_eq!(db.absent_size(), 1);
    }
}
