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

use std::sync::Arc;
use std::time::Duration;

use rivercdc_common::ChangefeedId;

use crate::operator::OperatorController;
use crate::replica::{GroupCheckResult, ReplicationDb};
use crate::split::SpanSplitter;
use crate::watcher::NodeRegistry;

use super::{Scheduler, SPLIT_SCHEDULE_INTERVAL};

/// Polls the per-group checkers and turns hot-span proposals into split
/// operators. Only constructed when `enable_table_across_nodes` is on.
pub struct SplitScheduler {
    changefeed_id: ChangefeedId,
    batch_size: usize,
    db: Arc<ReplicationDb>,
    operator_controller: Arc<OperatorController>,
    nodes: Arc<NodeRegistry>,
    splitter: Arc<dyn SpanSplitter>,
}

impl SplitScheduler {
    pub fn new(
        changefeed_id: ChangefeedId,
        batch_size: usize,
        db: Arc<ReplicationDb>,
        operator_controller: Arc<OperatorController>,
        nodes: Arc<NodeRegistry>,
        splitter: Arc<dyn SpanSplitter>,
    ) -> Self {
        Self {
            changefeed_id,
            batch_size,
            db,
            operator_controller,
            nodes,
            splitter,
        }
    }
}

impl Scheduler for SplitScheduler {
    fn name(&self) -> &'static str {
        "split-scheduler"
    }

    fn interval(&self) -> Duration {
        SPLIT_SCHEDULE_INTERVAL
    }

    fn execute(&self) {
        let node_count = self.nodes.node_count();
        if node_count == 0 {
            return;
        }
        for group in self.db.group_ids() {
            for result in self.db.check_by_group(group, self.batch_size) {
                let GroupCheckResult::Split { span } = result;
                if self.operator_controller.has_operator(span.id) {
                    continue;
                }
                // the splitter talks to the region metadata service, keep it
                // off the tick
                let changefeed_id = self.changefeed_id.clone();
                let splitter = self.splitter.clone();
                let operator_controller = self.operator_controller.clone();
                tokio::spawn(async move {
                    let new_spans = splitter.split(&span.span, node_count).await;
                    if new_spans.len() < 2 {
                        tracing::info!(
                            changefeed = %changefeed_id,
                            span = %span.id,
                            "hot span not splittable, skip"
                        );
                        return;
                    }
                    if let Some(op) =
                        operator_controller.new_split_operator(span.clone(), new_spans)
                    {
                        operator_controller.add_operator(op);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rivercdc_common::NodeId;
    use rivercdc_pb::ComponentState;

    use crate::test_utils::{
        even_splitter, new_db, new_span, working_status, MockMessageCenter,
    };
    use crate::watcher::NodeInfo;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_hot_span_becomes_split_operator() {
        let db = Arc::new(new_db(true));
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
        let node = NodeId::from("node-a");
        let span = new_span(&db, 7, 42, 100);
        db.add_absent(vec![span.clone()]);
        db.bind_span_to_node(None, node.clone(), &span);
        db.mark_span_replicating(&span);

        // a sustained hot streak
        for ts in 0..4u64 {
            let mut status = working_status(span.id, 100 + ts);
            status.event_size_per_second = 8.0 * 1024.0 * 1024.0;
            status.set_component_status(ComponentState::Working);
            db.update_status(&span, &status);
        }

        let scheduler = SplitScheduler::new(
            ChangefeedId::in_default_namespace("test"),
            1000,
            db.clone(),
            oc.clone(),
            nodes,
            even_splitter(),
        );
        scheduler.execute();
        // let the spawned split computation land
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(oc.operator_size(), 1);
        assert!(oc.has_operator(span.id));
        // the split operator parks the span in scheduling while it stops
        assert_eq!(db.get_scheduling().len(), 1);
    }
}
