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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use rivercdc_common::{ChangefeedId, NodeId};

use crate::operator::OperatorController;
use crate::replica::{ReplicationDb, SpanReplication};
use crate::watcher::NodeRegistry;

use super::{sorted_alive_nodes, Scheduler};

/// A node may run this many more replicating spans than the lightest node
/// before the balancer steps in.
const BALANCE_THRESHOLD: usize = 1;

/// Evens replicating spans out across nodes. Only acts on a quiet
/// changefeed: pending operators or absent spans postpone balancing to the
/// next interval.
pub struct BalanceScheduler {
    changefeed_id: ChangefeedId,
    batch_size: usize,
    balance_interval: Duration,
    db: Arc<ReplicationDb>,
    operator_controller: Arc<OperatorController>,
    nodes: Arc<NodeRegistry>,
}

impl BalanceScheduler {
    pub fn new(
        changefeed_id: ChangefeedId,
        batch_size: usize,
        balance_interval: Duration,
        db: Arc<ReplicationDb>,
        operator_controller: Arc<OperatorController>,
        nodes: Arc<NodeRegistry>,
    ) -> Self {
        Self {
            changefeed_id,
            batch_size,
            balance_interval,
            db,
            operator_controller,
            nodes,
        }
    }
}

impl Scheduler for BalanceScheduler {
    fn name(&self) -> &'static str {
        "balance-scheduler"
    }

    fn interval(&self) -> Duration {
        self.balance_interval
    }

    fn execute(&self) {
        if self.db.absent_size() > 0 || self.operator_controller.operator_size() > 0 {
            // scheduling is still in flight, counts would lie
            return;
        }
        let nodes = sorted_alive_nodes(&self.nodes);
        if nodes.len() < 2 {
            return;
        }

        let mut node_spans: HashMap<NodeId, Vec<Arc<SpanReplication>>> =
            nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        for span in self.db.get_replicating() {
            let Some(node) = span.node_id() else { continue };
            if let Some(spans) = node_spans.get_mut(&node) {
                spans.push(span);
            }
        }

        let mut moved = 0;
        while moved < self.batch_size {
            let (heaviest, lightest) = match node_spans
                .iter()
                .sorted_by_key(|(node, spans)| (spans.len(), (*node).clone()))
                .map(|(node, _)| node.clone())
                .collect::<Vec<_>>()
                .as_slice()
            {
                [first, .., last] => (last.clone(), first.clone()),
                _ => break,
            };
            let max = node_spans[&heaviest].len();
            let min = node_spans[&lightest].len();
            if max - min <= BALANCE_THRESHOLD {
                break;
            }

            let span = node_spans.get_mut(&heaviest).unwrap().pop().unwrap();
            let op = self.operator_controller.new_move_operator(
                span.clone(),
                heaviest.clone(),
                lightest.clone(),
            );
            if self.operator_controller.add_operator(op) {
                tracing::info!(
                    changefeed = %self.changefeed_id,
                    span = %span.id,
                    from = %heaviest,
                    to = %lightest,
                    "balance moves span"
                );
                node_spans.get_mut(&lightest).unwrap().push(span);
                moved += 1;
            }
        }
    }
}
