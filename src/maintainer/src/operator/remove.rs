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

use rivercdc_common::{DispatcherId, NodeId};
use rivercdc_pb::{ComponentState, ScheduleAction, TableSpanStatus};

use crate::messaging::TargetMessage;
use crate::replica::{ReplicationDb, SpanReplication};

use super::{schedule_message, Operator, ResendTimer};

/// replicating on `node` -> gone. The span is usually already out of the db
/// (a `try_remove_*` dropped it); this operator only drives the node-side
/// teardown.
pub struct RemoveOperator {
    db: Arc<ReplicationDb>,
    span: Arc<SpanReplication>,
    node: NodeId,
    timer: ResendTimer,
    finished: bool,
}

impl RemoveOperator {
    pub fn new(db: Arc<ReplicationDb>, span: Arc<SpanReplication>, node: NodeId) -> Self {
        Self {
            db,
            span,
            node,
            timer: ResendTimer::new(),
            finished: false,
        }
    }
}

impl Operator for RemoveOperator {
    fn id(&self) -> DispatcherId {
        self.span.id
    }

    fn operator_type(&self) -> &'static str {
        "remove"
    }

    fn start(&mut self) {}

    fn schedule(&mut self) -> Option<TargetMessage> {
        if self.finished || !self.timer.should_send() {
            return None;
        }
        Some(schedule_message(
            &self.span,
            self.node.clone(),
            ScheduleAction::Remove,
        ))
    }

    fn check(&mut self, from: &NodeId, status: &TableSpanStatus) {
        if self.finished || from != &self.node {
            return;
        }
        if status.component_status() == ComponentState::Stopped {
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_node_removed(&mut self, node: &NodeId) {
        // the dispatcher died with its node, nothing left to stop
        if node == &self.node {
            self.finished = true;
        }
    }

    fn on_task_removed(&mut self) {
        self.finished = true;
    }

    fn post_finish(&mut self) {
        if self.db.get_task_by_id(self.span.id).is_some() {
            self.db.force_remove(self.span.id);
        }
    }

    fn affected_nodes(&self) -> Vec<NodeId> {
        vec![self.node.clone()]
    }
}
