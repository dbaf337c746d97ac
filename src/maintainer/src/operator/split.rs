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
use rivercdc_pb::{ComponentState, ScheduleAction, TableSpan, TableSpanStatus};

use crate::messaging::TargetMessage;
use crate::replica::{ReplicationDb, SpanReplication};

use super::{schedule_message, Operator, ResendTimer};

/// Replaces one span with `new_spans`: stop the owning dispatcher, then swap
/// the replica set at the stopped checkpoint. The replacements come up
/// through the usual absent -> add path.
pub struct SplitOperator {
    db: Arc<ReplicationDb>,
    span: Arc<SpanReplication>,
    node: NodeId,
    new_spans: Vec<TableSpan>,
    timer: ResendTimer,
    finished: bool,
    canceled: bool,
}

impl SplitOperator {
    pub fn new(
        db: Arc<ReplicationDb>,
        span: Arc<SpanReplication>,
        node: NodeId,
        new_spans: Vec<TableSpan>,
    ) -> Self {
        Self {
            db,
            span,
            node,
            new_spans,
            timer: ResendTimer::new(),
            finished: false,
            canceled: false,
        }
    }
}

impl Operator for SplitOperator {
    fn id(&self) -> DispatcherId {
        self.span.id
    }

    fn operator_type(&self) -> &'static str {
        "split"
    }

    fn start(&mut self) {
        self.db.mark_span_scheduling(&self.span);
    }

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
            // the stopped checkpoint caps the replacements' start ts
            self.span.update_status(status);
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_node_removed(&mut self, node: &NodeId) {
        // the dispatcher died with its node; split from the last reported
        // checkpoint
        if node == &self.node {
            self.finished = true;
        }
    }

    fn on_task_removed(&mut self) {
        self.canceled = true;
        self.finished = true;
    }

    fn post_finish(&mut self) {
        if self.canceled {
            return;
        }
        tracing::info!(
            changefeed = %self.span.changefeed_id,
            span = %self.span.id,
            table_id = self.span.span.table_id,
            parts = self.new_spans.len(),
            "split span into new replica sets"
        );
        self.db
            .replace_replica_set(&[self.span.clone()], &self.new_spans, self.span.checkpoint_ts());
    }

    fn affected_nodes(&self) -> Vec<NodeId> {
        vec![self.node.clone()]
    }
}
