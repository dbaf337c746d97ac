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

/// absent -> replicating on `dest`.
pub struct AddOperator {
    db: Arc<ReplicationDb>,
    span: Arc<SpanReplication>,
    dest: NodeId,
    timer: ResendTimer,
    finished: bool,
    /// The destination vanished; the span goes back to absent instead.
    removed: bool,
    canceled: bool,
}

impl AddOperator {
    pub fn new(db: Arc<ReplicationDb>, span: Arc<SpanReplication>, dest: NodeId) -> Self {
        Self {
            db,
            span,
            dest,
            timer: ResendTimer::new(),
            finished: false,
            removed: false,
            canceled: false,
        }
    }
}

impl Operator for AddOperator {
    fn id(&self) -> DispatcherId {
        self.span.id
    }

    fn operator_type(&self) -> &'static str {
        "add"
    }

    fn start(&mut self) {
        let old = self.span.node_id();
        self.db
            .bind_span_to_node(old.as_ref(), self.dest.clone(), &self.span);
    }

    fn schedule(&mut self) -> Option<TargetMessage> {
        if self.finished || !self.timer.should_send() {
            return None;
        }
        Some(schedule_message(
            &self.span,
            self.dest.clone(),
            ScheduleAction::Create,
        ))
    }

    fn check(&mut self, from: &NodeId, status: &TableSpanStatus) {
        if self.finished || from != &self.dest {
            return;
        }
        if status.component_status() == ComponentState::Working {
            self.span.update_status(status);
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_node_removed(&mut self, node: &NodeId) {
        if node == &self.dest {
            self.removed = true;
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
        if self.removed {
            self.db.mark_span_absent(&self.span);
        } else {
            self.db.mark_span_replicating(&self.span);
        }
    }

    fn affected_nodes(&self) -> Vec<NodeId> {
        vec![self.dest.clone()]
    }
}
