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

/// replicating on `origin` -> replicating on `dest`. Two phases: stop the
/// dispatcher on the origin, then create it on the destination from the
/// stopped checkpoint.
pub struct MoveOperator {
    db: Arc<ReplicationDb>,
    span: Arc<SpanReplication>,
    origin: NodeId,
    dest: NodeId,
    timer: ResendTimer,
    origin_stopped: bool,
    finished: bool,
    /// The destination vanished mid-move; the span goes back to absent.
    removed: bool,
    canceled: bool,
}

impl MoveOperator {
    pub fn new(
        db: Arc<ReplicationDb>,
        span: Arc<SpanReplication>,
        origin: NodeId,
        dest: NodeId,
    ) -> Self {
        Self {
            db,
            span,
            origin,
            dest,
            timer: ResendTimer::new(),
            origin_stopped: false,
            finished: false,
            removed: false,
            canceled: false,
        }
    }
}

impl Operator for MoveOperator {
    fn id(&self) -> DispatcherId {
        self.span.id
    }

    fn operator_type(&self) -> &'static str {
        "move"
    }

    fn start(&mut self) {
        self.db
            .bind_span_to_node(Some(&self.origin), self.dest.clone(), &self.span);
    }

    fn schedule(&mut self) -> Option<TargetMessage> {
        if self.finished || !self.timer.should_send() {
            return None;
        }
        if self.origin_stopped {
            Some(schedule_message(
                &self.span,
                self.dest.clone(),
                ScheduleAction::Create,
            ))
        } else {
            Some(schedule_message(
                &self.span,
                self.origin.clone(),
                ScheduleAction::Remove,
            ))
        }
    }

    fn check(&mut self, from: &NodeId, status: &TableSpanStatus) {
        if self.finished {
            return;
        }
        if !self.origin_stopped
            && from == &self.origin
            && status.component_status() == ComponentState::Stopped
        {
            // the stopped checkpoint is where the destination resumes
            self.span.update_status(status);
            self.origin_stopped = true;
            return;
        }
        if self.origin_stopped
            && from == &self.dest
            && status.component_status() == ComponentState::Working
        {
            self.span.update_status(status);
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn on_node_removed(&mut self, node: &NodeId) {
        if node == &self.origin {
            // nothing left to stop on the origin
            self.origin_stopped = true;
        }
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
        vec![self.origin.clone(), self.dest.clone()]
    }
}
