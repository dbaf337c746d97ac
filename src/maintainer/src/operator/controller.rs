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

use parking_lot::Mutex;
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{TableSpan, TableSpanStatus};

use crate::messaging::MessageCenter;
use crate::replica::{ReplicationDb, SpanReplication};

use super::{AddOperator, MoveOperator, Operator, RemoveOperator, SplitOperator};

/// Queue of in-flight span mutations with an at-most-one-operator-per-span
/// discipline. Runs as a periodic task: each tick sends or resends the
/// pending RPCs and retires finished operators.
pub struct OperatorController {
    changefeed_id: ChangefeedId,
    db: Arc<ReplicationDb>,
    message_center: Arc<dyn MessageCenter>,
    batch_size: usize,
    operators: Mutex<HashMap<DispatcherId, Box<dyn Operator>>>,
}

impl OperatorController {
    pub fn new(
        changefeed_id: ChangefeedId,
        db: Arc<ReplicationDb>,
        message_center: Arc<dyn MessageCenter>,
        batch_size: usize,
    ) -> Self {
        Self {
            changefeed_id,
            db,
            message_center,
            batch_size,
            operators: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueues and starts `op`, unless its span already has an operator.
    /// Concurrent mutations of one span are rejected, not queued.
    pub fn add_operator(&self, mut op: Box<dyn Operator>) -> bool {
        let mut operators = self.operators.lock();
        if operators.contains_key(&op.id()) {
            tracing::warn!(
                changefeed = %self.changefeed_id,
                span = %op.id(),
                op_type = op.operator_type(),
                "operator already exists for span, ignore"
            );
            return false;
        }
        tracing::info!(
            changefeed = %self.changefeed_id,
            span = %op.id(),
            op_type = op.operator_type(),
            "push operator"
        );
        op.start();
        operators.insert(op.id(), op);
        true
    }

    pub fn new_add_operator(
        &self,
        span: Arc<SpanReplication>,
        dest: NodeId,
    ) -> Box<dyn Operator> {
        Box::new(AddOperator::new(self.db.clone(), span, dest))
    }

    /// Reads the span's current node; `None` when the span is not scheduled
    /// anywhere, in which case there is nothing to remove remotely.
    pub fn new_remove_operator(&self, span: Arc<SpanReplication>) -> Option<Box<dyn Operator>> {
        let node = span.node_id()?;
        Some(Box::new(RemoveOperator::new(self.db.clone(), span, node)))
    }

    pub fn new_move_operator(
        &self,
        span: Arc<SpanReplication>,
        origin: NodeId,
        dest: NodeId,
    ) -> Box<dyn Operator> {
        Box::new(MoveOperator::new(self.db.clone(), span, origin, dest))
    }

    pub fn new_split_operator(
        &self,
        span: Arc<SpanReplication>,
        new_spans: Vec<TableSpan>,
    ) -> Option<Box<dyn Operator>> {
        let node = span.node_id()?;
        Some(Box::new(SplitOperator::new(
            self.db.clone(),
            span,
            node,
            new_spans,
        )))
    }

    pub fn has_operator(&self, span_id: DispatcherId) -> bool {
        self.operators.lock().contains_key(&span_id)
    }

    pub fn operator_size(&self) -> usize {
        self.operators.lock().len()
    }

    /// Forwards a heartbeat observation to the span's operator, if any.
    pub fn update_operator_status(
        &self,
        span_id: DispatcherId,
        from: &NodeId,
        status: &TableSpanStatus,
    ) {
        let mut operators = self.operators.lock();
        if let Some(op) = operators.get_mut(&span_id) {
            op.check(from, status);
        }
    }

    /// One tick: retire finished operators (applying their post action to
    /// the db) and send or resend the RPCs of the rest, at most
    /// `batch_size` sends per tick.
    pub fn execute(&self) {
        let mut operators = self.operators.lock();

        let finished = operators
            .iter()
            .filter(|(_, op)| op.is_finished())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in finished {
            let mut op = operators.remove(&id).unwrap();
            tracing::info!(
                changefeed = %self.changefeed_id,
                span = %id,
                op_type = op.operator_type(),
                "operator finished"
            );
            op.post_finish();
        }

        let mut sent = 0;
        for op in operators.values_mut() {
            if sent >= self.batch_size {
                break;
            }
            let Some(msg) = op.schedule() else { continue };
            sent += 1;
            if let Err(e) = self.message_center.send_command(msg) {
                tracing::warn!(
                    changefeed = %self.changefeed_id,
                    span = %op.id(),
                    error = %e,
                    "send operator message failed, retry next tick"
                );
            }
        }
    }

    /// A node left the cluster: cancel or convert every operator touching
    /// it, and return its orphaned spans to absent right away so the basic
    /// scheduler can re-place them.
    pub fn on_node_removed(&self, node: &NodeId) {
        let mut operators = self.operators.lock();
        let affected = operators
            .iter()
            .filter(|(_, op)| op.affected_nodes().contains(node))
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for id in &affected {
            let op = operators.get_mut(id).unwrap();
            op.on_node_removed(node);
            if op.is_finished() {
                let mut op = operators.remove(id).unwrap();
                op.post_finish();
            }
        }

        for span in self.db.get_tasks_by_node_id(node) {
            if !operators.contains_key(&span.id) {
                self.db.mark_span_absent(&span);
            }
        }
        tracing::info!(
            changefeed = %self.changefeed_id,
            node = %node,
            operators = affected.len(),
            "node removed, converted operators"
        );
    }

    /// Drops every task from the db and enqueues node-side teardown for the
    /// ones that were scheduled.
    pub fn remove_all_tasks(&self) {
        let scheduled = self.db.try_remove_all();
        self.push_remove_operators(scheduled);
    }

    pub fn remove_tasks_by_schema_id(&self, schema_id: i64) {
        let scheduled = self.db.try_remove_by_schema_id(schema_id);
        self.push_remove_operators(scheduled);
    }

    pub fn remove_tasks_by_table_ids(&self, table_ids: &[i64]) {
        let scheduled = self.db.try_remove_by_table_ids(table_ids);
        self.push_remove_operators(scheduled);
    }

    fn push_remove_operators(&self, scheduled: Vec<Arc<SpanReplication>>) {
        let mut operators = self.operators.lock();
        for span in scheduled {
            let Some(node) = span.node_id() else { continue };
            // an in-flight operator lost its span; cancel it in place
            if let Some(mut old) = operators.remove(&span.id) {
                old.on_task_removed();
                old.post_finish();
            }
            let mut op: Box<dyn Operator> =
                Box::new(RemoveOperator::new(self.db.clone(), span, node));
            op.start();
            operators.insert(op.id(), op);
        }
    }
}
