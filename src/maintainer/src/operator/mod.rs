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

//! In-flight span mutations. An operator owns the whole life of one change
//! (add, remove, move, split) on exactly one span: it composes the RPCs,
//! watches heartbeats for completion, and applies the final lifecycle
//! transition to the replication db.

mod add;
mod controller;
mod move_span;
mod remove;
mod split;

use std::sync::Arc;
use std::time::Duration;

pub use add::AddOperator;
pub use controller::OperatorController;
pub use move_span::MoveOperator;
pub use remove::RemoveOperator;
pub use split::SplitOperator;

use rivercdc_common::{DispatcherId, NodeId};
use rivercdc_pb::{DispatcherConfig, ScheduleAction, ScheduleDispatcherRequest, TableSpanStatus};

use crate::messaging::{MaintainerMessage, TargetMessage, Topic};
use crate::replica::SpanReplication;

/// How long an unanswered schedule RPC waits before it is sent again.
pub const OPERATOR_RESEND_INTERVAL: Duration = Duration::from_millis(500);

/// One in-progress mutation of one span. Driven by the operator controller
/// under its lock; implementations need no locking of their own.
pub trait Operator: Send {
    /// The span this operator mutates; also the dedup key.
    fn id(&self) -> DispatcherId;

    fn operator_type(&self) -> &'static str;

    /// Applies the initial db transition. Called exactly once, on enqueue.
    fn start(&mut self);

    /// Composes the next RPC to send, or `None` when there is nothing to do
    /// right now (already answered, or resend interval not elapsed).
    fn schedule(&mut self) -> Option<TargetMessage>;

    /// Observes one heartbeat status for this span.
    fn check(&mut self, from: &NodeId, status: &TableSpanStatus);

    fn is_finished(&self) -> bool;

    /// The node disappeared from the cluster.
    fn on_node_removed(&mut self, node: &NodeId);

    /// The span was removed from the db underneath this operator; cancel
    /// without applying any further transition.
    fn on_task_removed(&mut self);

    /// Applies the final db transition. Called exactly once, after
    /// [`Operator::is_finished`] turns true.
    fn post_finish(&mut self);

    /// Nodes whose removal this operator cares about.
    fn affected_nodes(&self) -> Vec<NodeId>;
}

/// Pacing of schedule/resend decisions, shared by all operator kinds.
struct ResendTimer {
    last_sent: Option<tokio::time::Instant>,
}

impl ResendTimer {
    fn new() -> Self {
        Self { last_sent: None }
    }

    /// True once per [`OPERATOR_RESEND_INTERVAL`].
    fn should_send(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        match self.last_sent {
            Some(last) if now.duration_since(last) < OPERATOR_RESEND_INTERVAL => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

fn schedule_message(
    span: &Arc<SpanReplication>,
    target: NodeId,
    action: ScheduleAction,
) -> TargetMessage {
    TargetMessage::new(
        target,
        Topic::DispatcherManager,
        MaintainerMessage::ScheduleDispatcherRequest(ScheduleDispatcherRequest {
            changefeed_id: Some(span.changefeed_id.to_pb()),
            config: Some(DispatcherConfig {
                span: Some(span.span.clone()),
                dispatcher_id: Some(span.id.to_pb()),
                schema_id: span.schema_id(),
                start_ts: span.checkpoint_ts(),
            }),
            schedule_action: action as i32,
        }),
    )
}
