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

//! Scheduling groups. Every span belongs to one group; a per-group checker
//! watches heartbeat pressure and proposes follow-up work (currently: split
//! a hot span). The replication db itself stays policy-free.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rivercdc_common::{ChangefeedId, DispatcherId};
use rivercdc_pb::{full_table_span, TableSpan};

use super::span::SpanReplication;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GroupId {
    /// Whole-table spans. The common case.
    Default,
    /// Sub-spans of one split table; balanced and checked per table.
    Table(i64),
}

impl GroupId {
    pub fn for_span(span: &TableSpan) -> Self {
        if *span == full_table_span(span.table_id) {
            GroupId::Default
        } else {
            GroupId::Table(span.table_id)
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Default => write!(f, "default"),
            GroupId::Table(table_id) => write!(f, "table-{table_id}"),
        }
    }
}

/// A scheduling decision proposed by a group checker.
#[derive(Clone, Debug)]
pub enum GroupCheckResult {
    /// The span runs hot and should be re-split across nodes.
    Split { span: Arc<SpanReplication> },
}

/// Per-group policy hook. Driven under the replication db's write lock:
/// single writer, no internal locking needed.
pub trait GroupChecker: Send + Sync {
    fn name(&self) -> &'static str;
    /// Observes one heartbeat-applied span.
    fn update_status(&mut self, span: &Arc<SpanReplication>);
    /// Called when a span leaves the db.
    fn remove_replica(&mut self, id: DispatcherId);
    /// Emits at most `batch` decisions.
    fn check(&mut self, batch: usize) -> Vec<GroupCheckResult>;
}

pub(super) type CheckerFactory = Box<dyn Fn(GroupId) -> Box<dyn GroupChecker> + Send + Sync>;

pub(super) fn checker_factory(
    changefeed_id: ChangefeedId,
    enable_table_across_nodes: bool,
) -> CheckerFactory {
    Box::new(move |group| -> Box<dyn GroupChecker> {
        if enable_table_across_nodes {
            Box::new(HotSpanChecker::new(changefeed_id.clone(), group))
        } else {
            Box::new(NoopChecker)
        }
    })
}

/// Policy for changefeeds that keep one dispatcher per table: nothing to do.
struct NoopChecker;

impl GroupChecker for NoopChecker {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn update_status(&mut self, _span: &Arc<SpanReplication>) {}

    fn remove_replica(&mut self, _id: DispatcherId) {}

    fn check(&mut self, _batch: usize) -> Vec<GroupCheckResult> {
        Vec::new()
    }
}

/// Write pressure above which a heartbeat counts as hot, bytes per second.
const HOT_SPAN_WRITE_THRESHOLD: f32 = 1024.0 * 1024.0;
/// Consecutive hot heartbeats before a split is proposed.
const HOT_SPAN_SCORE_THRESHOLD: u32 = 3;

/// Proposes re-splitting spans that stay hot across consecutive heartbeats.
struct HotSpanChecker {
    changefeed_id: ChangefeedId,
    group: GroupId,
    scores: HashMap<DispatcherId, (Arc<SpanReplication>, u32)>,
}

impl HotSpanChecker {
    fn new(changefeed_id: ChangefeedId, group: GroupId) -> Self {
        Self {
            changefeed_id,
            group,
            scores: HashMap::new(),
        }
    }
}

impl GroupChecker for HotSpanChecker {
    fn name(&self) -> &'static str {
        "hot-span"
    }

    fn update_status(&mut self, span: &Arc<SpanReplication>) {
        let status = span.status();
        if status.event_size_per_second < HOT_SPAN_WRITE_THRESHOLD {
            self.scores.remove(&span.id);
            return;
        }
        let entry = self.scores.entry(span.id).or_insert_with(|| (span.clone(), 0));
        entry.1 = entry.1.saturating_add(1);
    }

    fn remove_replica(&mut self, id: DispatcherId) {
        self.scores.remove(&id);
    }

    fn check(&mut self, batch: usize) -> Vec<GroupCheckResult> {
        let mut results = Vec::new();
        for (span, score) in self.scores.values() {
            if results.len() >= batch {
                break;
            }
            if *score < HOT_SPAN_SCORE_THRESHOLD || !span.is_working() {
                continue;
            }
            tracing::info!(
                changefeed = %self.changefeed_id,
                group = %self.group,
                span = %span.id,
                score,
                "hot span detected, propose split"
            );
            results.push(GroupCheckResult::Split { span: span.clone() });
        }
        // proposed spans restart scoring so one hot streak yields one split
        for result in &results {
            let GroupCheckResult::Split { span } = result;
            self.scores.remove(&span.id);
        }
        results
    }
}
