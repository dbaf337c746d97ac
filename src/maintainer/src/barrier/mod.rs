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

//! Coordination of blocking events. Every dispatcher affected by a DDL or
//! sync point pauses at its commit ts and reports; once the whole affected
//! key range is covered one writer applies the event, then everyone else is
//! released with a pass action.

mod event;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{BlockState, HeartBeatRequest, MaintainerBootstrapResponse};

use crate::controller::Controller;
use crate::messaging::TargetMessage;

pub use event::BarrierEvent;

/// One in-flight blocking event is keyed by its commit ts; a sync point and
/// a ddl may land on the same ts, so the flag disambiguates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct EventKey {
    commit_ts: u64,
    is_sync_point: bool,
}

impl EventKey {
    fn of(state: &BlockState) -> Self {
        Self {
            commit_ts: state.block_ts,
            is_sync_point: state.is_sync_point,
        }
    }
}

/// The barrier engine of one changefeed.
pub struct Barrier {
    changefeed_id: ChangefeedId,
    controller: Arc<Controller>,
    dynamic_split_enabled: bool,
    blocked_events: Mutex<HashMap<EventKey, BarrierEvent>>,
}

impl Barrier {
    pub fn new(controller: Arc<Controller>, dynamic_split_enabled: bool) -> Self {
        Self {
            changefeed_id: controller.changefeed_id().clone(),
            controller,
            dynamic_split_enabled,
            blocked_events: Mutex::new(HashMap::new()),
        }
    }

    /// Digests the block-related part of one heartbeat and returns the
    /// actions it triggers. Statuses are processed in arrival order; the
    /// order decides writer election for `Normal` events.
    pub fn handle_status(&self, from: &NodeId, request: &HeartBeatRequest) -> Vec<TargetMessage> {
        let mut msgs = Vec::new();
        // blocked reporters per event, in arrival order
        let mut reported: Vec<(EventKey, Vec<DispatcherId>)> = Vec::new();
        let mut events = self.blocked_events.lock();

        for status in &request.statuses {
            let Some(id) = status.id.as_ref().map(DispatcherId::from_pb) else {
                continue;
            };

            // any status can prove the writer's progress past the commit ts
            for event in events.values_mut() {
                if event.selected()
                    && !event.writer_advanced()
                    && event.is_writer(id)
                    && status.checkpoint_ts > event.commit_ts()
                {
                    event.set_writer_advanced();
                    msgs.extend(event.pass_action_messages());
                }
            }

            if let Some(state) = &status.state {
                let key = EventKey::of(state);
                if state.is_blocked {
                    if state.block_tables.is_none() {
                        tracing::warn!(
                            changefeed = %self.changefeed_id,
                            from = %from,
                            dispatcher = %id,
                            block_ts = state.block_ts,
                            "blocked state without block tables, ignore"
                        );
                        continue;
                    }
                    let event = events.entry(key).or_insert_with(|| {
                        BarrierEvent::new(
                            self.changefeed_id.clone(),
                            self.controller.clone(),
                            state,
                            self.dynamic_split_enabled,
                        )
                    });
                    if event.selected() {
                        // a late or resent block report; the writer asking
                        // again means the write action got lost
                        if event.is_writer(id) && !event.writer_advanced() {
                            msgs.extend(event.resend());
                        }
                        continue;
                    }
                    if id == self.controller.ddl_dispatcher_id() {
                        event.set_table_trigger_related();
                    }
                    event.mark_dispatcher_event_done(id);
                    match reported.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, ids)) => ids.push(id),
                        None => reported.push((key, vec![id])),
                    }
                } else if let Some(event) = events.get_mut(&key) {
                    // a non-blocked report at the event's ts acknowledges
                    // the write or pass
                    event.mark_dispatcher_event_done(id);
                }
            }
        }

        // writer election for events whose coverage completed in this batch
        for (key, dispatchers) in reported {
            let Some(event) = events.get_mut(&key) else { continue };
            if !event.selected() && event.all_dispatcher_reported() {
                msgs.extend(event.select_writer(&dispatchers));
                event.schedule_block_event();
            }
        }

        // a selected event whose checker filled up again got every
        // acknowledgement: retire it
        events.retain(|key, event| {
            let done = event.selected() && event.all_dispatcher_reported();
            if done {
                tracing::info!(
                    changefeed = %self.changefeed_id,
                    commit_ts = key.commit_ts,
                    sync_point = key.is_sync_point,
                    "block event resolved"
                );
            }
            !done
        });
        msgs
    }

    /// Rebuilds in-flight events from the block states the nodes reported at
    /// bootstrap, so a maintainer restart resumes a half-coordinated ddl
    /// instead of deadlocking it. Actions are not emitted here; the resend
    /// tick delivers them.
    pub fn handle_bootstrap_response(
        &self,
        responses: &HashMap<NodeId, MaintainerBootstrapResponse>,
    ) {
        let mut events = self.blocked_events.lock();
        let mut reported: Vec<(EventKey, Vec<DispatcherId>)> = Vec::new();
        for response in responses.values() {
            for span in &response.spans {
                let Some(id) = span.id.as_ref().map(DispatcherId::from_pb) else {
                    continue;
                };
                let Some(state) = &span.block_state else { continue };
                if !state.is_blocked || state.block_tables.is_none() {
                    continue;
                }
                let key = EventKey::of(state);
                let event = events.entry(key).or_insert_with(|| {
                    BarrierEvent::new(
                        self.changefeed_id.clone(),
                        self.controller.clone(),
                        state,
                        self.dynamic_split_enabled,
                    )
                });
                if id == self.controller.ddl_dispatcher_id() {
                    event.set_table_trigger_related();
                }
                event.mark_dispatcher_event_done(id);
                match reported.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, ids)) => ids.push(id),
                    None => reported.push((key, vec![id])),
                }
            }
        }
        for (key, dispatchers) in reported {
            let Some(event) = events.get_mut(&key) else { continue };
            if !event.selected() && event.all_dispatcher_reported() {
                event.select_writer(&dispatchers);
                event.schedule_block_event();
            }
        }
        if !events.is_empty() {
            tracing::info!(
                changefeed = %self.changefeed_id,
                events = events.len(),
                "resumed block events from bootstrap"
            );
        }
    }

    /// One resend tick over every pending event.
    pub fn resend(&self) -> Vec<TargetMessage> {
        let mut events = self.blocked_events.lock();
        events.values_mut().flat_map(|event| event.resend()).collect()
    }

    pub fn event_size(&self) -> usize {
        self.blocked_events.lock().len()
    }

    /// Drops every pending event; used when the changefeed stops.
    pub fn clear(&self) {
        self.blocked_events.lock().clear();
    }
}
