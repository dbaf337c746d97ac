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

//! Interface to the process-wide message center. The maintainer only ever
//! produces [`TargetMessage`]s; transport, retry-on-connect and peer
//! discovery are the message center's business.

use rivercdc_common::{ChangefeedId, DispatcherId, NodeId};
use rivercdc_pb::{
    HeartBeatResponse, MaintainerPostBootstrapRequest, RemoveDispatcherRequest,
    ScheduleDispatcherRequest,
};

use crate::error::MaintainerResult;

/// Logical destination queue on the receiving node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Topic {
    /// Consumed by the node's heartbeat collector (barrier actions).
    HeartbeatCollector,
    /// Consumed by the node's dispatcher manager (create / remove dispatchers).
    DispatcherManager,
}

#[derive(Clone, PartialEq, Debug)]
pub enum MaintainerMessage {
    HeartBeatResponse(HeartBeatResponse),
    ScheduleDispatcherRequest(ScheduleDispatcherRequest),
    RemoveDispatcherRequest(RemoveDispatcherRequest),
    MaintainerPostBootstrapRequest(MaintainerPostBootstrapRequest),
}

/// One outbound RPC addressed to a single node.
#[derive(Clone, PartialEq, Debug)]
pub struct TargetMessage {
    pub target: NodeId,
    pub topic: Topic,
    pub message: MaintainerMessage,
}

impl TargetMessage {
    pub fn new(target: NodeId, topic: Topic, message: MaintainerMessage) -> Self {
        Self {
            target,
            topic,
            message,
        }
    }
}

/// Process-wide RPC transport between the maintainer and nodes. Assumed
/// concurrency-safe; sends are fire-and-forget, delivery is at-most-once and
/// every consumer of this trait resends on its own cadence.
pub trait MessageCenter: Send + Sync {
    fn send_command(&self, msg: TargetMessage) -> MaintainerResult<()>;
}

/// Cleanup request for a dispatcher the replication db does not know about.
pub fn new_remove_dispatcher_message(
    target: NodeId,
    changefeed_id: &ChangefeedId,
    dispatcher_id: DispatcherId,
) -> TargetMessage {
    TargetMessage::new(
        target,
        Topic::DispatcherManager,
        MaintainerMessage::RemoveDispatcherRequest(RemoveDispatcherRequest {
            changefeed_id: Some(changefeed_id.to_pb()),
            dispatcher_id: Some(dispatcher_id.to_pb()),
        }),
    )
}
