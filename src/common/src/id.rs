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

use std::fmt;

use uuid::Uuid;

/// Process-unique opaque id of one dispatcher. On the wire it travels as a
/// `{high, low}` pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatcherId(Uuid);

impl DispatcherId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn to_pb(&self) -> rivercdc_pb::DispatcherId {
        let raw = self.0.as_u128();
        rivercdc_pb::DispatcherId {
            high: (raw >> 64) as u64,
            low: raw as u64,
        }
    }

    pub fn from_pb(pb: &rivercdc_pb::DispatcherId) -> Self {
        Self(Uuid::from_u128(((pb.high as u128) << 64) | pb.low as u128))
    }
}

impl Default for DispatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for DispatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Name of one replication job, unique within a namespace.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChangefeedId {
    pub namespace: String,
    pub name: String,
}

pub const DEFAULT_NAMESPACE: &str = "default";

impl ChangefeedId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn in_default_namespace(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }

    pub fn to_pb(&self) -> rivercdc_pb::ChangefeedId {
        rivercdc_pb::ChangefeedId {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub fn from_pb(pb: &rivercdc_pb::ChangefeedId) -> Self {
        Self::new(pb.namespace.clone(), pb.name.clone())
    }
}

impl fmt::Display for ChangefeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_id_pb_round_trip() {
        let id = DispatcherId::new();
        assert_eq!(DispatcherId::from_pb(&id.to_pb()), id);
    }

    #[test]
    fn test_changefeed_id_display() {
        let id = ChangefeedId::in_default_namespace("cf-1");
        assert_eq!(id.to_string(), "default/cf-1");
    }
}
