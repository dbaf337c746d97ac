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

//! Vendored wire types of the maintainer <-> dispatcher heartbeat protocol.
//!
//! `heartbeat.rs` is prost output checked in as-is; hand-written helpers that
//! the protocol definition cannot express (span ordering, the DDL sentinel
//! span) live here.

use std::cmp::Ordering;

mod heartbeat;

pub use heartbeat::*;

/// Sentinel table id carried by the table trigger event dispatcher. Real
/// table ids start at 1, so 0 never collides.
pub const DDL_SPAN_TABLE_ID: i64 = 0;

/// Table data keys are `'t' || big-endian(table_id)`; a whole-table span is
/// `[prefix(id), prefix(id + 1))`.
pub fn table_span_start_key(table_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(b't');
    key.extend_from_slice(&table_id.to_be_bytes());
    key
}

pub fn table_span_end_key(table_id: i64) -> Vec<u8> {
    table_span_start_key(table_id + 1)
}

/// The whole-table span of a physical table.
pub fn full_table_span(table_id: i64) -> TableSpan {
    TableSpan {
        table_id,
        start_key: table_span_start_key(table_id),
        end_key: table_span_end_key(table_id),
    }
}

/// The distinguished span owned by the table trigger event dispatcher.
pub fn ddl_span() -> TableSpan {
    full_table_span(DDL_SPAN_TABLE_ID)
}

impl Eq for TableSpan {}

// Lexicographic on (table_id, start_key, end_key); the bootstrap working map
// and the hole finder rely on in-order traversal per table.
impl Ord for TableSpan {
    fn cmp(&self, other: &Self) -> Ordering {
        self.table_id
            .cmp(&other.table_id)
            .then_with(|| self.start_key.cmp(&other.start_key))
            .then_with(|| self.end_key.cmp(&other.end_key))
    }
}

impl PartialOrd for TableSpan {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for TableSpan {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.table_id.hash(state);
        self.start_key.hash(state);
        self.end_key.hash(state);
    }
}

impl Eq for DispatcherId {}

impl std::hash::Hash for DispatcherId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.high.hash(state);
        self.low.hash(state);
    }
}
