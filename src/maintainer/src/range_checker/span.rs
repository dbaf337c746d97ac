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

use std::collections::{BTreeMap, HashMap};

use rivercdc_pb::full_table_span;

use super::RangeChecker;

/// Per-table coverage of one expected table.
struct TableCoverage {
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    /// Reported sub-ranges, keyed by start key; the value keeps the widest
    /// end key seen for that start.
    reported: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TableCoverage {
    fn new(table_id: i64) -> Self {
        let span = full_table_span(table_id);
        Self {
            start_key: span.start_key,
            end_key: span.end_key,
            reported: BTreeMap::new(),
        }
    }

    fn add(&mut self, start_key: &[u8], end_key: &[u8]) {
        let entry = self
            .reported
            .entry(start_key.to_vec())
            .or_insert_with(|| end_key.to_vec());
        if end_key > entry.as_slice() {
            *entry = end_key.to_vec();
        }
    }

    /// Covered iff the reported sub-ranges, merged in key order, collapse to
    /// the single interval `[start_key, end_key)`.
    fn is_covered(&self) -> bool {
        let mut reached: &[u8] = &self.start_key;
        for (start, end) in &self.reported {
            if start.as_slice() > reached {
                return false;
            }
            if end.as_slice() > reached {
                reached = end;
            }
        }
        reached >= self.end_key.as_slice()
    }
}

/// Coverage by key range. Every expected table keeps an interval set over
/// its whole-table range; the checker passes once every set collapses to a
/// single full interval. Used when tables may be split across nodes.
pub struct TableSpanRangeChecker {
    tables: HashMap<i64, TableCoverage>,
}

impl TableSpanRangeChecker {
    pub fn new(table_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            tables: table_ids
                .into_iter()
                .map(|id| (id, TableCoverage::new(id)))
                .collect(),
        }
    }
}

impl RangeChecker for TableSpanRangeChecker {
    fn add_sub_range(&mut self, table_id: i64, start_key: &[u8], end_key: &[u8]) {
        match self.tables.get_mut(&table_id) {
            Some(coverage) => coverage.add(start_key, end_key),
            None => {
                tracing::warn!(table_id, "sub range reported for unexpected table, ignore");
            }
        }
    }

    fn is_fully_covered(&self) -> bool {
        self.tables.values().all(TableCoverage::is_covered)
    }

    fn reset(&mut self) {
        for coverage in self.tables.values_mut() {
            coverage.reported.clear();
        }
    }

    fn detail(&self) -> String {
        let covered = self.tables.values().filter(|c| c.is_covered()).count();
        let waiting = self
            .tables
            .iter()
            .filter(|(_, c)| !c.is_covered())
            .map(|(id, _)| *id)
            .take(8)
            .collect::<Vec<_>>();
        format!(
            "covered {}/{} tables, waiting {:?}",
            covered,
            self.tables.len(),
            waiting
        )
    }
}
