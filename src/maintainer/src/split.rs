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

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rivercdc_pb::TableSpan;

use crate::replica::SpanReplication;

/// Turns one table span into sub-spans along region boundaries. Backed by a
/// remote region metadata service, so calls may suspend; the implementation
/// bounds them with its own timeout.
#[async_trait]
pub trait SpanSplitter: Send + Sync {
    /// Splits `span` for roughly `capture_count` captures. Returning the
    /// input span unchanged (or fewer than two spans) means "don't split".
    async fn split(&self, span: &TableSpan, capture_count: usize) -> Vec<TableSpan>;
}

/// Finds the key ranges of `full` that `covered` misses. `covered` is
/// ordered by span start key, which in-order traversal depends on; the
/// bootstrap working map provides exactly that.
pub fn find_holes(
    covered: &BTreeMap<TableSpan, Arc<SpanReplication>>,
    full: &TableSpan,
) -> Vec<TableSpan> {
    let mut holes = Vec::new();
    let mut reached = full.start_key.clone();
    for span in covered.keys() {
        if span.start_key > reached {
            holes.push(TableSpan {
                table_id: full.table_id,
                start_key: reached.clone(),
                end_key: span.start_key.clone(),
            });
        }
        if span.end_key > reached {
            reached = span.end_key.clone();
        }
    }
    if reached < full.end_key {
        holes.push(TableSpan {
            table_id: full.table_id,
            start_key: reached,
            end_key: full.end_key.clone(),
        });
    }
    holes
}

#[cfg(test)]
mod tests {
    use rivercdc_common::{ChangefeedId, DispatcherId};
    use rivercdc_pb::{full_table_span, table_span_end_key, table_span_start_key};

    use crate::test_utils::mock_tso_client;

    use super::*;

    fn sub_span(table_id: i64, start: &[u8], end: &[u8]) -> TableSpan {
        TableSpan {
            table_id,
            start_key: start.to_vec(),
            end_key: end.to_vec(),
        }
    }

    fn covered_map(spans: &[TableSpan]) -> BTreeMap<TableSpan, Arc<SpanReplication>> {
        spans
            .iter()
            .map(|span| {
                let replication = SpanReplication::new(
                    ChangefeedId::in_default_namespace("test"),
                    DispatcherId::new(),
                    mock_tso_client(),
                    1,
                    span.clone(),
                    100,
                );
                (span.clone(), replication)
            })
            .collect()
    }

    #[test]
    fn test_no_coverage_is_one_hole() {
        let full = full_table_span(42);
        let holes = find_holes(&covered_map(&[]), &full);
        assert_eq!(holes, vec![full]);
    }

    #[test]
    fn test_full_coverage_has_no_holes() {
        let full = full_table_span(42);
        let covered = covered_map(&[full.clone()]);
        assert!(find_holes(&covered, &full).is_empty());
    }

    #[test]
    fn test_holes_at_head_middle_and_tail() {
        let full = full_table_span(42);
        let a = [table_span_start_key(42), b"a".to_vec()].concat();
        let b = [table_span_start_key(42), b"b".to_vec()].concat();
        let c = [table_span_start_key(42), b"c".to_vec()].concat();
        let d = [table_span_start_key(42), b"d".to_vec()].concat();
        let covered = covered_map(&[sub_span(42, &a, &b), sub_span(42, &c, &d)]);

        let holes = find_holes(&covered, &full);
        assert_eq!(
            holes,
            vec![
                sub_span(42, &table_span_start_key(42), &a),
                sub_span(42, &b, &c),
                sub_span(42, &d, &table_span_end_key(42)),
            ]
        );
    }

    #[test]
    fn test_overlapping_coverage_yields_no_false_holes() {
        let full = full_table_span(42);
        let mid = [table_span_start_key(42), b"m".to_vec()].concat();
        let early = [table_span_start_key(42), b"c".to_vec()].concat();
        let covered = covered_map(&[
            sub_span(42, &table_span_start_key(42), &mid),
            sub_span(42, &early, &table_span_end_key(42)),
        ]);
        assert!(find_holes(&covered, &full).is_empty());
    }
}
