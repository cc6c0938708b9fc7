//! Fixed-capacity execution history ring.

use std::collections::VecDeque;

use toolgate_api_types::HistoryRecord;

/// Ring capacity; the oldest record is evicted first.
pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug)]
pub(crate) struct HistoryRing {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl HistoryRing {
    pub(crate) fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, record: HistoryRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Most recent `limit` records, newest-last.
    pub(crate) fn tail(&self, limit: usize) -> Vec<HistoryRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use toolgate_api_types::ToolId;

    fn record(n: usize) -> HistoryRecord {
        HistoryRecord {
            tool: ToolId::ClaudeCode,
            command: format!("run {n}"),
            success: true,
            return_code: 0,
            execution_time_ms: 1.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn ring_never_exceeds_capacity() {
        let mut ring = HistoryRing::new();
        for n in 0..150 {
            ring.push(record(n));
        }

        assert_eq!(ring.len(), HISTORY_CAPACITY);
        let all = ring.tail(1000);
        assert_eq!(all.len(), HISTORY_CAPACITY);
        // The 100 most recent survive, oldest evicted first.
        assert_eq!(all.first().unwrap().command, "run 50");
        assert_eq!(all.last().unwrap().command, "run 149");
    }

    #[test]
    fn tail_is_newest_last() {
        let mut ring = HistoryRing::new();
        for n in 0..5 {
            ring.push(record(n));
        }

        let tail = ring.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].command, "run 3");
        assert_eq!(tail[1].command, "run 4");
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut ring = HistoryRing::with_capacity(4);
        ring.push(record(0));
        ring.clear();
        assert_eq!(ring.len(), 0);
        assert!(ring.tail(10).is_empty());
    }
}
