// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use super::results::{
    AiqResult, AiqStatistics, DvsResult, DvsStatistics, LtmResult, LtmStatistics,
};

pub const AIQ_RESULT_CAPACITY: usize = 20;
pub const LTM_RESULT_CAPACITY: usize = 10;
pub const DVS_RESULT_CAPACITY: usize = 2;
pub const AIQ_STATISTICS_CAPACITY: usize = 3;
pub const DVS_STATISTICS_CAPACITY: usize = 2;
pub const LTM_STATISTICS_CAPACITY: usize = 2;

/// Bounded history, newest at the back.
#[derive(Debug)]
struct Ring<T> {
    items: VecDeque<Arc<T>>,
    capacity: usize,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Ring {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, item: T) -> Arc<T> {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        let item = Arc::new(item);
        self.items.push_back(item.clone());
        item
    }

    fn latest(&self) -> Option<Arc<T>> {
        self.items.back().cloned()
    }

    fn find<F: Fn(&T) -> bool>(&self, pred: F) -> Option<Arc<T>> {
        self.items.iter().rev().find(|item| pred(item)).cloned()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug)]
struct Rings {
    aiq: Ring<AiqResult>,
    ltm: Ring<LtmResult>,
    dvs: Ring<DvsResult>,
    stats: Ring<AiqStatistics>,
    dvs_stats: Ring<DvsStatistics>,
    ltm_stats: Ring<LtmStatistics>,
}

/// Per-camera store shared by the 3A producer, the statistics decoder and
/// the ISP parameter adaptor.
///
/// Published values are handed out as `Arc`s, so a reader keeps a consistent
/// result even after the ring moves past it.
#[derive(Debug)]
pub struct ResultStore {
    rings: RwLock<Rings>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore {
            rings: RwLock::new(Rings {
                aiq: Ring::new(AIQ_RESULT_CAPACITY),
                ltm: Ring::new(LTM_RESULT_CAPACITY),
                dvs: Ring::new(DVS_RESULT_CAPACITY),
                stats: Ring::new(AIQ_STATISTICS_CAPACITY),
                dvs_stats: Ring::new(DVS_STATISTICS_CAPACITY),
                ltm_stats: Ring::new(LTM_STATISTICS_CAPACITY),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Rings> {
        self.rings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Rings> {
        self.rings.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn update_aiq_result(&self, result: AiqResult) -> Arc<AiqResult> {
        log::trace!("store aiq result for sequence {}", result.sequence);
        self.write().aiq.push(result)
    }

    /// Result for exactly `sequence`.
    pub fn aiq_result(&self, sequence: i64) -> Option<Arc<AiqResult>> {
        self.read().aiq.find(|r| r.sequence == sequence)
    }

    pub fn latest_aiq_result(&self) -> Option<Arc<AiqResult>> {
        self.read().aiq.latest()
    }

    pub fn update_ltm_result(&self, result: LtmResult) -> Arc<LtmResult> {
        self.write().ltm.push(result)
    }

    pub fn ltm_result(&self, sequence: i64) -> Option<Arc<LtmResult>> {
        self.read().ltm.find(|r| r.sequence == sequence)
    }

    pub fn latest_ltm_result(&self) -> Option<Arc<LtmResult>> {
        self.read().ltm.latest()
    }

    pub fn update_dvs_result(&self, result: DvsResult) -> Arc<DvsResult> {
        self.write().dvs.push(result)
    }

    pub fn dvs_result(&self) -> Option<Arc<DvsResult>> {
        self.read().dvs.latest()
    }

    pub fn update_aiq_statistics(&self, stats: AiqStatistics) -> Arc<AiqStatistics> {
        log::trace!("store aiq statistics for sequence {}", stats.sequence);
        self.write().stats.push(stats)
    }

    pub fn aiq_statistics(&self) -> Option<Arc<AiqStatistics>> {
        self.read().stats.latest()
    }

    pub fn update_dvs_statistics(&self, stats: DvsStatistics) -> Arc<DvsStatistics> {
        self.write().dvs_stats.push(stats)
    }

    pub fn dvs_statistics(&self) -> Option<Arc<DvsStatistics>> {
        self.read().dvs_stats.latest()
    }

    pub fn update_ltm_statistics(&self, stats: LtmStatistics) -> Arc<LtmStatistics> {
        self.write().ltm_stats.push(stats)
    }

    pub fn ltm_statistics(&self) -> Option<Arc<LtmStatistics>> {
        self.read().ltm_stats.latest()
    }

    pub fn clear(&self) {
        let mut rings = self.write();
        rings.aiq.clear();
        rings.ltm.clear();
        rings.dvs.clear();
        rings.stats.clear();
        rings.dvs_stats.clear();
        rings.ltm_stats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_latest() {
        let store = ResultStore::new();
        assert!(store.latest_aiq_result().is_none());

        store.update_aiq_result(AiqResult::new(5));
        store.update_aiq_result(AiqResult::new(6));

        assert_eq!(store.aiq_result(5).unwrap().sequence, 5);
        assert!(store.aiq_result(7).is_none());
        assert_eq!(store.latest_aiq_result().unwrap().sequence, 6);
    }

    #[test]
    fn test_aiq_ring_is_bounded() {
        let store = ResultStore::new();
        for seq in 0..(AIQ_RESULT_CAPACITY as i64 + 5) {
            store.update_aiq_result(AiqResult::new(seq));
        }
        assert!(store.aiq_result(4).is_none());
        assert!(store.aiq_result(5).is_some());
    }

    #[test]
    fn test_reader_keeps_evicted_result() {
        let store = ResultStore::new();
        store.update_dvs_result(DvsResult {
            sequence: 1,
            ..Default::default()
        });
        let held = store.dvs_result().unwrap();
        for seq in 2..10 {
            store.update_dvs_result(DvsResult {
                sequence: seq,
                ..Default::default()
            });
        }
        assert_eq!(held.sequence, 1);
        assert_eq!(store.dvs_result().unwrap().sequence, 9);
    }

    #[test]
    fn test_ltm_lookup() {
        let store = ResultStore::new();
        store.update_ltm_result(LtmResult {
            sequence: 10,
            ..Default::default()
        });
        assert!(store.ltm_result(10).is_some());
        assert!(store.ltm_result(11).is_none());
        store.clear();
        assert!(store.latest_ltm_result().is_none());
    }
}
