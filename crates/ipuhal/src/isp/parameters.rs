// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use super::vendor::ProcessGroupCodec;
use crate::Error;

/// Number of parameter slots kept for in-flight sequences.
pub const ISP_PARAM_QUEUE_SIZE: usize = 10;

/// Number of sequences remembered for lag lookups.
pub const MAX_BUFFER_COUNT: usize = 10;

/// Terminal payloads are padded to this boundary for the driver.
pub const PAGE_SIZE: usize = 4096;

pub fn page_align(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Sequences that took a new parameter slot, oldest first.
#[derive(Debug, Clone)]
pub struct SequenceHistory {
    sequences: VecDeque<i64>,
    capacity: usize,
}

impl Default for SequenceHistory {
    fn default() -> Self {
        Self::new(MAX_BUFFER_COUNT)
    }
}

impl SequenceHistory {
    pub fn new(capacity: usize) -> Self {
        SequenceHistory {
            sequences: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sequence: i64) {
        if self.sequences.len() >= self.capacity {
            self.sequences.pop_front();
        }
        self.sequences.push_back(sequence);
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn clear(&mut self) {
        self.sequences.clear();
    }

    pub fn to_vec(&self) -> Vec<i64> {
        self.sequences.iter().copied().collect()
    }

    /// Sequence recorded `lag` entries before `sequence`.
    ///
    /// Skipped frames are not in the history, so this is the sequence that
    /// was actually processed `lag` frames earlier. Falls back to `sequence`
    /// when the history is too short or does not hold it.
    pub fn lagged(&self, sequence: i64, lag: usize) -> i64 {
        if self.sequences.len() <= lag {
            return sequence;
        }
        self.sequences
            .iter()
            .position(|s| *s == sequence)
            .filter(|index| *index >= lag)
            .map(|index| self.sequences[index - lag])
            .unwrap_or(sequence)
    }
}

/// Parameter blobs of one sequence, one per pipeline stream id.
#[derive(Debug, Clone)]
pub struct IspParameter {
    pub sequence: i64,
    blobs: BTreeMap<i32, Arc<[u8]>>,
}

impl IspParameter {
    fn empty() -> Self {
        IspParameter {
            sequence: -1,
            blobs: BTreeMap::new(),
        }
    }

    pub fn blob(&self, stream_id: i32) -> Option<&Arc<[u8]>> {
        self.blobs.get(&stream_id)
    }

    pub fn stream_ids(&self) -> Vec<i32> {
        self.blobs.keys().copied().collect()
    }
}

/// Slot handed out for a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAcquisition {
    pub index: usize,
    /// The slot was taken from an older sequence; derived tables such as
    /// lens shading must be rebuilt rather than reused.
    pub refresh: bool,
}

/// Fixed pool of parameter slots used round robin.
///
/// A sequence already holding a slot is updated in place. Any other sequence
/// evicts the slot after the cursor.
#[derive(Debug, Clone)]
pub struct ParameterPool {
    slots: Vec<IspParameter>,
    cursor: usize,
}

impl Default for ParameterPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterPool {
    pub fn new() -> Self {
        ParameterPool {
            slots: (0..ISP_PARAM_QUEUE_SIZE).map(|_| IspParameter::empty()).collect(),
            cursor: 0,
        }
    }

    /// Give every slot a zeroed blob of `sizes[stream_id]` bytes.
    pub fn allocate(&mut self, sizes: &BTreeMap<i32, usize>) {
        for slot in &mut self.slots {
            slot.sequence = -1;
            slot.blobs = sizes
                .iter()
                .map(|(id, size)| (*id, Arc::<[u8]>::from(vec![0u8; *size])))
                .collect();
        }
        self.cursor = 0;
    }

    pub fn release(&mut self) {
        for slot in &mut self.slots {
            *slot = IspParameter::empty();
        }
        self.cursor = 0;
    }

    /// Point the cursor back at slot 0 and mark it unused.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.slots[0].sequence = -1;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn find(&self, sequence: i64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.sequence == sequence)
    }

    pub fn acquire(&mut self, sequence: i64) -> SlotAcquisition {
        let acquisition = match self.find(sequence) {
            Some(index) => SlotAcquisition {
                index,
                refresh: false,
            },
            None => {
                self.cursor = (self.cursor + 1) % self.slots.len();
                SlotAcquisition {
                    index: self.cursor,
                    refresh: true,
                }
            }
        };
        self.slots[acquisition.index].sequence = sequence;
        acquisition
    }

    pub fn slot(&self, index: usize) -> &IspParameter {
        &self.slots[index]
    }

    pub fn store(&mut self, index: usize, stream_id: i32, blob: Arc<[u8]>) {
        self.slots[index].blobs.insert(stream_id, blob);
    }

    /// Blob for an exact sequence and stream id.
    pub fn lookup(&self, sequence: i64, stream_id: i32) -> Option<Arc<[u8]>> {
        self.slots
            .iter()
            .find(|slot| slot.sequence == sequence && slot.blobs.contains_key(&stream_id))
            .and_then(|slot| slot.blobs.get(&stream_id).cloned())
    }

    pub fn sequences(&self) -> Vec<i64> {
        self.slots.iter().map(|slot| slot.sequence).collect()
    }
}

/// Location of one terminal payload inside the payload plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalPayloadDescriptor {
    pub size: usize,
    pub padded_size: usize,
    pub offset: usize,
    pub is_input: bool,
}

/// Memory needs of the input system process group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalLayout {
    pub process_group_size: usize,
    pub terminals: Vec<TerminalPayloadDescriptor>,
    pub input_payload_size: usize,
    pub output_payload_size: usize,
}

impl TerminalLayout {
    /// Query the codec for descriptor and payload sizes. Input and output
    /// terminals are packed separately, each from offset zero.
    pub fn query(codec: &dyn ProcessGroupCodec) -> Result<Self, Error> {
        let process_group_size = codec.process_group_size();
        let terminal_count = codec.terminal_count();
        log::debug!(
            "process group size {}, terminal count {}",
            process_group_size,
            terminal_count
        );
        if terminal_count == 0 {
            return Err(Error::NoInit(
                "program group does not have any registered terminals".to_string(),
            ));
        }

        let mut layout = TerminalLayout {
            process_group_size,
            ..Default::default()
        };
        for terminal in 0..terminal_count {
            let size = codec.terminal_payload_size(terminal);
            let padded_size = page_align(size);
            let is_input = codec.is_input_terminal(terminal);
            let offset = if is_input {
                let offset = layout.input_payload_size;
                layout.input_payload_size += padded_size;
                offset
            } else {
                let offset = layout.output_payload_size;
                layout.output_payload_size += padded_size;
                offset
            };
            log::debug!(
                "terminal [{}] size {} padded {} offset {:#x} input {}",
                terminal,
                size,
                padded_size,
                offset,
                is_input
            );
            layout.terminals.push(TerminalPayloadDescriptor {
                size,
                padded_size,
                offset,
                is_input,
            });
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_align() {
        assert_eq!(page_align(0), 0);
        assert_eq!(page_align(1), 4096);
        assert_eq!(page_align(4096), 4096);
        assert_eq!(page_align(4097), 8192);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = SequenceHistory::default();
        for seq in 0..25 {
            history.push(seq);
        }
        assert_eq!(history.len(), MAX_BUFFER_COUNT);
        assert_eq!(history.to_vec().first(), Some(&15));
    }

    #[test]
    fn test_lagged_lookup_skips_missing_frames() {
        let mut history = SequenceHistory::default();
        for seq in [10, 11, 13, 16, 17] {
            history.push(seq);
        }
        assert_eq!(history.lagged(17, 2), 13);
        assert_eq!(history.lagged(16, 0), 16);
        // not far enough into the history
        assert_eq!(history.lagged(11, 2), 11);
        // unknown sequence
        assert_eq!(history.lagged(99, 1), 99);
        // history too short for the lag
        assert_eq!(history.lagged(17, 5), 17);
    }

    #[test]
    fn test_pool_reuses_slot_for_same_sequence() {
        let mut pool = ParameterPool::new();
        pool.allocate(&BTreeMap::from([(60001, 16)]));

        let first = pool.acquire(42);
        assert!(first.refresh);
        assert_eq!(first.index, 1);

        let again = pool.acquire(42);
        assert!(!again.refresh);
        assert_eq!(again.index, first.index);
        assert_eq!(pool.cursor(), 1);
    }

    #[test]
    fn test_pool_wraps() {
        let mut pool = ParameterPool::new();
        for seq in 0..ISP_PARAM_QUEUE_SIZE as i64 + 3 {
            pool.acquire(seq);
        }
        assert_eq!(pool.cursor(), 3);
        let sequences = pool.sequences();
        assert_eq!(sequences[3], ISP_PARAM_QUEUE_SIZE as i64 + 2);
        assert!(pool.find(0).is_none());
        assert!(pool.find(3).is_some());
    }

    #[test]
    fn test_lookup() {
        let mut pool = ParameterPool::new();
        pool.allocate(&BTreeMap::from([(0, 8), (1, 4)]));
        let slot = pool.acquire(7);
        pool.store(slot.index, 1, Arc::from(vec![1u8, 2, 3]));

        assert_eq!(&*pool.lookup(7, 1).unwrap(), &[1, 2, 3]);
        assert_eq!(pool.lookup(7, 0).unwrap().len(), 8);
        assert!(pool.lookup(7, 2).is_none());
        assert!(pool.lookup(8, 1).is_none());
        assert_eq!(pool.slot(slot.index).stream_ids(), vec![0, 1]);
    }
}
