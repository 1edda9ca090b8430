// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use unix_ts::Timestamp;

use crate::Error;

/// Role of a buffer in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    General,
    /// Statistics captured by the input system, decoded through the P2P codec.
    IsysStats,
    /// Statistics produced by the processing system.
    PsysStats,
    PsysInput,
    /// ISA configuration buffer: process group in plane 0, payloads in plane 1.
    IsaConfig,
}

impl fmt::Display for BufferUsage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BufferUsage::General => "general",
            BufferUsage::IsysStats => "isys-stats",
            BufferUsage::PsysStats => "psys-stats",
            BufferUsage::PsysInput => "psys-input",
            BufferUsage::IsaConfig => "isa-config",
        };
        f.write_str(name)
    }
}

/// A captured multi-plane buffer.
#[derive(Debug, Clone)]
pub struct CameraBuffer {
    usage: BufferUsage,
    sequence: i64,
    timestamp: Timestamp,
    planes: Vec<Vec<u8>>,
}

impl CameraBuffer {
    pub fn new(usage: BufferUsage, planes: Vec<Vec<u8>>) -> Self {
        CameraBuffer {
            usage,
            sequence: -1,
            timestamp: Timestamp::new(0, 0),
            planes,
        }
    }

    /// A buffer with `sizes.len()` zero-filled planes.
    pub fn with_plane_sizes(usage: BufferUsage, sizes: &[usize]) -> Self {
        Self::new(usage, sizes.iter().map(|size| vec![0u8; *size]).collect())
    }

    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_timestamp(mut self, seconds: i64, nanos: u32) -> Self {
        self.timestamp = Timestamp::new(seconds, nanos);
        self
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: i64) {
        self.sequence = sequence;
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp.clone()
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, index: usize) -> Result<&[u8], Error> {
        self.planes
            .get(index)
            .map(|plane| plane.as_slice())
            .ok_or_else(|| Error::BadValue(format!("buffer has no plane {}", index)))
    }

    pub fn plane_mut(&mut self, index: usize) -> Result<&mut [u8], Error> {
        self.planes
            .get_mut(index)
            .map(|plane| plane.as_mut_slice())
            .ok_or_else(|| Error::BadValue(format!("buffer has no plane {}", index)))
    }

    /// Planes 0 and 1 borrowed together.
    pub fn split_planes_mut(&mut self) -> Result<(&mut [u8], &mut [u8]), Error> {
        if self.planes.len() < 2 {
            return Err(Error::BadValue(format!(
                "buffer has {} plane(s), two are required",
                self.planes.len()
            )));
        }
        let (first, rest) = self.planes.split_at_mut(1);
        Ok((first[0].as_mut_slice(), rest[0].as_mut_slice()))
    }
}
