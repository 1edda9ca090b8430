// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! 3A results, decoded statistics and the per-camera [`ResultStore`] that
//! connects the statistics decoder to the next frame's adaptation.

mod results;
mod storage;

pub use results::*;
pub use storage::{
    ResultStore, AIQ_RESULT_CAPACITY, AIQ_STATISTICS_CAPACITY, DVS_RESULT_CAPACITY,
    DVS_STATISTICS_CAPACITY, LTM_RESULT_CAPACITY, LTM_STATISTICS_CAPACITY,
};
