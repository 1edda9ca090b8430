// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Custom AIC module built as a cdylib by the plugin tests.
//!
//! The module keeps the last parameter blob and, on every run, writes the
//! first exposure's digital gain, the final R/G ratio, the exposure count
//! and then each parameter byte as custom controls. Converged AE selects the
//! HDR pipe, anything else the ULL pipe. Call counters are exported through
//! `ipuhal_test_aic_calls` so a test can check what the host invoked.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(dead_code)]

use std::ffi::{c_float, c_int, c_void};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

const MAX_EXPOSURES_NUM: usize = 3;

pub const CALLS_INIT: c_int = 0;
pub const CALLS_DEINIT: c_int = 1;
pub const CALLS_SET_PARAM: c_int = 2;
pub const CALLS_RUN: c_int = 3;

#[repr(C)]
pub struct CustomAicParam {
    data: *mut c_void,
    length: c_int,
}

#[repr(C)]
pub struct ia_aiq_exposure {
    exposure_time_us: c_int,
    analog_gain: c_float,
    digital_gain: c_float,
    total_target_exposure: c_int,
}

#[repr(C)]
pub struct ia_aiq_ae_results {
    num_exposures: u32,
    exposures: [ia_aiq_exposure; MAX_EXPOSURES_NUM],
    converged: bool,
}

#[repr(C)]
pub struct ia_aiq_awb_results {
    accurate_r_per_g: c_float,
    accurate_b_per_g: c_float,
    final_r_per_g: c_float,
    final_b_per_g: c_float,
    cct_estimate: u32,
    distance_from_convergence: c_float,
}

#[repr(C)]
pub struct ia_isp_custom_controls {
    count: c_int,
    capacity: c_int,
    parameters: *mut c_float,
}

#[repr(C)]
pub struct CustomAicModule {
    customAicModuleVersion: c_int,
    init: Option<unsafe extern "C" fn() -> c_int>,
    deinit: Option<unsafe extern "C" fn() -> c_int>,
    setAicParam: Option<unsafe extern "C" fn(*const CustomAicParam) -> c_int>,
    runExternalAic: Option<
        unsafe extern "C" fn(
            *const ia_aiq_ae_results,
            *const ia_aiq_awb_results,
            *mut ia_isp_custom_controls,
            *mut c_int,
        ) -> c_int,
    >,
}

static INIT_CALLS: AtomicI32 = AtomicI32::new(0);
static DEINIT_CALLS: AtomicI32 = AtomicI32::new(0);
static SET_PARAM_CALLS: AtomicI32 = AtomicI32::new(0);
static RUN_CALLS: AtomicI32 = AtomicI32::new(0);
static PARAM: Mutex<Vec<u8>> = Mutex::new(Vec::new());

unsafe extern "C" fn init() -> c_int {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn deinit() -> c_int {
    DEINIT_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

unsafe extern "C" fn set_aic_param(param: *const CustomAicParam) -> c_int {
    SET_PARAM_CALLS.fetch_add(1, Ordering::SeqCst);
    let Some(param) = param.as_ref() else {
        return -1;
    };
    let bytes = if param.data.is_null() || param.length <= 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(param.data as *const u8, param.length as usize).to_vec()
    };
    match PARAM.lock() {
        Ok(mut stored) => {
            *stored = bytes;
            0
        }
        Err(_) => -1,
    }
}

unsafe extern "C" fn run_external_aic(
    ae: *const ia_aiq_ae_results,
    awb: *const ia_aiq_awb_results,
    controls: *mut ia_isp_custom_controls,
    pipe: *mut c_int,
) -> c_int {
    RUN_CALLS.fetch_add(1, Ordering::SeqCst);
    let (Some(ae), Some(awb), Some(controls)) = (ae.as_ref(), awb.as_ref(), controls.as_mut())
    else {
        return -1;
    };
    if pipe.is_null() || controls.parameters.is_null() {
        return -1;
    }
    let Ok(param) = PARAM.lock() else {
        return -1;
    };

    let mut values = vec![
        ae.exposures[0].digital_gain,
        awb.final_r_per_g,
        ae.num_exposures as c_float,
    ];
    values.extend(param.iter().map(|byte| *byte as c_float));

    let count = values.len().min(controls.capacity.max(0) as usize);
    for (index, value) in values.iter().take(count).enumerate() {
        *controls.parameters.add(index) = *value;
    }
    controls.count = count as c_int;
    *pipe = if ae.converged { 2 } else { 1 };
    0
}

#[no_mangle]
pub static CAMI: CustomAicModule = CustomAicModule {
    customAicModuleVersion: 7,
    init: Some(init),
    deinit: Some(deinit),
    setAicParam: Some(set_aic_param),
    runExternalAic: Some(run_external_aic),
};

#[no_mangle]
pub extern "C" fn ipuhal_test_aic_calls(kind: c_int) -> c_int {
    let counter = match kind {
        CALLS_INIT => &INIT_CALLS,
        CALLS_DEINIT => &DEINIT_CALLS,
        CALLS_SET_PARAM => &SET_PARAM_CALLS,
        CALLS_RUN => &RUN_CALLS,
        _ => return -1,
    };
    counter.load(Ordering::SeqCst)
}
