// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use ipuhal_sys as ffi;
use unix_ts::Timestamp;

use crate::{config::TuningMode, stream::Resolution};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exposure {
    pub exposure_time_us: i32,
    pub analog_gain: f32,
    pub digital_gain: f32,
    pub total_target_exposure: i32,
}

/// Auto exposure output. An empty `exposures` list means AE produced no
/// exposure for this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AeResults {
    pub exposures: Vec<Exposure>,
    pub converged: bool,
    pub weight_grid: Vec<u8>,
}

impl AeResults {
    pub fn first_exposure(&self) -> Option<&Exposure> {
        self.exposures.first()
    }

    pub fn to_ffi(&self) -> ffi::ia_aiq_ae_results {
        let mut raw = ffi::ia_aiq_ae_results {
            converged: self.converged,
            ..Default::default()
        };
        for (slot, exposure) in raw.exposures.iter_mut().zip(self.exposures.iter()) {
            *slot = ffi::ia_aiq_exposure {
                exposure_time_us: exposure.exposure_time_us,
                analog_gain: exposure.analog_gain,
                digital_gain: exposure.digital_gain,
                total_target_exposure: exposure.total_target_exposure,
            };
        }
        raw.num_exposures = self.exposures.len().min(ffi::MAX_EXPOSURES_NUM) as u32;
        raw
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AwbResults {
    pub accurate_r_per_g: f32,
    pub accurate_b_per_g: f32,
    pub final_r_per_g: f32,
    pub final_b_per_g: f32,
    pub cct_estimate: u32,
    pub distance_from_convergence: f32,
}

impl AwbResults {
    pub fn to_ffi(&self) -> ffi::ia_aiq_awb_results {
        ffi::ia_aiq_awb_results {
            accurate_r_per_g: self.accurate_r_per_g,
            accurate_b_per_g: self.accurate_b_per_g,
            final_r_per_g: self.final_r_per_g,
            final_b_per_g: self.final_b_per_g,
            cct_estimate: self.cct_estimate,
            distance_from_convergence: self.distance_from_convergence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GbceResults {
    pub gamma_lut: Vec<f32>,
    pub tone_map_lut: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorGains {
    pub r: f32,
    pub gr: f32,
    pub gb: f32,
    pub b: f32,
}

impl Default for ColorGains {
    fn default() -> Self {
        ColorGains {
            r: 1.0,
            gr: 1.0,
            gb: 1.0,
            b: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaResults {
    pub color_gains: ColorGains,
    pub color_conversion_matrix: [[f32; 3]; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BayerOrder {
    #[default]
    Grbg,
    Rggb,
    Bggr,
    Gbrg,
}

/// Shading adaptor output: one lens shading table per Bayer channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaResults {
    pub width: u16,
    pub height: u16,
    pub fraction_bits: u8,
    pub color_order: BayerOrder,
    pub lsc_update: bool,
    pub lsc_grid: [Vec<u16>; 4],
}

impl SaResults {
    /// Flat 2x2 table, enough for the adaptation to build baseline tables.
    pub fn flat() -> Self {
        SaResults {
            width: 2,
            height: 2,
            fraction_bits: 0,
            color_order: BayerOrder::Grbg,
            lsc_update: true,
            lsc_grid: [vec![1; 4], vec![1; 4], vec![1; 4], vec![1; 4]],
        }
    }

    pub fn area(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

/// Pipe chosen by a Custom AIC plugin for its custom controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CustomAicPipe {
    #[default]
    None,
    Ull,
    Hdr,
}

impl From<ffi::CustomAicPipe> for CustomAicPipe {
    fn from(raw: ffi::CustomAicPipe) -> Self {
        match raw {
            ffi::CUSTOM_AIC_PIPE_ULL => CustomAicPipe::Ull,
            ffi::CUSTOM_AIC_PIPE_HDR => CustomAicPipe::Hdr,
            _ => CustomAicPipe::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomControls {
    pub parameters: Vec<f32>,
}

impl CustomControls {
    pub fn count(&self) -> usize {
        self.parameters.len()
    }
}

/// Per-request parameters that travel with the 3A result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AiqParam {
    pub flip_mode: i32,
    pub yuv_color_range_mode: i32,
}

/// Everything 3A produced for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiqResult {
    pub sequence: i64,
    pub tuning_mode: TuningMode,
    pub ae_results: AeResults,
    pub awb_results: AwbResults,
    pub gbce_results: GbceResults,
    pub pa_results: PaResults,
    pub sa_results: SaResults,
    pub custom_controls: CustomControls,
    pub custom_aic_pipe: CustomAicPipe,
    pub aiq_param: AiqParam,
}

impl AiqResult {
    pub fn new(sequence: i64) -> Self {
        AiqResult {
            sequence,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LtmResult {
    pub sequence: i64,
    pub gains: Vec<u16>,
    pub drc_params: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DvsMorphTable {
    pub width: u32,
    pub height: u32,
    pub xcoords: Vec<u32>,
    pub ycoords: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GdcTransformation {
    pub matrices: Vec<[[f32; 3]; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DvsResult {
    pub sequence: i64,
    pub morph_table: DvsMorphTable,
    pub transformation: GdcTransformation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbsBlock {
    pub avg_r: u8,
    pub avg_gr: u8,
    pub avg_gb: u8,
    pub avg_b: u8,
    pub sat: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RgbsGrid {
    pub width: u16,
    pub height: u16,
    pub blocks: Vec<RgbsBlock>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HdrRgbsBlock {
    pub avg_r: u16,
    pub avg_gr: u16,
    pub avg_gb: u16,
    pub avg_b: u16,
    pub sat: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HdrRgbsGrid {
    pub width: u16,
    pub height: u16,
    pub blocks: Vec<HdrRgbsBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AfGrid {
    pub width: u16,
    pub height: u16,
    pub block_width: u16,
    pub block_height: u16,
    pub filter_response_1: Vec<i32>,
    pub filter_response_2: Vec<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionVector {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DvsStatistics {
    pub sequence: i64,
    pub resolution: Resolution,
    pub vectors: Vec<MotionVector>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HdrYvGrid {
    pub width: u16,
    pub height: u16,
    pub y_avg: Vec<u16>,
    pub v_max: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LtmStatistics {
    pub sequence: i64,
    pub grid: HdrYvGrid,
}

/// RGBS and AF statistics decoded for one frame.
#[derive(Debug, Clone)]
pub struct AiqStatistics {
    pub sequence: i64,
    pub timestamp: Timestamp,
    pub tuning_mode: TuningMode,
    pub rgbs_grids: Vec<RgbsGrid>,
    pub hdr_rgbs_grid: Option<HdrRgbsGrid>,
    pub af_grid: AfGrid,
}
