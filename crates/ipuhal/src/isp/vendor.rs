// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Seam to the vendor imaging libraries.
//!
//! The adaptation library (AIC/PAL), the bit-compression helper and the
//! program group codec (P2P) are proprietary binaries. They are reached only
//! through the traits in this module so the adaptor can run against any
//! implementation, including the in-memory fakes used by the tests.

use crate::{
    aiq::{
        AeResults, AfGrid, AwbResults, CustomControls, DvsMorphTable, GbceResults,
        GdcTransformation, HdrRgbsGrid, HdrYvGrid, LtmResult, MotionVector, PaResults,
        RgbsGrid, SaResults,
    },
    config::{SensorFrameParams, TuningMode},
    graph::ProgramGroup,
    stream::Resolution,
    Error,
};

use super::settings::{FeatureLevel, FeatureSetting, ImageEnhancement, IspEffect, IspSettings, ObOutput};

/// Largest RGBS/AF grid the adaptation is sized for.
pub const MAX_STATISTICS_WIDTH: u32 = 80;
pub const MAX_STATISTICS_HEIGHT: u32 = 60;

/// Input system kernel ids of the 3A statistics terminals.
pub mod isys_kernel {
    pub const STAT_AWB: u32 = 0x1a;
    pub const STAT_AF: u32 = 0x1b;
}

/// Staggered HDR readout handled by the bit-compression helper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DolMode {
    #[default]
    NonDol,
    TwoOrThreeFrame,
    Dcg,
    CombinedVeryShort,
    DcgVeryShort,
}

impl DolMode {
    /// Mode for a DOL name as written in graph settings.
    pub fn from_name(name: &str) -> Option<DolMode> {
        match name {
            "DOL_MODE_2_3_FRAME" => Some(DolMode::TwoOrThreeFrame),
            "DOL_MODE_DCG" => Some(DolMode::Dcg),
            "DOL_MODE_COMBINED_VERY_SHORT" => Some(DolMode::CombinedVeryShort),
            "DOL_MODE_DCG_VERY_SHORT" => Some(DolMode::DcgVeryShort),
            _ => None,
        }
    }
}

/// Parameters of the adaptation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptationInit {
    pub tuning_mode: TuningMode,
    pub max_stats_width: u32,
    pub max_stats_height: u32,
    /// Exposures per statistics buffer.
    pub stats_num: u32,
}

/// Single fragment covering the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentDesc {
    pub width: u32,
    pub height: u32,
}

/// Content flags of one statistics buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResults {
    pub af_grid: bool,
    pub histograms: bool,
    pub rgbs_grid: bool,
    pub rgbs_grids_hdr: bool,
    pub rgby_grids_hdr: bool,
    pub yv_grids_hdr: bool,
    pub dvs_stats: bool,
}

/// Output of one bit-compression run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BitCompressionResults {
    pub lut: Vec<u32>,
    pub ratio: f32,
}

/// Split threshold of one exposure for the legacy HDR statistics path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSplitThreshold {
    pub low: f32,
    pub high: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HdrExposureInfo {
    pub num_exposures: u32,
    pub hdr_gain: f32,
    pub thresholds: Vec<StatSplitThreshold>,
    pub exposure_ratios: Vec<f32>,
}

/// Fixed two-exposure split used by sensors without exposure metadata.
pub fn hdr_exposure_info() -> HdrExposureInfo {
    let thresholds = vec![
        StatSplitThreshold {
            low: 0.0,
            high: 32767.0,
            scale: 1.0,
        },
        StatSplitThreshold {
            low: 0.0,
            high: 2047.0,
            scale: 1.0,
        },
    ];
    let last = thresholds[thresholds.len() - 1].high;
    let exposure_ratios = thresholds[..thresholds.len() - 1]
        .iter()
        .map(|t| t.high / last)
        .collect();

    HdrExposureInfo {
        num_exposures: thresholds.len() as u32,
        hdr_gain: 1.0,
        thresholds,
        exposure_ratios,
    }
}

/// HDR statistics decompression, applied with the max(R,G,B) Y method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdrCompression {
    pub input_bpp: u32,
    pub output_bpp: u32,
}

/// How HDR RGBS statistics are converted.
#[derive(Debug, Clone, PartialEq)]
pub enum HdrAwbConversion<'a> {
    /// Legacy sensors: fixed split thresholds, gains with DG removed.
    FixedExposureInfo {
        info: HdrExposureInfo,
        gains: [f32; 3],
    },
    /// Exposure driven conversion, decompressing when bit depths differ.
    BitDepth {
        ae_results: &'a AeResults,
        compression: Option<HdrCompression>,
        gains: [f32; 3],
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewRotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewFineAdjustments {
    pub horizontal_shift: f32,
    pub vertical_shift: f32,
    pub window_rotation: f32,
    pub vertical_stretch: f32,
}

/// Wide field of view projection handed to the dewarping kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewConfig {
    pub camera_mount_type: i32,
    pub zoom: f32,
    pub projection_type: i32,
    pub cone_angle: f32,
    pub invalid_coordinate_mask: [u8; 4],
    pub view_rotation: ViewRotation,
    pub camera_rotation: ViewRotation,
    pub fine_adjustments: ViewFineAdjustments,
}

impl ViewConfig {
    pub fn from_settings(settings: &IspSettings) -> Self {
        ViewConfig {
            camera_mount_type: settings.sensor_mount_type as i32,
            zoom: settings.zoom,
            projection_type: settings.view_projection.projection_type as i32,
            cone_angle: settings.view_projection.cone_angle,
            invalid_coordinate_mask: [0, 128, 128, 128],
            view_rotation: settings.view_rotation,
            camera_rotation: settings.camera_rotation,
            fine_adjustments: settings.view_fine_adjustments,
        }
    }
}

/// Everything one adaptation call consumes.
#[derive(Debug, Clone)]
pub struct InputParams<'a> {
    pub program_group: &'a ProgramGroup,
    pub sensor_frame_params: SensorFrameParams,
    pub ae_results: Option<&'a AeResults>,
    pub awb_results: Option<&'a AwbResults>,
    pub gbce_results: Option<&'a GbceResults>,
    pub pa_results: Option<&'a PaResults>,
    pub sa_results: Option<&'a SaResults>,
    pub weight_grid: &'a [u8],
    pub ltm_results: Option<&'a LtmResult>,
    pub bcomp_results: Option<&'a BitCompressionResults>,
    pub custom_controls: Option<&'a CustomControls>,
    pub nr_setting: FeatureSetting,
    pub ee_setting: FeatureSetting,
    pub effects: IspEffect,
    pub manual: ImageEnhancement,
    pub dvs_morph_table: Option<&'a DvsMorphTable>,
    pub gdc_transformation: Option<&'a GdcTransformation>,
    pub ob_black_level: Option<ObOutput>,
    pub view_params: Option<ViewConfig>,
    pub pal_override: Option<&'a [u8]>,
    pub manual_digital_gain: Option<f32>,
}

impl<'a> InputParams<'a> {
    pub fn new(program_group: &'a ProgramGroup, sensor_frame_params: SensorFrameParams) -> Self {
        InputParams {
            program_group,
            sensor_frame_params,
            ae_results: None,
            awb_results: None,
            gbce_results: None,
            pa_results: None,
            sa_results: None,
            weight_grid: &[],
            ltm_results: None,
            bcomp_results: None,
            custom_controls: None,
            nr_setting: FeatureSetting::default(),
            ee_setting: FeatureSetting::default(),
            effects: IspEffect::default(),
            manual: ImageEnhancement::default(),
            dvs_morph_table: None,
            gdc_transformation: None,
            ob_black_level: None,
            view_params: None,
            pal_override: None,
            manual_digital_gain: None,
        }
    }

    /// Defaults of the cold run for the full pipeline role: low edge
    /// enhancement and high noise reduction, both at zero strength.
    pub fn with_psys_isa_defaults(mut self) -> Self {
        self.ee_setting = FeatureSetting {
            feature_level: FeatureLevel::Low,
            strength: 0,
        };
        self.nr_setting = FeatureSetting {
            feature_level: FeatureLevel::High,
            strength: 0,
        };
        self
    }
}

/// Entry points of the vendor libraries.
pub trait VendorLibrary: Send + Sync {
    /// Load the tuning data for `init.tuning_mode` and create an adaptation
    /// handle.
    fn init_adaptation(&self, init: &AdaptationInit) -> Result<Box<dyn IspAdaptation>, Error>;

    fn init_bit_compression(
        &self,
        tuning_mode: TuningMode,
        dol_mode: DolMode,
        conversion_gain_ratio: f32,
    ) -> Result<Box<dyn BitCompression>, Error>;

    /// Create a codec for the input system process group, seeded with the
    /// current parameter blob.
    fn init_codec(
        &self,
        parameters: &[u8],
        fragments: &[FragmentDesc],
    ) -> Result<Box<dyn ProcessGroupCodec>, Error>;

    /// Worst case size of the parameter blob for `program_group`.
    fn output_size(&self, program_group: &ProgramGroup) -> usize;
}

/// One adaptation handle (AIC/PAL).
pub trait IspAdaptation: Send {
    /// Produce the parameter blob for `params` into `output`. Returns the
    /// number of bytes used.
    fn run(&mut self, params: &InputParams<'_>, output: &mut [u8]) -> Result<usize, Error>;

    fn statistics_query(&self, stats: &[u8]) -> Result<QueryResults, Error>;

    fn convert_dvs(&self, stats: &[u8], resolution: Resolution) -> Result<Vec<MotionVector>, Error>;

    fn convert_hdr_yv(&self, stats: &[u8]) -> Result<HdrYvGrid, Error>;

    /// RGBS grids, one per exposure.
    fn convert_awb(
        &self,
        stats: &[u8],
        ae_results: Option<&AeResults>,
        bcomp_results: Option<&BitCompressionResults>,
    ) -> Result<Vec<RgbsGrid>, Error>;

    fn convert_awb_hdr(
        &self,
        stats: &[u8],
        conversion: &HdrAwbConversion<'_>,
    ) -> Result<(Vec<RgbsGrid>, HdrRgbsGrid), Error>;

    fn convert_af(&self, stats: &[u8]) -> Result<AfGrid, Error>;
}

pub trait BitCompression: Send {
    fn run(&mut self, ae_results: &AeResults) -> Result<BitCompressionResults, Error>;
}

/// Program group descriptor and terminal payload codec (P2P).
pub trait ProcessGroupCodec: Send {
    fn process_group_size(&self) -> usize;

    fn terminal_count(&self) -> usize;

    fn terminal_payload_size(&self, terminal: usize) -> usize;

    fn is_input_terminal(&self, terminal: usize) -> bool;

    fn terminal_by_uid(&self, uid: u32) -> Result<usize, Error>;

    fn set_parameters(&mut self, parameters: &[u8]) -> Result<(), Error>;

    /// Write the process group descriptor into `pg`.
    fn create_process_group(&mut self, pg: &mut [u8]) -> Result<(), Error>;

    /// Encode one terminal. Output terminals get no payload, their location
    /// is chosen by the hardware.
    fn encode_terminal_payload(
        &mut self,
        pg: &mut [u8],
        terminal: usize,
        payload: Option<&mut [u8]>,
        offset: usize,
    ) -> Result<(), Error>;

    fn decode_terminal_payload(
        &self,
        pg: &[u8],
        terminal: usize,
        payload: &[u8],
    ) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dol_names() {
        assert_eq!(DolMode::from_name("DOL_MODE_DCG"), Some(DolMode::Dcg));
        assert_eq!(
            DolMode::from_name("DOL_MODE_COMBINED_VERY_SHORT"),
            Some(DolMode::CombinedVeryShort)
        );
        assert_eq!(DolMode::from_name("dol_mode_dcg"), None);
        assert_eq!(DolMode::default(), DolMode::NonDol);
    }

    #[test]
    fn test_fixed_hdr_exposure_info() {
        let info = hdr_exposure_info();
        assert_eq!(info.num_exposures, 2);
        assert_eq!(info.hdr_gain, 1.0);
        assert_eq!(info.thresholds[1].high, 2047.0);
        assert_eq!(info.exposure_ratios.len(), 1);
        assert!((info.exposure_ratios[0] - 32767.0 / 2047.0).abs() < 1e-4);
    }

    #[test]
    fn test_psys_isa_defaults() {
        let group = ProgramGroup::default();
        let params =
            InputParams::new(&group, SensorFrameParams::default()).with_psys_isa_defaults();
        assert_eq!(params.ee_setting.feature_level, FeatureLevel::Low);
        assert_eq!(params.nr_setting.feature_level, FeatureLevel::High);
        assert_eq!(params.nr_setting.strength, 0);
        assert!(params.manual_digital_gain.is_none());
    }
}
