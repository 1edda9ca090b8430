// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Platform configuration.
//!
//! A [`PlatformConfig`] is loaded once from JSON and shared as an `Arc` by the
//! graph config manager, the ISP parameter adaptor and the parameter
//! generator factory. Per-camera values are reached through
//! [`PlatformConfig::camera`].

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, path::Path, path::PathBuf};

use crate::Error;

/// Stream configuration mode. AUTO is only ever requested, never selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigMode {
    Normal,
    Auto,
    Hdr,
    Ull,
    Hlc,
    HighSpeed,
    CustomAic,
    VideoLl,
    StillCapture,
    Hdr2,
    /// Matches no requested mode; what `"NONE"` in a graph setting maps to.
    End,
}

/// Operation modes are requested with the same vocabulary as config modes.
pub type OperationMode = ConfigMode;

const CONFIG_MODE_NAMES: &[(&str, ConfigMode)] = &[
    ("AUTO", ConfigMode::Auto),
    ("HDR", ConfigMode::Hdr),
    ("ULL", ConfigMode::Ull),
    ("HLC", ConfigMode::Hlc),
    ("NORMAL", ConfigMode::Normal),
    ("HIGH_SPEED", ConfigMode::HighSpeed),
    ("CUSTOM_AIC", ConfigMode::CustomAic),
    ("VIDEO_LL", ConfigMode::VideoLl),
    ("STILL_CAPTURE", ConfigMode::StillCapture),
    ("HDR2", ConfigMode::Hdr2),
    ("NONE", ConfigMode::End),
];

impl ConfigMode {
    /// Look up a mode by its graph settings name.
    pub fn from_name(name: &str) -> Option<ConfigMode> {
        CONFIG_MODE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, mode)| *mode)
    }

    pub fn name(&self) -> &'static str {
        CONFIG_MODE_NAMES
            .iter()
            .find(|(_, mode)| mode == self)
            .map(|(n, _)| *n)
            .unwrap_or("NONE")
    }
}

impl fmt::Display for ConfigMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ConfigMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigMode::from_name(&s.to_ascii_uppercase())
            .ok_or_else(|| Error::BadValue(format!("unknown config mode '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TuningMode {
    #[default]
    Video,
    VideoUll,
    VideoHdr,
    VideoHlc,
    VideoCustomAic,
    VideoLl,
    VideoRearView,
    VideoHitchView,
    StillCapture,
    VideoHdr2,
}

impl TuningMode {
    /// Tuning modes whose pipe applies the ultra-low-light exposure routing.
    pub fn is_ull_pipe(self) -> bool {
        matches!(self, TuningMode::VideoUll | TuningMode::VideoCustomAic)
    }

    pub fn is_hdr_pipe(self) -> bool {
        matches!(
            self,
            TuningMode::VideoHdr | TuningMode::VideoHdr2 | TuningMode::VideoHlc
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HdrGainType {
    #[default]
    None,
    MultiDgAndConvertionAg,
    IspDgAndSensorDirectAg,
    MultiDgAndDirectAg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DvsType {
    #[default]
    MorphTable,
    ImageTransform,
}

/// How a sensor digital gain register maps to a real gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorDgType {
    #[default]
    None,
    /// gain = n * value
    X,
    /// gain = 2 ^ value
    TwoX,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    pub config_mode: ConfigMode,
    pub tuning_mode: TuningMode,
    #[serde(default)]
    pub aiqb: String,
}

/// Sensor crop and scaling applied before the ISP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorFrameParams {
    pub horizontal_crop_offset: u32,
    pub vertical_crop_offset: u32,
    pub cropped_image_width: u32,
    pub cropped_image_height: u32,
    pub horizontal_scaling_numerator: u32,
    pub horizontal_scaling_denominator: u32,
    pub vertical_scaling_numerator: u32,
    pub vertical_scaling_denominator: u32,
}

/// Files listing kernel uuids to force on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelToggleFiles {
    pub enabled: PathBuf,
    pub disabled: PathBuf,
}

impl Default for KernelToggleFiles {
    fn default() -> Self {
        KernelToggleFiles {
            enabled: PathBuf::from("/tmp/enabledKernels"),
            disabled: PathBuf::from("/tmp/disabledKernels"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_exposure_num() -> u32 {
    1
}

fn default_max_sensor_dg() -> i32 {
    0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: i32,
    #[serde(default)]
    pub sensor_name: String,
    #[serde(default)]
    pub graph_settings_file: String,
    #[serde(default)]
    pub tuning_configs: Vec<TuningConfig>,
    #[serde(default)]
    pub config_modes_for_auto: Vec<ConfigMode>,
    #[serde(default)]
    pub custom_aic_library_name: String,
    #[serde(default)]
    pub dol_short_enabled: bool,
    #[serde(default)]
    pub dol_medium_enabled: bool,
    #[serde(default = "default_true")]
    pub enable_aiq: bool,
    #[serde(default)]
    pub enable_hdr: bool,
    #[serde(default = "default_exposure_num")]
    pub exposure_num: u32,
    #[serde(default = "default_exposure_num")]
    pub hdr_exposure_num: u32,
    #[serde(default)]
    pub ltm_gain_lag: usize,
    #[serde(default)]
    pub hdr_gain_type: HdrGainType,
    #[serde(default)]
    pub using_sensor_digital_gain: bool,
    #[serde(default)]
    pub using_isp_digital_gain: bool,
    #[serde(default)]
    pub sensor_dg_type: SensorDgType,
    #[serde(default = "default_max_sensor_dg")]
    pub max_sensor_digital_gain: i32,
    #[serde(default)]
    pub use_sensor_ob: bool,
    #[serde(default)]
    pub wfov: bool,
    #[serde(default)]
    pub use_fixed_hdr_exposure_info: bool,
    #[serde(default)]
    pub hdr_stats_input_bit_depth: u32,
    #[serde(default)]
    pub hdr_stats_output_bit_depth: u32,
    #[serde(default)]
    pub dvs_type: DvsType,
    #[serde(default)]
    pub stream_id_by_config_mode: BTreeMap<ConfigMode, i32>,
    #[serde(default)]
    pub frame_params: SensorFrameParams,
    #[serde(default)]
    pub kernel_toggle_debug: bool,
    #[serde(default)]
    pub kernel_toggle_files: KernelToggleFiles,
}

impl CameraConfig {
    pub fn new(id: i32) -> Self {
        CameraConfig {
            id,
            sensor_name: String::new(),
            graph_settings_file: String::new(),
            tuning_configs: Vec::new(),
            config_modes_for_auto: Vec::new(),
            custom_aic_library_name: String::new(),
            dol_short_enabled: false,
            dol_medium_enabled: false,
            enable_aiq: true,
            enable_hdr: false,
            exposure_num: 1,
            hdr_exposure_num: 1,
            ltm_gain_lag: 0,
            hdr_gain_type: HdrGainType::None,
            using_sensor_digital_gain: false,
            using_isp_digital_gain: false,
            sensor_dg_type: SensorDgType::None,
            max_sensor_digital_gain: 0,
            use_sensor_ob: false,
            wfov: false,
            use_fixed_hdr_exposure_info: false,
            hdr_stats_input_bit_depth: 0,
            hdr_stats_output_bit_depth: 0,
            dvs_type: DvsType::MorphTable,
            stream_id_by_config_mode: BTreeMap::new(),
            frame_params: SensorFrameParams::default(),
            kernel_toggle_debug: false,
            kernel_toggle_files: KernelToggleFiles::default(),
        }
    }

    pub fn with_tuning_config(mut self, config_mode: ConfigMode, tuning_mode: TuningMode) -> Self {
        self.tuning_configs.push(TuningConfig {
            config_mode,
            tuning_mode,
            aiqb: String::new(),
        });
        self
    }

    pub fn with_custom_aic_library(mut self, name: &str) -> Self {
        self.custom_aic_library_name = name.to_string();
        self
    }

    /// Config modes serving `operation_mode`.
    ///
    /// AUTO expands to `config_modes_for_auto`, or to the first tuning config
    /// when that list is empty. Any other mode selects every tuning config of
    /// the same mode.
    pub fn config_modes_by_operation_mode(
        &self,
        operation_mode: OperationMode,
    ) -> Result<Vec<ConfigMode>, Error> {
        if self.tuning_configs.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "camera {} has no tuning config",
                self.id
            )));
        }

        let modes: Vec<ConfigMode> = if operation_mode == ConfigMode::Auto {
            if self.config_modes_for_auto.is_empty() {
                vec![self.tuning_configs[0].config_mode]
            } else {
                self.config_modes_for_auto.clone()
            }
        } else {
            self.tuning_configs
                .iter()
                .filter(|cfg| cfg.config_mode == operation_mode)
                .map(|cfg| cfg.config_mode)
                .collect()
        };

        if modes.is_empty() {
            log::warn!(
                "camera {} has no config mode for operation mode {}",
                self.id,
                operation_mode
            );
            return Err(Error::InvalidOperation(format!(
                "no config mode for operation mode {}",
                operation_mode
            )));
        }
        log::debug!("operation mode {} -> config modes {:?}", operation_mode, modes);
        Ok(modes)
    }

    pub fn tuning_mode_by_config_mode(&self, config_mode: ConfigMode) -> Result<TuningMode, Error> {
        self.tuning_configs
            .iter()
            .find(|cfg| cfg.config_mode == config_mode)
            .map(|cfg| cfg.tuning_mode)
            .ok_or_else(|| {
                Error::InvalidOperation(format!("no tuning mode for config mode {}", config_mode))
            })
    }

    /// Pipeline stream id pinned for `config_mode`, or -1.
    pub fn stream_id_by_config_mode(&self, config_mode: ConfigMode) -> i32 {
        self.stream_id_by_config_mode
            .get(&config_mode)
            .copied()
            .unwrap_or(-1)
    }

    /// Register value of the sensor share of `real_dg`.
    pub fn sensor_digital_gain(&self, real_dg: f32) -> i32 {
        match self.sensor_dg_type {
            SensorDgType::TwoX => {
                let mut sensor_dg = 0;
                let mut index = 0;
                while 2f32.powi(index) <= real_dg {
                    sensor_dg = index;
                    index += 1;
                }
                sensor_dg.clamp(0, self.max_sensor_digital_gain.max(0))
            }
            other => {
                log::error!("unsupported sensor digital gain type {:?}", other);
                0
            }
        }
    }

    /// ISP share of `real_dg` once the sensor share is removed, never below 1.
    pub fn isp_digital_gain(&self, real_dg: f32) -> f32 {
        match self.sensor_dg_type {
            SensorDgType::TwoX => {
                let sensor_dg = self.sensor_digital_gain(real_dg);
                (real_dg / 2f32.powi(sensor_dg)).max(1.0)
            }
            other => {
                log::error!("unsupported sensor digital gain type {:?}", other);
                1.0
            }
        }
    }
}

/// Static platform configuration for every camera.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

impl PlatformConfig {
    pub fn new(cameras: Vec<CameraConfig>) -> Self {
        PlatformConfig { cameras }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::debug!(
            "loaded {} camera(s) from {}",
            config.cameras.len(),
            path.as_ref().display()
        );
        Ok(config)
    }

    pub fn camera(&self, id: i32) -> Result<&CameraConfig, Error> {
        self.cameras
            .iter()
            .find(|camera| camera.id == id)
            .ok_or_else(|| Error::NameNotFound(format!("camera {}", id)))
    }
}
