// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::vendor::{ViewFineAdjustments, ViewRotation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeatureLevel {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

/// Level and strength of a noise reduction or edge enhancement feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSetting {
    pub feature_level: FeatureLevel,
    pub strength: i8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IspEffect {
    #[default]
    None,
    Sepia,
    BlackAndWhite,
    Negative,
    SkyBlue,
    GrassGreen,
    SkinWhiten,
}

/// Manual image enhancement offsets, zero is neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageEnhancement {
    pub brightness: i8,
    pub contrast: i8,
    pub hue: i8,
    pub saturation: i8,
}

/// Optical black level measured by the sensor, per Bayer channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObOutput {
    pub cc00: f32,
    pub cc01: f32,
    pub cc10: f32,
    pub cc11: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProjectionType {
    #[default]
    Rectilinear = 0,
    Cylindrical = 1,
    Equirectangular = 2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewProjection {
    pub projection_type: ProjectionType,
    pub cone_angle: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraMountType {
    #[default]
    Wall = 0,
    Ceiling = 1,
}

/// Per-request ISP overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct IspSettings {
    pub nr_setting: FeatureSetting,
    pub ee_setting: FeatureSetting,
    pub effects: IspEffect,
    pub video_stabilization: bool,
    pub manual_settings: ImageEnhancement,
    pub pal_override: Option<Vec<u8>>,
    /// Vertical blanking period of a DOL sensor.
    pub vbp: i16,
    pub use_sensor_ob: bool,
    pub ob_output: ObOutput,
    pub wfov_mode: bool,
    pub zoom: f32,
    pub view_projection: ViewProjection,
    pub view_fine_adjustments: ViewFineAdjustments,
    pub view_rotation: ViewRotation,
    pub camera_rotation: ViewRotation,
    pub sensor_mount_type: CameraMountType,
}

impl Default for IspSettings {
    fn default() -> Self {
        IspSettings {
            nr_setting: FeatureSetting::default(),
            ee_setting: FeatureSetting::default(),
            effects: IspEffect::None,
            video_stabilization: false,
            manual_settings: ImageEnhancement::default(),
            pal_override: None,
            vbp: 0,
            use_sensor_ob: false,
            ob_output: ObOutput::default(),
            wfov_mode: false,
            zoom: 1.0,
            view_projection: ViewProjection::default(),
            view_fine_adjustments: ViewFineAdjustments::default(),
            view_rotation: ViewRotation::default(),
            camera_rotation: ViewRotation::default(),
            sensor_mount_type: CameraMountType::Wall,
        }
    }
}
