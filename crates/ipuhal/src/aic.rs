// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::path::PathBuf;

use crate::{
    aiq::{AiqResult, CustomAicPipe},
    config::PlatformConfig,
    ffi, Error,
};

/// Capacity of the custom control array offered to a plugin.
pub const MAX_CUSTOM_CONTROLS_PARAM_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Parameters come from the vendor adaptation alone.
    Builtin,
    /// A Custom AIC plugin adds custom controls to each result.
    Plugin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AicState {
    NotInit,
    Init,
}

/// Source of the per-frame custom controls that augment the vendor
/// adaptation output.
pub trait ParameterGenerator: Send {
    fn kind(&self) -> GeneratorKind;

    fn init(&mut self) -> Result<(), Error>;

    /// Forward an opaque tuning blob to the generator.
    fn update_parameter(&mut self, param: &[u8]) -> Result<(), Error>;

    /// Fill the custom controls and pipe of `result`.
    fn run(&mut self, result: &mut AiqResult) -> Result<(), Error>;

    fn deinit(&mut self) -> Result<(), Error>;
}

/// The vendor adaptation path with no external controls.
#[derive(Debug, Default)]
pub struct BuiltinAic;

impl ParameterGenerator for BuiltinAic {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Builtin
    }

    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn update_parameter(&mut self, _param: &[u8]) -> Result<(), Error> {
        Ok(())
    }

    fn run(&mut self, result: &mut AiqResult) -> Result<(), Error> {
        result.custom_aic_pipe = CustomAicPipe::None;
        result.custom_controls.parameters.clear();
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Custom AIC plugin of one camera.
///
/// The plugin is optional: with no library name configured, or no library
/// file on disk, the generator stays [`AicState::NotInit`] and every call
/// succeeds without doing anything.
#[derive(Debug)]
pub struct CustomizedAic {
    camera_id: i32,
    library_name: String,
    library: Option<ffi::CustomAicLibrary>,
    state: AicState,
}

impl CustomizedAic {
    pub fn new(camera_id: i32, library_name: &str) -> Self {
        CustomizedAic {
            camera_id,
            library_name: library_name.to_string(),
            library: None,
            state: AicState::NotInit,
        }
    }

    pub fn camera_id(&self) -> i32 {
        self.camera_id
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    pub fn state(&self) -> AicState {
        self.state
    }

    /// Where [`ParameterGenerator::init`] looks for the plugin.
    pub fn library_path(&self) -> PathBuf {
        ffi::custom_aic_library_path(&self.library_name)
    }

    /// Module version of the loaded plugin.
    pub fn version(&self) -> Option<i32> {
        self.library.as_ref().map(|library| library.version())
    }
}

impl ParameterGenerator for CustomizedAic {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Plugin
    }

    fn init(&mut self) -> Result<(), Error> {
        if self.state == AicState::Init || self.library_name.is_empty() {
            return Ok(());
        }

        let path = self.library_path();
        if !path.exists() {
            log::debug!(
                "camera {}: custom AIC library {} not present",
                self.camera_id,
                path.display()
            );
            return Ok(());
        }

        // SAFETY: the library is named by the platform configuration, which
        // is trusted to point at a Custom AIC module.
        let library = unsafe { ffi::CustomAicLibrary::open(&path) }.map_err(|err| {
            log::error!("failed to load {}: {}", path.display(), err);
            Error::BadValue(format!("custom AIC library {}: {}", path.display(), err))
        })?;

        let ret = library.init();
        if ret != 0 {
            log::error!("custom AIC init failed: {}", ret);
            return Err(Error::BadValue(format!(
                "custom AIC init returned {}",
                ret
            )));
        }

        log::info!(
            "camera {}: custom AIC {} version {} loaded",
            self.camera_id,
            self.library_name,
            library.version()
        );
        self.library = Some(library);
        self.state = AicState::Init;
        Ok(())
    }

    fn update_parameter(&mut self, param: &[u8]) -> Result<(), Error> {
        let Some(library) = self.library.as_ref() else {
            return Ok(());
        };
        let ret = library.set_aic_param(param);
        if ret != 0 {
            return Err(Error::Unknown(format!(
                "custom AIC setAicParam returned {}",
                ret
            )));
        }
        Ok(())
    }

    fn run(&mut self, result: &mut AiqResult) -> Result<(), Error> {
        let Some(library) = self.library.as_ref() else {
            return Ok(());
        };

        let ae = result.ae_results.to_ffi();
        let awb = result.awb_results.to_ffi();
        let mut controls = vec![0f32; MAX_CUSTOM_CONTROLS_PARAM_SIZE];
        let (ret, count, pipe) = library.run_external_aic(&ae, &awb, &mut controls);
        if ret != 0 {
            return Err(Error::Unknown(format!(
                "custom AIC runExternalAic returned {}",
                ret
            )));
        }

        controls.truncate(count);
        result.custom_controls.parameters = controls;
        result.custom_aic_pipe = CustomAicPipe::from(pipe);
        log::trace!(
            "sequence {}: {} custom controls, pipe {:?}",
            result.sequence,
            count,
            result.custom_aic_pipe
        );
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), Error> {
        let Some(library) = self.library.take() else {
            self.state = AicState::NotInit;
            return Ok(());
        };

        let ret = library.deinit();
        if ret != 0 {
            log::error!("custom AIC deinit failed: {}", ret);
        }
        drop(library);
        self.state = AicState::NotInit;
        Ok(())
    }
}

impl Drop for CustomizedAic {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            library.deinit();
        }
    }
}

/// Parameter generator configured for `camera_id`: the plugin when a Custom
/// AIC library is named, the built-in path otherwise.
pub fn parameter_generator(
    config: &PlatformConfig,
    camera_id: i32,
) -> Result<Box<dyn ParameterGenerator>, Error> {
    let camera = config.camera(camera_id)?;
    if camera.custom_aic_library_name.is_empty() {
        return Ok(Box::new(BuiltinAic));
    }
    Ok(Box::new(CustomizedAic::new(
        camera_id,
        &camera.custom_aic_library_name,
    )))
}
