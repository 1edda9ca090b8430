// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Raw ABI of the Custom AIC plugin interface.
//!
//! A plugin is a shared library exporting a data symbol named `CAMI` which
//! points at a [`CustomAicModule`] table of entry points. The layout of every
//! type in this crate is part of that ABI and mirrors `include/custom_aic.h`.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

// Re-export libloading for error handling
pub use libloading;

use std::{
    ffi::{c_float, c_int, c_void},
    fmt,
    path::{Path, PathBuf},
};

/// Symbol name of the module table, NUL terminated for `dlsym`.
pub const CUSTOM_AIC_MODULE_SYMBOL: &[u8] = b"CAMI\0";

/// Directory searched for `<name>.so` plugins.
pub const CUSTOM_AIC_DEFAULT_DIR: &str = "/usr/lib";

/// Environment variable overriding [`CUSTOM_AIC_DEFAULT_DIR`].
pub const CUSTOM_AIC_DIR_ENV: &str = "IPUHAL_CUSTOM_AIC_DIR";

pub const MAX_EXPOSURES_NUM: usize = 3;

pub type CustomAicPipe = c_int;
pub const CUSTOM_AIC_PIPE_NONE: CustomAicPipe = 0;
pub const CUSTOM_AIC_PIPE_ULL: CustomAicPipe = 1;
pub const CUSTOM_AIC_PIPE_HDR: CustomAicPipe = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CustomAicParam {
    pub data: *mut c_void,
    pub length: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ia_aiq_exposure {
    pub exposure_time_us: c_int,
    pub analog_gain: c_float,
    pub digital_gain: c_float,
    pub total_target_exposure: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ia_aiq_ae_results {
    pub num_exposures: u32,
    pub exposures: [ia_aiq_exposure; MAX_EXPOSURES_NUM],
    pub converged: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ia_aiq_awb_results {
    pub accurate_r_per_g: c_float,
    pub accurate_b_per_g: c_float,
    pub final_r_per_g: c_float,
    pub final_b_per_g: c_float,
    pub cct_estimate: u32,
    pub distance_from_convergence: c_float,
}

/// Output buffer for custom controls. `parameters` is owned by the caller and
/// holds `capacity` entries; the plugin writes `count <= capacity` of them.
#[repr(C)]
#[derive(Debug)]
pub struct ia_isp_custom_controls {
    pub count: c_int,
    pub capacity: c_int,
    pub parameters: *mut c_float,
}

pub type CustomAicInitFn = unsafe extern "C" fn() -> c_int;
pub type CustomAicDeinitFn = unsafe extern "C" fn() -> c_int;
pub type CustomAicSetParamFn = unsafe extern "C" fn(param: *const CustomAicParam) -> c_int;
pub type CustomAicRunFn = unsafe extern "C" fn(
    ae_results: *const ia_aiq_ae_results,
    awb_results: *const ia_aiq_awb_results,
    custom_controls: *mut ia_isp_custom_controls,
    pipe: *mut CustomAicPipe,
) -> c_int;

/// The `CAMI` module table exported by a plugin.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CustomAicModule {
    pub customAicModuleVersion: c_int,
    pub init: Option<CustomAicInitFn>,
    pub deinit: Option<CustomAicDeinitFn>,
    pub setAicParam: Option<CustomAicSetParamFn>,
    pub runExternalAic: Option<CustomAicRunFn>,
}

/// Errors raised while binding a plugin.
#[derive(Debug)]
pub enum PluginError {
    /// dlopen or dlsym failed
    Load(libloading::Error),
    /// the `CAMI` symbol resolved to a null pointer
    NullModule,
    /// a required entry point in the module table is null
    MissingEntry(&'static str),
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PluginError::Load(err) => write!(f, "plugin could not be loaded: {}", err),
            PluginError::NullModule => write!(f, "plugin module table is null"),
            PluginError::MissingEntry(name) => {
                write!(f, "plugin module table lacks entry point {}", name)
            }
        }
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PluginError::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<libloading::Error> for PluginError {
    fn from(err: libloading::Error) -> Self {
        PluginError::Load(err)
    }
}

/// Resolve the on-disk location of the plugin called `name`.
///
/// The directory defaults to `/usr/lib` and can be replaced through the
/// `IPUHAL_CUSTOM_AIC_DIR` environment variable.
pub fn custom_aic_library_path(name: &str) -> PathBuf {
    let dir = std::env::var(CUSTOM_AIC_DIR_ENV)
        .ok()
        .unwrap_or_else(|| CUSTOM_AIC_DEFAULT_DIR.to_string());

    Path::new(&dir).join(format!("{}.so", name))
}

/// A loaded plugin. The library stays mapped for as long as this value lives.
pub struct CustomAicLibrary {
    module: CustomAicModule,
    path: PathBuf,
    _library: libloading::Library,
}

impl CustomAicLibrary {
    /// Open `path` with `RTLD_NOW | RTLD_LOCAL` and bind its `CAMI` table.
    ///
    /// Loading a library runs its initializers, so the caller vouches for the
    /// library at `path`.
    pub unsafe fn open(path: &Path) -> Result<Self, PluginError> {
        use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};

        let library: libloading::Library =
            unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL)? }.into();

        let ptr: *const CustomAicModule = unsafe {
            let symbol: libloading::Symbol<*const CustomAicModule> =
                library.get(CUSTOM_AIC_MODULE_SYMBOL)?;
            *symbol
        };
        if ptr.is_null() {
            return Err(PluginError::NullModule);
        }

        let module = unsafe { *ptr };
        if module.init.is_none() {
            return Err(PluginError::MissingEntry("init"));
        }
        if module.deinit.is_none() {
            return Err(PluginError::MissingEntry("deinit"));
        }
        if module.setAicParam.is_none() {
            return Err(PluginError::MissingEntry("setAicParam"));
        }
        if module.runExternalAic.is_none() {
            return Err(PluginError::MissingEntry("runExternalAic"));
        }

        log::debug!(
            "bound custom AIC module version {} from {}",
            module.customAicModuleVersion,
            path.display()
        );

        Ok(CustomAicLibrary {
            module,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn version(&self) -> i32 {
        self.module.customAicModuleVersion
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn init(&self) -> c_int {
        match self.module.init {
            Some(init) => unsafe { init() },
            None => -1,
        }
    }

    pub fn deinit(&self) -> c_int {
        match self.module.deinit {
            Some(deinit) => unsafe { deinit() },
            None => -1,
        }
    }

    /// Hand an opaque parameter blob to the plugin. The plugin must not keep
    /// the pointer past the call.
    pub fn set_aic_param(&self, data: &[u8]) -> c_int {
        let length = match c_int::try_from(data.len()) {
            Ok(len) => len,
            Err(_) => return -1,
        };
        let param = CustomAicParam {
            data: data.as_ptr() as *mut c_void,
            length,
        };
        match self.module.setAicParam {
            Some(set_param) => unsafe { set_param(&param) },
            None => -1,
        }
    }

    /// Run the external AIC. `controls` receives the custom control values and
    /// its length is the capacity offered to the plugin. Returns the plugin
    /// status, the number of controls written and the selected pipe.
    pub fn run_external_aic(
        &self,
        ae_results: &ia_aiq_ae_results,
        awb_results: &ia_aiq_awb_results,
        controls: &mut [f32],
    ) -> (c_int, usize, CustomAicPipe) {
        let capacity = c_int::try_from(controls.len()).unwrap_or(c_int::MAX);
        let mut custom_controls = ia_isp_custom_controls {
            count: 0,
            capacity,
            parameters: controls.as_mut_ptr(),
        };
        let mut pipe: CustomAicPipe = CUSTOM_AIC_PIPE_NONE;

        let ret = match self.module.runExternalAic {
            Some(run) => unsafe { run(ae_results, awb_results, &mut custom_controls, &mut pipe) },
            None => -1,
        };

        let count = usize::try_from(custom_controls.count)
            .unwrap_or(0)
            .min(controls.len());
        (ret, count, pipe)
    }
}

impl fmt::Debug for CustomAicLibrary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CustomAicLibrary")
            .field("path", &self.path)
            .field("version", &self.module.customAicModuleVersion)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_library_path_default() {
        std::env::remove_var(CUSTOM_AIC_DIR_ENV);
        assert_eq!(
            custom_aic_library_path("libcustom_aic"),
            PathBuf::from("/usr/lib/libcustom_aic.so")
        );
    }

    #[test]
    #[serial]
    fn test_library_path_override() {
        std::env::set_var(CUSTOM_AIC_DIR_ENV, "/opt/camera/plugins");
        let path = custom_aic_library_path("aic_vendor");
        std::env::remove_var(CUSTOM_AIC_DIR_ENV);
        assert_eq!(path, PathBuf::from("/opt/camera/plugins/aic_vendor.so"));
    }

    #[test]
    fn test_open_missing_library() {
        let path = Path::new("/nonexistent/ipuhal/libmissing.so");
        let res = unsafe { CustomAicLibrary::open(path) };
        assert!(matches!(res, Err(PluginError::Load(_))));
    }

    #[test]
    fn test_module_layout() {
        // version int followed by four pointer-sized entries
        let ptr = std::mem::size_of::<usize>();
        assert_eq!(
            std::mem::size_of::<CustomAicModule>(),
            ptr + 4 * ptr
        );
    }
}
