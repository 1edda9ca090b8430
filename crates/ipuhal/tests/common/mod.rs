// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! In-memory stand-ins for the vendor libraries, shared by the integration
//! tests.

#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use ipuhal::{
    aiq::{
        AeResults, AfGrid, AiqResult, Exposure, HdrRgbsGrid, HdrYvGrid, MotionVector, RgbsGrid,
        SaResults,
    },
    config::{ConfigMode, OperationMode, PlatformConfig, TuningMode},
    fourcc::NV12,
    graph::{GraphConfig, GraphConfigManager, RunKernel, SettingsDatabase},
    isp::{
        AdaptationInit, BitCompression, BitCompressionResults, DolMode, FragmentDesc,
        HdrAwbConversion, InputParams, IspAdaptation, ProcessGroupCodec, QueryResults,
        VendorLibrary,
    },
    stream::{Resolution, Stream, StreamUsage},
    Error,
};

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn platform() -> Arc<PlatformConfig> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(PlatformConfig::from_file(data_path("platform.json")).unwrap())
}

pub fn database() -> Arc<SettingsDatabase> {
    Arc::new(SettingsDatabase::from_file(data_path("graph_settings.json")).unwrap())
}

pub fn video_stream(id: i32, width: u32, height: u32) -> Stream {
    Stream::new(id, width, height, NV12, StreamUsage::Preview)
}

/// Graph config of camera 0 for a single stream.
pub fn graph_config(
    config: &Arc<PlatformConfig>,
    stream: Stream,
    operation_mode: OperationMode,
) -> Arc<GraphConfig> {
    let mut manager = GraphConfigManager::new(config.clone(), 0, database());
    manager.config_streams(&[stream], operation_mode).unwrap();
    let mode = if operation_mode == ConfigMode::Auto {
        ConfigMode::Normal
    } else {
        operation_mode
    };
    manager.get_graph_config(mode).unwrap()
}

/// A 3A result the adaptation accepts: flat shading, one exposure.
pub fn aiq_result(sequence: i64, digital_gain: f32) -> AiqResult {
    let mut result = AiqResult::new(sequence);
    result.sa_results = SaResults {
        lsc_update: false,
        ..SaResults::flat()
    };
    result.ae_results = AeResults {
        exposures: vec![Exposure {
            exposure_time_us: 10_000,
            analog_gain: 2.0,
            digital_gain,
            total_target_exposure: 20_000,
        }],
        converged: true,
        weight_grid: vec![1; 16],
    };
    result
}

/// What one adaptation run received.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub lsc_update: bool,
    pub with_ae: bool,
    pub kernels: Vec<RunKernel>,
    pub manual_digital_gain: Option<f32>,
    pub ltm_sequence: Option<i64>,
    pub custom_controls: usize,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub adaptation_inits: AtomicUsize,
    pub bcomp_inits: AtomicUsize,
    pub codec_inits: AtomicUsize,
    pub statistics_queries: AtomicUsize,
    pub runs: Mutex<Vec<RunRecord>>,
    pub encoded: Mutex<Vec<(usize, bool)>>,
    pub dol_modes: Mutex<Vec<(DolMode, f32)>>,
    pub fragments: Mutex<Vec<FragmentDesc>>,
}

impl FakeState {
    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn last_run(&self) -> RunRecord {
        self.runs.lock().unwrap().last().cloned().unwrap()
    }
}

/// Terminal of the fake codec: payload size and direction.
#[derive(Debug, Clone, Copy)]
pub struct FakeTerminal {
    pub size: usize,
    pub input: bool,
    pub uid: u32,
}

#[derive(Clone)]
pub struct FakeVendor {
    pub state: Arc<FakeState>,
    pub query: QueryResults,
    pub terminals: Vec<FakeTerminal>,
    pub grid: (u16, u16),
    pub fail_runs: bool,
}

pub const FAKE_PG_SIZE: usize = 512;

impl Default for FakeVendor {
    fn default() -> Self {
        FakeVendor {
            state: Arc::new(FakeState::default()),
            query: QueryResults {
                rgbs_grid: true,
                af_grid: true,
                ..Default::default()
            },
            terminals: vec![
                FakeTerminal { size: 100, input: true, uid: 0x10 },
                FakeTerminal { size: 5000, input: true, uid: 0x11 },
                FakeTerminal { size: 0, input: false, uid: 0x12 },
                FakeTerminal { size: 4097, input: false, uid: 0x1a },
                FakeTerminal { size: 4096, input: true, uid: 0x13 },
                FakeTerminal { size: 300, input: false, uid: 0x1b },
            ],
            grid: (16, 12),
            fail_runs: false,
        }
    }
}

impl VendorLibrary for FakeVendor {
    fn init_adaptation(&self, init: &AdaptationInit) -> Result<Box<dyn IspAdaptation>, Error> {
        assert_eq!(init.max_stats_width, 80);
        assert_eq!(init.max_stats_height, 60);
        self.state.adaptation_inits.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAdaptation {
            vendor: self.clone(),
        }))
    }

    fn init_bit_compression(
        &self,
        _tuning_mode: TuningMode,
        dol_mode: DolMode,
        conversion_gain_ratio: f32,
    ) -> Result<Box<dyn BitCompression>, Error> {
        self.state.bcomp_inits.fetch_add(1, Ordering::SeqCst);
        self.state
            .dol_modes
            .lock()
            .unwrap()
            .push((dol_mode, conversion_gain_ratio));
        Ok(Box::new(FakeBitCompression))
    }

    fn init_codec(
        &self,
        parameters: &[u8],
        fragments: &[FragmentDesc],
    ) -> Result<Box<dyn ProcessGroupCodec>, Error> {
        assert!(!parameters.is_empty());
        self.state.codec_inits.fetch_add(1, Ordering::SeqCst);
        self.state
            .fragments
            .lock()
            .unwrap()
            .extend_from_slice(fragments);
        Ok(Box::new(FakeCodec {
            state: self.state.clone(),
            terminals: self.terminals.clone(),
            parameters_set: false,
        }))
    }

    fn output_size(&self, program_group: &ipuhal::graph::ProgramGroup) -> usize {
        64 + 16 * program_group.kernel_count()
    }
}

pub struct FakeAdaptation {
    vendor: FakeVendor,
}

impl IspAdaptation for FakeAdaptation {
    fn run(&mut self, params: &InputParams<'_>, output: &mut [u8]) -> Result<usize, Error> {
        if self.vendor.fail_runs {
            return Err(Error::Unknown("fake adaptation failure".to_string()));
        }
        let lsc_update = params.sa_results.map(|sa| sa.lsc_update).unwrap_or(false);
        self.vendor.state.runs.lock().unwrap().push(RunRecord {
            lsc_update,
            with_ae: params.ae_results.is_some(),
            kernels: params.program_group.kernels.clone(),
            manual_digital_gain: params.manual_digital_gain,
            ltm_sequence: params.ltm_results.map(|ltm| ltm.sequence),
            custom_controls: params.custom_controls.map(|c| c.count()).unwrap_or(0),
        });
        output.iter_mut().for_each(|byte| *byte = 0x5a);
        Ok(output.len())
    }

    fn statistics_query(&self, _stats: &[u8]) -> Result<QueryResults, Error> {
        self.vendor
            .state
            .statistics_queries
            .fetch_add(1, Ordering::SeqCst);
        Ok(self.vendor.query)
    }

    fn convert_dvs(&self, _stats: &[u8], resolution: Resolution) -> Result<Vec<MotionVector>, Error> {
        Ok(vec![
            MotionVector {
                x: resolution.width as f32 / 2.0,
                y: resolution.height as f32 / 2.0,
                dx: 1.0,
                dy: -1.0,
            };
            4
        ])
    }

    fn convert_hdr_yv(&self, _stats: &[u8]) -> Result<HdrYvGrid, Error> {
        Ok(HdrYvGrid {
            width: 8,
            height: 6,
            y_avg: vec![100; 48],
            v_max: vec![200; 48],
        })
    }

    fn convert_awb(
        &self,
        _stats: &[u8],
        _ae_results: Option<&AeResults>,
        _bcomp: Option<&BitCompressionResults>,
    ) -> Result<Vec<RgbsGrid>, Error> {
        Ok(vec![self.rgbs_grid(); 3])
    }

    fn convert_awb_hdr(
        &self,
        _stats: &[u8],
        conversion: &HdrAwbConversion<'_>,
    ) -> Result<(Vec<RgbsGrid>, HdrRgbsGrid), Error> {
        let exposures = match conversion {
            HdrAwbConversion::FixedExposureInfo { info, .. } => info.num_exposures as usize,
            HdrAwbConversion::BitDepth { ae_results, .. } => ae_results.exposures.len(),
        };
        let (width, height) = self.vendor.grid;
        Ok((
            vec![self.rgbs_grid(); exposures.max(1)],
            HdrRgbsGrid {
                width,
                height,
                blocks: Vec::new(),
            },
        ))
    }

    fn convert_af(&self, _stats: &[u8]) -> Result<AfGrid, Error> {
        Ok(AfGrid {
            width: 8,
            height: 8,
            block_width: 4,
            block_height: 4,
            ..Default::default()
        })
    }
}

impl FakeAdaptation {
    fn rgbs_grid(&self) -> RgbsGrid {
        let (width, height) = self.vendor.grid;
        RgbsGrid {
            width,
            height,
            blocks: Vec::new(),
        }
    }
}

pub struct FakeBitCompression;

impl BitCompression for FakeBitCompression {
    fn run(&mut self, ae_results: &AeResults) -> Result<BitCompressionResults, Error> {
        Ok(BitCompressionResults {
            lut: vec![0; 16],
            ratio: ae_results.exposures.len() as f32,
        })
    }
}

pub struct FakeCodec {
    state: Arc<FakeState>,
    terminals: Vec<FakeTerminal>,
    parameters_set: bool,
}

impl ProcessGroupCodec for FakeCodec {
    fn process_group_size(&self) -> usize {
        FAKE_PG_SIZE
    }

    fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    fn terminal_payload_size(&self, terminal: usize) -> usize {
        self.terminals[terminal].size
    }

    fn is_input_terminal(&self, terminal: usize) -> bool {
        self.terminals[terminal].input
    }

    fn terminal_by_uid(&self, uid: u32) -> Result<usize, Error> {
        self.terminals
            .iter()
            .position(|t| t.uid == uid)
            .ok_or_else(|| Error::BadValue(format!("no terminal {:#x}", uid)))
    }

    fn set_parameters(&mut self, parameters: &[u8]) -> Result<(), Error> {
        self.parameters_set = !parameters.is_empty();
        Ok(())
    }

    fn create_process_group(&mut self, pg: &mut [u8]) -> Result<(), Error> {
        if !self.parameters_set || pg.len() < FAKE_PG_SIZE {
            return Err(Error::BadValue("process group".to_string()));
        }
        pg[0] = 0xc0;
        Ok(())
    }

    fn encode_terminal_payload(
        &mut self,
        _pg: &mut [u8],
        terminal: usize,
        payload: Option<&mut [u8]>,
        _offset: usize,
    ) -> Result<(), Error> {
        let has_payload = payload.is_some();
        if let Some(payload) = payload {
            assert_eq!(payload.len(), self.terminals[terminal].size);
            payload.iter_mut().for_each(|byte| *byte = terminal as u8 + 1);
        }
        self.state
            .encoded
            .lock()
            .unwrap()
            .push((terminal, has_payload));
        Ok(())
    }

    fn decode_terminal_payload(
        &self,
        _pg: &[u8],
        terminal: usize,
        payload: &[u8],
    ) -> Result<Vec<u8>, Error> {
        assert_eq!(payload.len(), self.terminals[terminal].size);
        Ok(payload.to_vec())
    }
}
