// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{
    collections::BTreeMap,
    fmt, fs,
    io::Read,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{
    parameters::{ParameterPool, SequenceHistory, TerminalLayout},
    settings::IspSettings,
    vendor::{
        hdr_exposure_info, isys_kernel, AdaptationInit, BitCompression, BitCompressionResults,
        DolMode, FragmentDesc, HdrAwbConversion, HdrCompression, InputParams, IspAdaptation,
        ProcessGroupCodec, VendorLibrary, ViewConfig, MAX_STATISTICS_HEIGHT, MAX_STATISTICS_WIDTH,
    },
};
use crate::{
    aiq::{
        AeResults, AfGrid, AiqResult, AiqStatistics, ColorGains, DvsStatistics, HdrRgbsGrid,
        LtmStatistics, ResultStore, RgbsGrid, SaResults,
    },
    buffer::{BufferUsage, CameraBuffer},
    config::{
        CameraConfig, ConfigMode, DvsType, HdrGainType, PlatformConfig, SensorFrameParams,
        TuningMode,
    },
    graph::{uuid, GraphConfig, ProgramGroup},
    stream::Resolution,
    Error,
};

/// Log target gating the kernel toggle files.
pub const KERNEL_TOGGLE_TARGET: &str = "ipuhal::kernel_toggle";

const KERNEL_TOGGLE_MAX_LENGTH: usize = 1024;

/// Role of the adaptor, which decides the streams it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgParamType {
    Video,
    /// Full processing pipeline, every stream id of the graph.
    PsysIsa,
    /// Input system only, stream id 0, encoded through the P2P codec.
    Isys,
    Still4k,
    Still8m,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptorState {
    NotInit,
    Init,
    Configured,
}

impl fmt::Display for AdaptorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AdaptorState::NotInit => "not-init",
            AdaptorState::Init => "init",
            AdaptorState::Configured => "configured",
        };
        f.write_str(name)
    }
}

/// Which terminals of the ISA buffer to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeBufferType {
    /// Input terminals, with payloads written to plane 1.
    IsaConfig,
    /// Output terminals, whose payloads the hardware places.
    Stats,
}

struct Inner {
    state: AdaptorState,
    tuning_mode: TuningMode,
    adaptation: Option<Box<dyn IspAdaptation>>,
    bcomp: Option<Box<dyn BitCompression>>,
    bcomp_results: Option<BitCompressionResults>,
    codec: Option<Box<dyn ProcessGroupCodec>>,
    program_groups: BTreeMap<i32, ProgramGroup>,
    output_sizes: BTreeMap<i32, usize>,
    pool: ParameterPool,
    history: SequenceHistory,
    current: Arc<[u8]>,
    frame_params: SensorFrameParams,
    layout: TerminalLayout,
    dvs_resolution: Resolution,
}

impl Inner {
    fn new() -> Self {
        Inner {
            state: AdaptorState::NotInit,
            tuning_mode: TuningMode::default(),
            adaptation: None,
            bcomp: None,
            bcomp_results: None,
            codec: None,
            program_groups: BTreeMap::new(),
            output_sizes: BTreeMap::new(),
            pool: ParameterPool::new(),
            history: SequenceHistory::default(),
            current: Arc::<[u8]>::from(Vec::new()),
            frame_params: SensorFrameParams::default(),
            layout: TerminalLayout::default(),
            dvs_resolution: Resolution::default(),
        }
    }

    fn deinit_handles(&mut self) {
        self.adaptation = None;
        self.bcomp = None;
        self.bcomp_results = None;
    }

    fn adaptation(&self) -> Result<&dyn IspAdaptation, Error> {
        self.adaptation
            .as_deref()
            .ok_or_else(|| Error::NoInit("ISP adaptation handle".to_string()))
    }
}

/// Translates 3A results into per-frame ISP parameter blobs and decodes the
/// statistics the hardware returns.
///
/// Every entry point takes the same lock, so configuration and per-frame
/// calls on one adaptor never overlap. The [`ResultStore`] is shared with the
/// 3A producer and keeps its own lock.
pub struct IspParamAdaptor {
    camera_id: i32,
    pg_param_type: PgParamType,
    config: Arc<PlatformConfig>,
    store: Arc<ResultStore>,
    vendor: Arc<dyn VendorLibrary>,
    inner: Mutex<Inner>,
}

impl IspParamAdaptor {
    pub fn new(
        camera_id: i32,
        pg_param_type: PgParamType,
        config: Arc<PlatformConfig>,
        store: Arc<ResultStore>,
        vendor: Arc<dyn VendorLibrary>,
    ) -> Self {
        log::debug!(
            "ISP param adaptor created for camera {} type {:?}",
            camera_id,
            pg_param_type
        );
        IspParamAdaptor {
            camera_id,
            pg_param_type,
            config,
            store,
            vendor,
            inner: Mutex::new(Inner::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn camera_id(&self) -> i32 {
        self.camera_id
    }

    pub fn pg_param_type(&self) -> PgParamType {
        self.pg_param_type
    }

    pub fn state(&self) -> AdaptorState {
        self.lock().state
    }

    pub fn init(&self) -> Result<(), Error> {
        self.lock().state = AdaptorState::Init;
        Ok(())
    }

    pub fn deinit(&self) -> Result<(), Error> {
        log::debug!(
            "ISP param adaptor de-initialized for camera {} type {:?}",
            self.camera_id,
            self.pg_param_type
        );
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.codec = None;
        inner.deinit_handles();
        inner.program_groups.clear();
        inner.output_sizes.clear();
        inner.pool.release();
        inner.history.clear();
        inner.layout = TerminalLayout::default();
        inner.frame_params = SensorFrameParams::default();
        inner.current = Arc::<[u8]>::from(Vec::new());
        inner.dvs_resolution = Resolution::default();
        inner.state = AdaptorState::NotInit;
        Ok(())
    }

    /// Prepare the adaptor for a new stream configuration.
    ///
    /// `graph_config` is the prepared graph of `config_mode`; without one no
    /// program group is adapted. On success the adaptor is configured and
    /// has produced one baseline blob per stream id.
    pub fn configure(
        &self,
        stream: Resolution,
        config_mode: ConfigMode,
        tuning_mode: TuningMode,
        graph_config: Option<&GraphConfig>,
    ) -> Result<(), Error> {
        let camera = self.config.camera(self.camera_id)?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state == AdaptorState::NotInit {
            return Err(Error::InvalidOperation(
                "ISP adaptor configured before init".to_string(),
            ));
        }
        inner.state = AdaptorState::Init;
        inner.tuning_mode = tuning_mode;
        inner.history.clear();

        inner.deinit_handles();
        self.init_adapt_handle(inner, camera, config_mode, tuning_mode, graph_config)
            .map_err(|err| {
                log::error!("init ISP adaptation handle failed: {}", err);
                err
            })?;

        inner.frame_params = camera.frame_params;
        log::debug!("sensor frame params {:?}", inner.frame_params);

        // Run once without 3A results to build the baseline tables.
        let flat_shading = SaResults::flat();
        inner.pool.rewind();
        for stream_id in inner.pool.slot(0).stream_ids() {
            let blob = self.run_cold(inner, stream_id, &flat_shading)?;
            inner.pool.store(0, stream_id, blob.clone());
            inner.current = blob;
        }

        self.post_configure(inner, stream.width, stream.height)
    }

    fn init_adapt_handle(
        &self,
        inner: &mut Inner,
        camera: &CameraConfig,
        config_mode: ConfigMode,
        tuning_mode: TuningMode,
        graph_config: Option<&GraphConfig>,
    ) -> Result<(), Error> {
        if !camera.enable_aiq {
            return Ok(());
        }

        let stats_num = if tuning_mode.is_hdr_pipe() {
            camera.hdr_exposure_num
        } else {
            camera.exposure_num
        };
        let adaptation = self
            .vendor
            .init_adaptation(&AdaptationInit {
                tuning_mode,
                max_stats_width: MAX_STATISTICS_WIDTH,
                max_stats_height: MAX_STATISTICS_HEIGHT,
                stats_num,
            })
            .map_err(|err| Error::NoInit(format!("ISP adaptor failed to initialize: {}", err)))?;
        inner.adaptation = Some(adaptation);

        if camera.dol_short_enabled || camera.dol_medium_enabled {
            let (dol_mode, conversion_gain_ratio) = dol_settings(graph_config);
            log::debug!(
                "conversion gain ratio {}, dol mode {:?}",
                conversion_gain_ratio,
                dol_mode
            );
            let bcomp = self
                .vendor
                .init_bit_compression(tuning_mode, dol_mode, conversion_gain_ratio)
                .map_err(|err| {
                    Error::NoInit(format!("bit compression failed to initialize: {}", err))
                })?;
            inner.bcomp = Some(bcomp);
        }

        if let Some(graph_config) = graph_config {
            self.init_program_groups(inner, camera, config_mode, graph_config)?;
            inner.pool.allocate(&inner.output_sizes);
        }
        log::debug!(
            "ISP adaptation initialized for camera {} ({} stream(s))",
            self.camera_id,
            inner.program_groups.len()
        );
        Ok(())
    }

    fn init_program_groups(
        &self,
        inner: &mut Inner,
        camera: &CameraConfig,
        config_mode: ConfigMode,
        graph_config: &GraphConfig,
    ) -> Result<(), Error> {
        inner.program_groups.clear();
        inner.output_sizes.clear();

        let stream_ids = if self.pg_param_type == PgParamType::Isys {
            vec![0]
        } else {
            graph_config.graph_get_stream_ids().map_err(|err| {
                Error::Unknown(format!("failed to get the program group stream ids: {}", err))
            })?
        };

        // The sensor config may pin the stream id of the first kernel.
        let pinned_stream_id = camera.stream_id_by_config_mode(config_mode);
        for stream_id in stream_ids {
            let mut group = graph_config.get_program_group(stream_id);
            if pinned_stream_id != -1 {
                if let Some(first) = group.kernels.first_mut() {
                    first.stream_id = pinned_stream_id;
                }
            }
            let size = self.vendor.output_size(&group);
            log::debug!(
                "stream {}: {} kernel(s), parameter size {}",
                stream_id,
                group.kernel_count(),
                size
            );
            inner.output_sizes.insert(stream_id, size);
            inner.program_groups.insert(stream_id, group);
        }
        Ok(())
    }

    fn run_cold(
        &self,
        inner: &mut Inner,
        stream_id: i32,
        flat_shading: &SaResults,
    ) -> Result<Arc<[u8]>, Error> {
        let group = inner
            .program_groups
            .get(&stream_id)
            .ok_or_else(|| Error::Unknown(format!("no program group for stream {}", stream_id)))?;
        let mut params = InputParams::new(group, inner.frame_params);
        params.sa_results = Some(flat_shading);
        if self.pg_param_type == PgParamType::PsysIsa {
            params = params.with_psys_isa_defaults();
        }

        let size = inner.output_sizes.get(&stream_id).copied().unwrap_or(0);
        let adaptation = inner
            .adaptation
            .as_mut()
            .ok_or_else(|| Error::NoInit("ISP adaptation handle".to_string()))?;
        let mut blob = vec![0u8; size];
        let used = adaptation.run(&params, &mut blob).map_err(|err| {
            Error::Unknown(format!("ISP parameter adaptation has failed: {}", err))
        })?;
        blob.truncate(used);
        Ok(Arc::from(blob))
    }

    fn post_configure(&self, inner: &mut Inner, width: u32, height: u32) -> Result<(), Error> {
        // The full pipeline encodes its own process groups.
        if self.pg_param_type == PgParamType::PsysIsa {
            inner.state = AdaptorState::Configured;
            return Ok(());
        }

        inner.codec = None;
        log::debug!("fragment {}x{}", width, height);
        let codec = self
            .vendor
            .init_codec(&inner.current, &[FragmentDesc { width, height }])
            .map_err(|err| Error::NoInit(format!("P2P wrapper failed to initialize: {}", err)))?;
        let layout = TerminalLayout::query(codec.as_ref()).map_err(|err| {
            Error::NoInit(format!(
                "failed to query the process group memory requirements: {}",
                err
            ))
        })?;

        inner.codec = Some(codec);
        inner.layout = layout;
        inner.state = AdaptorState::Configured;
        Ok(())
    }

    /// Adapt the 3A result of `sequence` for every stream.
    ///
    /// A sequence that already holds a parameter slot is updated in place.
    /// Any other sequence takes the next slot and forces the lens shading
    /// table to be rebuilt.
    pub fn run_isp_adapt(&self, settings: Option<&IspSettings>, sequence: i64) -> Result<(), Error> {
        let camera = self.config.camera(self.camera_id)?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != AdaptorState::Configured {
            return Err(Error::InvalidOperation(format!(
                "run ISP adaptation in state {}",
                inner.state
            )));
        }

        // Checked before a slot is taken, also when no stream needs parameters.
        let aiq = self.aiq_result_for(sequence)?;

        let slot = inner.pool.acquire(sequence);
        if slot.refresh {
            inner.history.push(sequence);
        }
        log::trace!(
            "cursor {}, slot {} for sequence {}",
            inner.pool.cursor(),
            slot.index,
            sequence
        );

        for stream_id in inner.pool.slot(slot.index).stream_ids() {
            let blob = self
                .run_adaptation(inner, camera, &aiq, stream_id, settings, sequence, slot.refresh)
                .map_err(|err| {
                    log::error!(
                        "ISP adaptation for stream {} sequence {} failed: {}",
                        stream_id,
                        sequence,
                        err
                    );
                    err
                })?;
            inner.pool.store(slot.index, stream_id, blob.clone());
            inner.current = blob;
        }
        Ok(())
    }

    /// 3A result of `sequence`, or the latest one when that frame has none.
    fn aiq_result_for(&self, sequence: i64) -> Result<Arc<AiqResult>, Error> {
        if let Some(result) = self.store.aiq_result(sequence) {
            return Ok(result);
        }
        log::warn!("no aiq result for sequence {}, using the latest", sequence);
        self.store
            .latest_aiq_result()
            .ok_or_else(|| Error::InvalidOperation("no aiq result available".to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_adaptation(
        &self,
        inner: &mut Inner,
        camera: &CameraConfig,
        aiq: &AiqResult,
        stream_id: i32,
        settings: Option<&IspSettings>,
        sequence: i64,
        force_update: bool,
    ) -> Result<Arc<[u8]>, Error> {
        if aiq.sa_results.area() == 0 {
            return Err(Error::InvalidOperation(
                "aiq result carries no shading table".to_string(),
            ));
        }

        let ltm = if camera.enable_hdr && inner.tuning_mode.is_hdr_pipe() {
            let ltm_sequence = inner.history.lagged(sequence, camera.ltm_gain_lag);
            let ltm = self.store.ltm_result(ltm_sequence).or_else(|| {
                log::warn!("no ltm result for sequence {}, using the latest", ltm_sequence);
                self.store.latest_ltm_result()
            });
            if let Some(ltm) = &ltm {
                log::trace!(
                    "frame {}, ltm sequence {}, actual {}",
                    sequence,
                    ltm_sequence,
                    ltm.sequence
                );
            }
            ltm
        } else {
            None
        };

        let mut group = inner.program_groups.get(&stream_id).cloned().unwrap_or_default();
        if self.pg_param_type == PgParamType::PsysIsa {
            update_kernel_metadata(&mut group, aiq);
        }
        apply_kernel_toggles(&mut group, camera);

        if let Some(bcomp) = inner.bcomp.as_mut() {
            let results = bcomp.run(&aiq.ae_results).map_err(|err| {
                Error::Unknown(format!("bit compression run failed: {}", err))
            })?;
            inner.bcomp_results = Some(results);
        }

        let dvs_result = match settings {
            Some(settings) if settings.video_stabilization => self.store.dvs_result(),
            _ => None,
        };
        let mut shading = aiq.sa_results.clone();
        if force_update {
            shading.lsc_update = true;
        }

        let mut params = InputParams::new(&group, inner.frame_params);
        params.ae_results = Some(&aiq.ae_results);
        params.gbce_results = Some(&aiq.gbce_results);
        params.awb_results = Some(&aiq.awb_results);
        params.pa_results = Some(&aiq.pa_results);
        params.sa_results = Some(&shading);
        params.weight_grid = &aiq.ae_results.weight_grid;
        params.ltm_results = ltm.as_deref();
        params.bcomp_results = inner.bcomp_results.as_ref();
        if aiq.custom_controls.count() > 0 {
            params.custom_controls = Some(&aiq.custom_controls);
        }

        if let Some(settings) = settings {
            params.nr_setting = settings.nr_setting;
            params.ee_setting = settings.ee_setting;
            params.effects = settings.effects;
            params.manual = settings.manual_settings;
            log::trace!(
                "NR {:?}/{}, EE {:?}/{}",
                settings.nr_setting.feature_level,
                settings.nr_setting.strength,
                settings.ee_setting.feature_level,
                settings.ee_setting.strength
            );

            if settings.video_stabilization {
                log::trace!("video stabilization on, dvs type {:?}", camera.dvs_type);
                match camera.dvs_type {
                    DvsType::MorphTable => {
                        params.dvs_morph_table = dvs_result.as_deref().map(|r| &r.morph_table)
                    }
                    DvsType::ImageTransform => {
                        params.gdc_transformation =
                            dvs_result.as_deref().map(|r| &r.transformation)
                    }
                }
            }
            if settings.use_sensor_ob {
                params.ob_black_level = Some(settings.ob_output);
            }
            if settings.wfov_mode {
                params.view_params = Some(ViewConfig::from_settings(settings));
            }
            params.pal_override = settings.pal_override.as_deref();
        }

        if inner.tuning_mode.is_ull_pipe() {
            let exposure = first_exposure(&aiq.ae_results)?;
            if !camera.using_sensor_digital_gain {
                params.manual_digital_gain = Some(exposure);
            }
            if camera.using_isp_digital_gain {
                params.manual_digital_gain = Some(camera.isp_digital_gain(exposure));
            }
            log::trace!("ULL digital gain {:?}", params.manual_digital_gain);
        } else if inner.tuning_mode.is_hdr_pipe()
            && camera.hdr_gain_type == HdrGainType::IspDgAndSensorDirectAg
        {
            let exposure = first_exposure(&aiq.ae_results)?;
            log::trace!("DG of sequence {} goes to the ISP: {}", aiq.sequence, exposure);
            params.manual_digital_gain = Some(exposure);
        }

        let size = inner.output_sizes.get(&stream_id).copied().unwrap_or(0);
        let adaptation = inner
            .adaptation
            .as_mut()
            .ok_or_else(|| Error::NoInit("ISP adaptation handle".to_string()))?;
        let mut blob = vec![0u8; size];
        let used = adaptation.run(&params, &mut blob).map_err(|err| {
            Error::Unknown(format!("ISP parameter adaptation has failed: {}", err))
        })?;
        blob.truncate(used);
        Ok(Arc::from(blob))
    }

    /// Parameter blob of `sequence` for `stream_id`.
    ///
    /// `(-1, -1)` returns the most recently produced blob. A miss is logged
    /// and also answered with the most recent blob.
    pub fn get_ipu_parameter(&self, sequence: i64, stream_id: i32) -> Arc<[u8]> {
        let inner = self.lock();
        if sequence == -1 && stream_id == -1 {
            return inner.current.clone();
        }
        match inner.pool.lookup(sequence, stream_id) {
            Some(blob) => blob,
            None => {
                log::error!(
                    "no ISP parameter for stream {}, sequence {}",
                    stream_id,
                    sequence
                );
                inner.current.clone()
            }
        }
    }

    /// Encode the ISA buffer of `sequence`: the process group descriptor into
    /// plane 0 and, for [`EncodeBufferType::IsaConfig`], the input terminal
    /// payloads into plane 1.
    pub fn encode_isa_params(
        &self,
        buffer: &mut CameraBuffer,
        encode_type: EncodeBufferType,
        sequence: i64,
    ) -> Result<(), Error> {
        let camera = self.config.camera(self.camera_id)?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != AdaptorState::Configured {
            return Err(Error::InvalidOperation(format!(
                "encode ISA params in state {}",
                inner.state
            )));
        }
        if self.pg_param_type != PgParamType::Isys {
            return Err(Error::InvalidOperation(format!(
                "encode ISA params with pg param type {:?}",
                self.pg_param_type
            )));
        }

        let blob = self
            .aiq_result_for(sequence)
            .and_then(|aiq| self.run_adaptation(inner, camera, &aiq, 0, None, sequence, false))
            .map_err(|err| Error::Unknown(format!("ISA adaptation failed: {}", err)))?;
        inner.current = blob;

        let codec = inner
            .codec
            .as_mut()
            .ok_or_else(|| Error::NoInit("P2P wrapper".to_string()))?;
        codec.set_parameters(&inner.current).map_err(|err| {
            Error::Unknown(format!("could not set process group parameters: {}", err))
        })?;

        let (pg, payload) = buffer.split_planes_mut()?;
        codec
            .create_process_group(pg)
            .map_err(|err| Error::Unknown(format!("could not create ISA process group: {}", err)))?;

        for (index, terminal) in inner.layout.terminals.iter().enumerate() {
            if terminal.size == 0 {
                continue;
            }
            let terminal_payload = if terminal.is_input {
                if encode_type == EncodeBufferType::Stats {
                    continue;
                }
                let range = terminal.offset..terminal.offset + terminal.size;
                Some(payload.get_mut(range).ok_or_else(|| {
                    Error::NoMemory(format!("payload plane too small for terminal {}", index))
                })?)
            } else {
                if encode_type == EncodeBufferType::IsaConfig {
                    continue;
                }
                None
            };

            codec
                .encode_terminal_payload(pg, index, terminal_payload, terminal.offset)
                .map_err(|err| {
                    log::error!("could not encode terminal {}: {}", index, err);
                    Error::Unknown(format!("terminal {} encode failed", index))
                })?;
        }
        Ok(())
    }

    pub fn process_group_size(&self) -> usize {
        self.lock().layout.process_group_size
    }

    pub fn input_payload_size(&self) -> usize {
        self.lock().layout.input_payload_size
    }

    pub fn output_payload_size(&self) -> usize {
        self.lock().layout.output_payload_size
    }

    pub fn terminal_layout(&self) -> TerminalLayout {
        self.lock().layout.clone()
    }

    /// Sequences that took a new slot, oldest first.
    pub fn sequence_history(&self) -> Vec<i64> {
        self.lock().history.to_vec()
    }

    /// Sequence held by each parameter slot, -1 when unused.
    pub fn slot_sequences(&self) -> Vec<i64> {
        self.lock().pool.sequences()
    }

    /// Decode a statistics buffer into the result store.
    ///
    /// Input system statistics go straight to the RGBS/AF decode. Processing
    /// system statistics are queried first and every kind they carry (DVS,
    /// LTM, RGBS with AF) is decoded on its own.
    pub fn decode_stats_data(
        &self,
        tuning_mode: TuningMode,
        buffer: &CameraBuffer,
        graph_config: Option<&GraphConfig>,
    ) -> Result<(), Error> {
        let camera = self.config.camera(self.camera_id)?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.state != AdaptorState::Configured {
            return Err(Error::InvalidOperation(format!(
                "decode statistics in state {}",
                inner.state
            )));
        }

        if buffer.usage() == BufferUsage::IsysStats {
            return self.decode_and_save_aiq_stats(inner, camera, tuning_mode, buffer);
        }

        let stats = buffer.plane(0)?;
        if stats.is_empty() {
            return Err(Error::Unknown("wrong statistics buffer".to_string()));
        }
        let query = inner
            .adaptation()?
            .statistics_query(stats)
            .map_err(|err| Error::Unknown(format!("statistics query failed: {}", err)))?;
        log::trace!("statistics of sequence {}: {:?}", buffer.sequence(), query);

        if query.dvs_stats {
            self.decode_dvs_stats(inner, buffer, graph_config)?;
        }

        if query.yv_grids_hdr {
            match inner.adaptation()?.convert_hdr_yv(stats) {
                Ok(grid) => {
                    log::trace!("hdr yv grid {}x{}", grid.width, grid.height);
                    self.store.update_ltm_statistics(LtmStatistics {
                        sequence: buffer.sequence(),
                        grid,
                    });
                }
                Err(err) => log::warn!("failed to get hdr yv stats: {}", err),
            }
        }

        if query.rgbs_grid && query.af_grid {
            self.decode_and_save_aiq_stats(inner, camera, tuning_mode, buffer)
                .map_err(|err| {
                    log::error!("decode aiq statistics failed: {}", err);
                    err
                })?;
        }
        Ok(())
    }

    fn decode_dvs_stats(
        &self,
        inner: &mut Inner,
        buffer: &CameraBuffer,
        graph_config: Option<&GraphConfig>,
    ) -> Result<(), Error> {
        let Some(graph_config) = graph_config else {
            log::warn!("no graph config to decode DVS statistics");
            return Err(Error::BadValue("null graph config".to_string()));
        };

        if inner.dvs_resolution.is_empty() {
            match graph_config.get_gdc_kernel_setting() {
                Ok((_, resolution)) => inner.dvs_resolution = resolution,
                Err(err) => {
                    log::warn!("failed to get GDC kernel setting, DVS stats not decoded: {}", err);
                    return Ok(());
                }
            }
        }

        let stats = buffer.plane(0)?;
        match inner.adaptation()?.convert_dvs(stats, inner.dvs_resolution) {
            Ok(vectors) => {
                self.store.update_dvs_statistics(DvsStatistics {
                    sequence: buffer.sequence(),
                    resolution: inner.dvs_resolution,
                    vectors,
                });
            }
            Err(err) => log::warn!("failed to convert DVS statistics: {}", err),
        }
        Ok(())
    }

    fn decode_and_save_aiq_stats(
        &self,
        inner: &Inner,
        camera: &CameraConfig,
        tuning_mode: TuningMode,
        buffer: &CameraBuffer,
    ) -> Result<(), Error> {
        let sequence = buffer.sequence();
        let feedback = match self.store.aiq_result(sequence) {
            Some(result) => Some(result),
            None => {
                log::warn!("no aiq result of sequence {}, using the latest", sequence);
                self.store.latest_aiq_result()
            }
        };
        let feedback_or_err = || {
            feedback.clone().ok_or_else(|| {
                Error::InvalidOperation(format!("no aiq result to decode sequence {}", sequence))
            })
        };

        let adaptation = inner.adaptation()?;
        let mut exposure_num = camera.exposure_num;
        let (mut rgbs_grids, hdr_rgbs_grid, af_grid) = match buffer.usage() {
            BufferUsage::PsysStats if tuning_mode.is_hdr_pipe() => {
                exposure_num = camera.hdr_exposure_num;
                let feedback = feedback_or_err()?;
                let stats = buffer.plane(0)?;
                let (grids, hdr_grid) = convert_hdr_rgbs(
                    adaptation,
                    camera,
                    stats,
                    &feedback.ae_results,
                    &feedback.pa_results.color_gains,
                )?;
                let af = convert_af(adaptation, stats)?;
                (grids, Some(hdr_grid), af)
            }
            BufferUsage::PsysStats => {
                let feedback = feedback_or_err()?;
                let stats = buffer.plane(0)?;
                let grids = adaptation
                    .convert_awb(stats, Some(&feedback.ae_results), inner.bcomp_results.as_ref())
                    .map_err(|err| {
                        Error::Unknown(format!("failed to convert RGBS statistics: {}", err))
                    })?;
                check_rgbs_grid(grids.first(), "PSA")?;
                let af = convert_af(adaptation, stats)?;
                (grids, None, af)
            }
            BufferUsage::IsysStats => {
                let (grids, af) = convert_isa_stats(inner, adaptation, buffer)?;
                (grids, None, af)
            }
            other => {
                return Err(Error::BadValue(format!(
                    "buffer usage {} carries no statistics",
                    other
                )))
            }
        };

        rgbs_grids.truncate(exposure_num as usize);
        self.store.update_aiq_statistics(AiqStatistics {
            sequence,
            timestamp: buffer.timestamp(),
            tuning_mode,
            rgbs_grids,
            hdr_rgbs_grid,
            af_grid,
        });
        Ok(())
    }
}

/// DOL mode and conversion gain ratio of the selected graph.
///
/// Without a recognized DOL mode the helper runs in non-DOL mode.
fn dol_settings(graph_config: Option<&GraphConfig>) -> (DolMode, f32) {
    let Some(graph_config) = graph_config else {
        log::warn!("no graph config for DOL info, using non-DOL");
        return (DolMode::NonDol, 1.0);
    };
    match graph_config.get_dol_info() {
        Ok((gain, name)) => match DolMode::from_name(&name) {
            Some(mode) => (mode, gain),
            None => {
                log::warn!("unknown DOL mode '{}', using non-DOL", name);
                (DolMode::NonDol, gain)
            }
        },
        Err(err) => {
            log::warn!("graph {}: {}, using non-DOL", graph_config.key(), err);
            (DolMode::NonDol, 1.0)
        }
    }
}

fn first_exposure(ae_results: &AeResults) -> Result<f32, Error> {
    ae_results
        .first_exposure()
        .map(|exposure| exposure.digital_gain)
        .ok_or_else(|| Error::BadValue("aiq exposure is missing".to_string()))
}

/// Frame counter into TNR kernels, flip and YUV range into the formatters.
fn update_kernel_metadata(group: &mut ProgramGroup, aiq: &AiqResult) {
    for kernel in &mut group.kernels {
        if uuid::TNR.contains(&kernel.uuid) {
            // the kernel counter is 32 bit and wraps
            kernel.metadata[0] = aiq.sequence as i32;
            log::trace!("tnr {} frame count {}", kernel.uuid, kernel.metadata[0]);
        } else if uuid::OFA.contains(&kernel.uuid) {
            kernel.metadata[2] = aiq.aiq_param.flip_mode;
            kernel.metadata[3] = aiq.aiq_param.yuv_color_range_mode;
            log::trace!(
                "ofa {} flip {} yuv range {}",
                kernel.uuid,
                kernel.metadata[2],
                kernel.metadata[3]
            );
        }
    }
}

fn read_toggle_file(path: &Path) -> String {
    let mut content = Vec::new();
    if let Ok(file) = fs::File::open(path) {
        let limit = (KERNEL_TOGGLE_MAX_LENGTH - 1) as u64;
        if let Err(err) = file.take(limit).read_to_end(&mut content) {
            log::debug!(target: KERNEL_TOGGLE_TARGET, "{}: {}", path.display(), err);
            content.clear();
        }
    }
    String::from_utf8_lossy(&content).into_owned()
}

/// Force kernels on or off from the debug toggle files. A kernel is matched
/// when its uuid appears anywhere in a file.
fn apply_kernel_toggles(group: &mut ProgramGroup, camera: &CameraConfig) {
    if !camera.kernel_toggle_debug && !log::log_enabled!(target: KERNEL_TOGGLE_TARGET, log::Level::Trace)
    {
        return;
    }

    let enabled = read_toggle_file(&camera.kernel_toggle_files.enabled);
    let disabled = read_toggle_file(&camera.kernel_toggle_files.disabled);
    if enabled.is_empty() && disabled.is_empty() {
        log::trace!(target: KERNEL_TOGGLE_TARGET, "no explicit kernel toggle");
        return;
    }
    log::trace!(
        target: KERNEL_TOGGLE_TARGET,
        "enabled kernels: {}, disabled kernels: {}",
        enabled.trim(),
        disabled.trim()
    );

    for kernel in &mut group.kernels {
        let id = kernel.uuid.to_string();
        if enabled.contains(&id) {
            kernel.enable = true;
            log::debug!(target: KERNEL_TOGGLE_TARGET, "kernel {} explicitly enabled", id);
        }
        if disabled.contains(&id) {
            kernel.enable = false;
            log::debug!(target: KERNEL_TOGGLE_TARGET, "kernel {} explicitly disabled", id);
        }
    }
}

fn check_rgbs_grid(grid: Option<&RgbsGrid>, source: &str) -> Result<(), Error> {
    let grid = grid.ok_or_else(|| {
        Error::Unknown(format!("failed to convert {} RGBS statistics", source))
    })?;
    if u32::from(grid.width) > MAX_STATISTICS_WIDTH || u32::from(grid.height) > MAX_STATISTICS_HEIGHT
    {
        log::warn!(
            "{} rgbs buffer maybe too small {}x{}",
            source,
            grid.width,
            grid.height
        );
        return Err(Error::BadValue(format!(
            "{} rgbs grid {}x{} exceeds {}x{}",
            source, grid.width, grid.height, MAX_STATISTICS_WIDTH, MAX_STATISTICS_HEIGHT
        )));
    }
    log::trace!("{} rgbs grid {}x{}", source, grid.width, grid.height);
    Ok(())
}

fn convert_af(adaptation: &dyn IspAdaptation, stats: &[u8]) -> Result<AfGrid, Error> {
    let af = adaptation
        .convert_af(stats)
        .map_err(|err| Error::Unknown(format!("failed to convert AF statistics: {}", err)))?;
    log::trace!("af grid {}x{}", af.width, af.height);
    Ok(af)
}

fn convert_hdr_rgbs(
    adaptation: &dyn IspAdaptation,
    camera: &CameraConfig,
    stats: &[u8],
    ae_results: &AeResults,
    color_gains: &ColorGains,
) -> Result<(Vec<RgbsGrid>, HdrRgbsGrid), Error> {
    let query = adaptation
        .statistics_query(stats)
        .map_err(|err| Error::Unknown(format!("failed to query HDR RGBS stats: {}", err)))?;
    if !query.rgbs_grids_hdr {
        return Err(Error::Unknown("no HDR RGBS stats found".to_string()));
    }

    let conversion = if camera.use_fixed_hdr_exposure_info {
        let info = hdr_exposure_info();
        for (index, threshold) in info.thresholds.iter().enumerate() {
            log::trace!(
                "hdr exposure {}: thresholds [{}-{}]",
                index,
                threshold.low,
                threshold.high
            );
        }
        let dg = ae_results
            .first_exposure()
            .map(|exposure| exposure.digital_gain)
            .filter(|dg| *dg > 1.0)
            .unwrap_or(1.0);
        HdrAwbConversion::FixedExposureInfo {
            info,
            gains: [
                color_gains.r / dg,
                (color_gains.gr + color_gains.gb) / (2.0 * dg),
                color_gains.b / dg,
            ],
        }
    } else {
        let compression = HdrCompression {
            input_bpp: camera.hdr_stats_input_bit_depth,
            output_bpp: camera.hdr_stats_output_bit_depth,
        };
        HdrAwbConversion::BitDepth {
            ae_results,
            compression: (compression.input_bpp != compression.output_bpp).then_some(compression),
            gains: [
                color_gains.r,
                (color_gains.gr + color_gains.gb) / 2.0,
                color_gains.b,
            ],
        }
    };

    let (mut grids, hdr_grid) = adaptation
        .convert_awb_hdr(stats, &conversion)
        .map_err(|err| Error::Unknown(format!("failed to convert HDR AWB statistics: {}", err)))?;
    check_rgbs_grid(grids.first(), "HDR")?;
    grids.truncate(ae_results.exposures.len());
    Ok((grids, hdr_grid))
}

fn decode_isys_terminal(
    codec: &dyn ProcessGroupCodec,
    layout: &TerminalLayout,
    buffer: &CameraBuffer,
    uid: u32,
) -> Result<Vec<u8>, Error> {
    let terminal = codec
        .terminal_by_uid(uid)
        .map_err(|err| Error::Unknown(format!("failed to get terminal {:#x}: {}", uid, err)))?;
    let descriptor = layout
        .terminals
        .get(terminal)
        .ok_or_else(|| Error::Unknown(format!("terminal {} has no payload descriptor", terminal)))?;
    let pg = buffer.plane(0)?;
    let payload = buffer
        .plane(1)?
        .get(descriptor.offset..descriptor.offset + descriptor.size)
        .ok_or_else(|| Error::BadValue(format!("payload of terminal {} out of range", terminal)))?;
    codec
        .decode_terminal_payload(pg, terminal, payload)
        .map_err(|err| Error::Unknown(format!("failed to decode terminal {}: {}", terminal, err)))
}

fn convert_isa_stats(
    inner: &Inner,
    adaptation: &dyn IspAdaptation,
    buffer: &CameraBuffer,
) -> Result<(Vec<RgbsGrid>, AfGrid), Error> {
    let codec = inner
        .codec
        .as_deref()
        .ok_or_else(|| Error::NoInit("P2P wrapper".to_string()))?;

    let awb_stats = decode_isys_terminal(codec, &inner.layout, buffer, isys_kernel::STAT_AWB)?;
    let grids = adaptation
        .convert_awb(&awb_stats, None, None)
        .map_err(|err| Error::Unknown(format!("failed to convert AWB statistics: {}", err)))?;
    check_rgbs_grid(grids.first(), "ISA")?;

    let af_stats = decode_isys_terminal(codec, &inner.layout, buffer, isys_kernel::STAT_AF)?;
    let af = convert_af(adaptation, &af_stats)?;
    Ok((grids, af))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aiq::AiqParam, config::KernelToggleFiles, graph::RunKernel};
    use std::path::PathBuf;

    fn kernel(uuid: u32) -> RunKernel {
        RunKernel {
            uuid,
            enable: true,
            stream_id: 60001,
            metadata: [0; 4],
            resolution_info: None,
        }
    }

    fn group() -> ProgramGroup {
        ProgramGroup {
            kernels: vec![
                kernel(uuid::TNR5_22),
                kernel(uuid::OFA_MP),
                kernel(uuid::GDC3),
            ],
        }
    }

    #[test]
    fn test_kernel_metadata() {
        let mut aiq = AiqResult::new(1234);
        aiq.aiq_param = AiqParam {
            flip_mode: 2,
            yuv_color_range_mode: 1,
        };
        let mut group = group();
        update_kernel_metadata(&mut group, &aiq);

        assert_eq!(group.find(uuid::TNR5_22).unwrap().metadata, [1234, 0, 0, 0]);
        assert_eq!(group.find(uuid::OFA_MP).unwrap().metadata, [0, 0, 2, 1]);
        assert_eq!(group.find(uuid::GDC3).unwrap().metadata, [0; 4]);
    }

    fn toggle_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ipuhal-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_kernel_toggles() {
        let enabled = toggle_path("enabled");
        let disabled = toggle_path("disabled");
        fs::write(&enabled, "").unwrap();
        fs::write(&disabled, format!("{} {}\n", uuid::GDC3, uuid::OFA_MP)).unwrap();

        let mut camera = CameraConfig::new(0);
        camera.kernel_toggle_files = KernelToggleFiles {
            enabled: enabled.clone(),
            disabled: disabled.clone(),
        };

        // gate closed
        let mut untouched = group();
        apply_kernel_toggles(&mut untouched, &camera);
        assert!(untouched.kernels.iter().all(|k| k.enable));

        camera.kernel_toggle_debug = true;
        let mut toggled = group();
        toggled.find_mut(uuid::TNR5_22).unwrap().enable = false;
        fs::write(&enabled, uuid::TNR5_22.to_string()).unwrap();
        apply_kernel_toggles(&mut toggled, &camera);

        assert!(toggled.find(uuid::TNR5_22).unwrap().enable);
        assert!(!toggled.find(uuid::OFA_MP).unwrap().enable);
        assert!(!toggled.find(uuid::GDC3).unwrap().enable);

        fs::remove_file(enabled).ok();
        fs::remove_file(disabled).ok();
    }

    #[test]
    fn test_toggle_file_is_truncated() {
        let path = toggle_path("long");
        fs::write(&path, "1".repeat(4000)).unwrap();
        assert_eq!(read_toggle_file(&path).len(), KERNEL_TOGGLE_MAX_LENGTH - 1);
        fs::remove_file(path).ok();
        assert!(read_toggle_file(Path::new("/nonexistent/ipuhal/toggle")).is_empty());
    }

    #[test]
    fn test_rgbs_grid_bounds() {
        let fits = RgbsGrid {
            width: 80,
            height: 60,
            blocks: Vec::new(),
        };
        assert!(check_rgbs_grid(Some(&fits), "PSA").is_ok());

        let wide = RgbsGrid {
            width: 81,
            ..fits.clone()
        };
        assert!(matches!(check_rgbs_grid(Some(&wide), "PSA"), Err(Error::BadValue(_))));
        assert!(matches!(check_rgbs_grid(None, "PSA"), Err(Error::Unknown(_))));
    }

    #[test]
    fn test_dol_settings_without_graph() {
        assert_eq!(dol_settings(None), (DolMode::NonDol, 1.0));
    }
}
