// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// ISP Parameter Adaptor Tests
//
// TESTING LAYERS:
//
// Layer 1 (Unit Tests - No hardware required):
//   - state machine guards, configure and cold run
//   - parameter slot reuse, lag lookups and the latest-result fallback
//   - digital gain routing for ULL and HDR pipes
//   - ISA terminal layout and encode
//   - statistics decode dispatch for input and processing system buffers
//
// The vendor adaptation, bit compression and P2P codec are replaced by the
// in-memory fakes of tests/common, and graphs come from tests/data.
//
// RUN:
//   cargo test --test isp_adaptor

mod common;

use std::{collections::HashSet, sync::atomic::Ordering, sync::Arc};

use common::{aiq_result, graph_config, platform, video_stream, FakeVendor, FAKE_PG_SIZE};
use ipuhal::{
    aiq::{AiqParam, LtmResult, ResultStore},
    buffer::{BufferUsage, CameraBuffer},
    config::{CameraConfig, ConfigMode, HdrGainType, PlatformConfig, SensorDgType, TuningMode},
    graph::{uuid, GraphConfig},
    isp::{
        AdaptorState, DolMode, EncodeBufferType, IspParamAdaptor, IspSettings, PgParamType,
        MAX_BUFFER_COUNT, PAGE_SIZE,
    },
    stream::Resolution,
    Error,
};
use rand::Rng;

struct Fixture {
    adaptor: IspParamAdaptor,
    store: Arc<ResultStore>,
    vendor: FakeVendor,
    config: Arc<PlatformConfig>,
}

fn fixture<F>(pg_param_type: PgParamType, vendor: FakeVendor, edit: F) -> Fixture
where
    F: FnOnce(&mut CameraConfig),
{
    let mut config = (*platform()).clone();
    if let Some(camera) = config.cameras.iter_mut().find(|camera| camera.id == 0) {
        edit(camera);
    }
    let config = Arc::new(config);
    let store = Arc::new(ResultStore::new());
    let adaptor = IspParamAdaptor::new(
        0,
        pg_param_type,
        config.clone(),
        store.clone(),
        Arc::new(vendor.clone()),
    );
    Fixture {
        adaptor,
        store,
        vendor,
        config,
    }
}

fn normal_graph(config: &Arc<PlatformConfig>) -> Arc<GraphConfig> {
    graph_config(config, video_stream(0, 1920, 1080), ConfigMode::Normal)
}

fn configured(pg_param_type: PgParamType) -> Fixture {
    let fx = fixture(pg_param_type, FakeVendor::default(), |_| {});
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1936, 1096),
            ConfigMode::Normal,
            TuningMode::Video,
            Some(&gc),
        )
        .unwrap();
    fx
}

// =============================================================================
// State machine
// =============================================================================

#[test]
fn test_per_frame_calls_require_configured() {
    let fx = fixture(PgParamType::Isys, FakeVendor::default(), |_| {});
    fx.store.update_aiq_result(aiq_result(1, 1.0));
    let mut buffer = CameraBuffer::with_plane_sizes(BufferUsage::IsaConfig, &[FAKE_PG_SIZE, 16384]);

    assert_eq!(fx.adaptor.state(), AdaptorState::NotInit);
    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 1),
        Err(Error::InvalidOperation(_))
    ));

    fx.adaptor.init().unwrap();
    assert_eq!(fx.adaptor.state(), AdaptorState::Init);
    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 1),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        fx.adaptor
            .encode_isa_params(&mut buffer, EncodeBufferType::IsaConfig, 1),
        Err(Error::InvalidOperation(_))
    ));

    let stats = CameraBuffer::with_plane_sizes(BufferUsage::PsysStats, &[64]);
    assert!(matches!(
        fx.adaptor.decode_stats_data(TuningMode::Video, &stats, None),
        Err(Error::InvalidOperation(_))
    ));

    assert_eq!(fx.vendor.state.run_count(), 0);
    assert_eq!(fx.vendor.state.adaptation_inits.load(Ordering::SeqCst), 0);
    assert_eq!(fx.vendor.state.statistics_queries.load(Ordering::SeqCst), 0);
}

#[test]
fn test_configure_before_init() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |_| {});
    let gc = normal_graph(&fx.config);
    let result = fx.adaptor.configure(
        Resolution::new(1920, 1080),
        ConfigMode::Normal,
        TuningMode::Video,
        Some(&gc),
    );
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
    assert_eq!(fx.adaptor.state(), AdaptorState::NotInit);
}

#[test]
fn test_configure_runs_cold_pass_per_stream() {
    let fx = configured(PgParamType::PsysIsa);
    assert_eq!(fx.adaptor.state(), AdaptorState::Configured);
    assert_eq!(fx.vendor.state.adaptation_inits.load(Ordering::SeqCst), 1);
    // the full pipeline role has no codec
    assert_eq!(fx.vendor.state.codec_inits.load(Ordering::SeqCst), 0);

    let runs = fx.vendor.state.runs.lock().unwrap().clone();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.lsc_update && !run.with_ae));

    // isa carries one kernel, the video pipe three
    assert_eq!(fx.adaptor.get_ipu_parameter(-1, -1).len(), 64 + 16);
    assert_eq!(fx.adaptor.sequence_history(), Vec::<i64>::new());
    assert!(fx.adaptor.slot_sequences().iter().all(|seq| *seq == -1));
}

#[test]
fn test_failed_configure_is_not_configured() {
    let vendor = FakeVendor {
        fail_runs: true,
        ..Default::default()
    };
    let fx = fixture(PgParamType::PsysIsa, vendor, |_| {});
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    let result = fx.adaptor.configure(
        Resolution::new(1920, 1080),
        ConfigMode::Normal,
        TuningMode::Video,
        Some(&gc),
    );
    assert!(matches!(result, Err(Error::Unknown(_))));
    assert_eq!(fx.adaptor.state(), AdaptorState::Init);
}

#[test]
fn test_deinit_releases_everything() {
    let fx = configured(PgParamType::PsysIsa);
    fx.store.update_aiq_result(aiq_result(5, 1.0));
    fx.adaptor.run_isp_adapt(None, 5).unwrap();

    fx.adaptor.deinit().unwrap();
    assert_eq!(fx.adaptor.state(), AdaptorState::NotInit);
    assert!(fx.adaptor.get_ipu_parameter(-1, -1).is_empty());
    assert!(fx.adaptor.sequence_history().is_empty());
    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 6),
        Err(Error::InvalidOperation(_))
    ));
}

// =============================================================================
// Per-frame adaptation
// =============================================================================

#[test]
fn test_same_sequence_updates_slot_in_place() {
    let fx = configured(PgParamType::PsysIsa);
    let mut result = aiq_result(42, 1.0);
    result.aiq_param = AiqParam {
        flip_mode: 1,
        yuv_color_range_mode: 2,
    };
    fx.store.update_aiq_result(result);
    let settings = IspSettings::default();

    fx.adaptor.run_isp_adapt(Some(&settings), 42).unwrap();
    let first = fx.adaptor.get_ipu_parameter(42, 60001);
    let history = fx.adaptor.sequence_history();

    fx.adaptor.run_isp_adapt(Some(&settings), 42).unwrap();
    let second = fx.adaptor.get_ipu_parameter(42, 60001);

    assert_eq!(first.len(), 64 + 16 * 3);
    assert_eq!(first.len(), second.len());
    assert_eq!(history, vec![42]);
    assert_eq!(fx.adaptor.sequence_history(), history);
    let holders = fx
        .adaptor
        .slot_sequences()
        .into_iter()
        .filter(|seq| *seq == 42)
        .count();
    assert_eq!(holders, 1);

    // a new slot rebuilds the shading table, the in-place update does not
    let runs = fx.vendor.state.runs.lock().unwrap().clone();
    assert_eq!(runs.len(), 6);
    assert!(runs[2].lsc_update && runs[3].lsc_update);
    assert!(!runs[4].lsc_update && !runs[5].lsc_update);

    let video = runs
        .iter()
        .rev()
        .find(|run| run.kernels.iter().any(|k| k.uuid == uuid::TNR5_22))
        .unwrap();
    let tnr = video.kernels.iter().find(|k| k.uuid == uuid::TNR5_22).unwrap();
    let ofa = video.kernels.iter().find(|k| k.uuid == uuid::OFA_MP).unwrap();
    assert_eq!(tnr.metadata[0], 42);
    assert_eq!(&ofa.metadata[2..], &[1, 2]);
}

#[test]
fn test_missing_result_uses_latest() {
    let fx = configured(PgParamType::PsysIsa);
    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 11),
        Err(Error::InvalidOperation(_))
    ));

    fx.store.update_aiq_result(aiq_result(10, 1.0));
    fx.adaptor.run_isp_adapt(None, 11).unwrap();
    assert_eq!(fx.adaptor.get_ipu_parameter(11, 60001).len(), 64 + 16 * 3);
    assert!(fx.vendor.state.last_run().with_ae);
}

#[test]
fn test_lookup_miss_returns_latest_blob() {
    let fx = configured(PgParamType::PsysIsa);
    fx.store.update_aiq_result(aiq_result(3, 1.0));
    fx.adaptor.run_isp_adapt(None, 3).unwrap();

    let latest = fx.adaptor.get_ipu_parameter(-1, -1);
    let missing = fx.adaptor.get_ipu_parameter(999, 60001);
    assert!(Arc::ptr_eq(&latest, &missing));
}

#[test]
fn test_slots_hold_unique_sequences() {
    let fx = configured(PgParamType::PsysIsa);
    fx.store.update_aiq_result(aiq_result(0, 1.0));
    let mut rng = rand::rng();

    for _ in 0..300 {
        let sequence = rng.random_range(0..40i64);
        fx.adaptor.run_isp_adapt(None, sequence).unwrap();

        let mut seen = HashSet::new();
        for seq in fx.adaptor.slot_sequences().into_iter().filter(|s| *s != -1) {
            assert!(seen.insert(seq), "sequence {} held by two slots", seq);
        }
        assert!(fx.adaptor.sequence_history().len() <= MAX_BUFFER_COUNT);
        assert!(seen.contains(&sequence));
    }
}

#[test]
fn test_ltm_lookup_follows_history_lag() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.enable_hdr = true;
        camera.ltm_gain_lag = 2;
    });
    let gc = graph_config(&fx.config, video_stream(0, 1920, 1080), ConfigMode::Hdr);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Hdr,
            TuningMode::VideoHdr,
            Some(&gc),
        )
        .unwrap();

    for seq in 1..=5 {
        fx.store.update_aiq_result(aiq_result(seq, 1.0));
        fx.store.update_ltm_result(LtmResult {
            sequence: seq,
            ..Default::default()
        });
    }

    fx.adaptor.run_isp_adapt(None, 1).unwrap();
    assert_eq!(fx.vendor.state.last_run().ltm_sequence, Some(1));

    // frame 3 is skipped
    for seq in [2, 4, 5] {
        fx.adaptor.run_isp_adapt(None, seq).unwrap();
    }
    assert_eq!(fx.adaptor.sequence_history(), vec![1, 2, 4, 5]);
    assert_eq!(fx.vendor.state.last_run().ltm_sequence, Some(2));
}

#[test]
fn test_ltm_lookup_falls_back_to_latest() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.enable_hdr = true;
        camera.ltm_gain_lag = 0;
    });
    let gc = graph_config(&fx.config, video_stream(0, 1920, 1080), ConfigMode::Hdr);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Hdr,
            TuningMode::VideoHdr,
            Some(&gc),
        )
        .unwrap();

    for seq in 1..=3 {
        fx.store.update_ltm_result(LtmResult {
            sequence: seq,
            ..Default::default()
        });
    }
    fx.store.update_aiq_result(aiq_result(10, 1.0));

    // LTM stops at frame 3
    fx.adaptor.run_isp_adapt(None, 10).unwrap();
    assert_eq!(fx.vendor.state.last_run().ltm_sequence, Some(3));
}

#[test]
fn test_missing_result_is_an_error_without_streams() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.enable_aiq = false;
    });
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1936, 1096),
            ConfigMode::Normal,
            TuningMode::Video,
            Some(&gc),
        )
        .unwrap();

    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 1),
        Err(Error::InvalidOperation(_))
    ));
    assert!(fx.adaptor.slot_sequences().iter().all(|seq| *seq != 1));

    fx.store.update_aiq_result(aiq_result(1, 1.0));
    fx.adaptor.run_isp_adapt(None, 1).unwrap();
    assert_eq!(fx.vendor.state.run_count(), 0);
}

#[test]
fn test_ull_digital_gain_routing() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.using_isp_digital_gain = true;
        camera.sensor_dg_type = SensorDgType::TwoX;
        camera.max_sensor_digital_gain = 3;
    });
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Normal,
            TuningMode::VideoUll,
            Some(&gc),
        )
        .unwrap();

    fx.store.update_aiq_result(aiq_result(1, 5.0));
    fx.adaptor.run_isp_adapt(None, 1).unwrap();
    let gain = fx.vendor.state.last_run().manual_digital_gain.unwrap();
    assert!((gain - 1.25).abs() < 1e-6);

    let mut no_exposure = aiq_result(2, 1.0);
    no_exposure.ae_results.exposures.clear();
    fx.store.update_aiq_result(no_exposure);
    assert!(matches!(
        fx.adaptor.run_isp_adapt(None, 2),
        Err(Error::BadValue(_))
    ));
}

#[test]
fn test_hdr_digital_gain_to_isp() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.hdr_gain_type = HdrGainType::IspDgAndSensorDirectAg;
    });
    let gc = graph_config(&fx.config, video_stream(0, 1920, 1080), ConfigMode::Hdr);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Hdr,
            TuningMode::VideoHdr,
            Some(&gc),
        )
        .unwrap();

    fx.store.update_aiq_result(aiq_result(8, 3.0));
    fx.adaptor.run_isp_adapt(None, 8).unwrap();
    assert_eq!(fx.vendor.state.last_run().manual_digital_gain, Some(3.0));

    // the plain video pipe leaves the gain to the sensor
    let plain = configured(PgParamType::PsysIsa);
    plain.store.update_aiq_result(aiq_result(8, 3.0));
    plain.adaptor.run_isp_adapt(None, 8).unwrap();
    assert_eq!(plain.vendor.state.last_run().manual_digital_gain, None);
}

#[test]
fn test_dol_mode_from_graph() {
    let fx = fixture(PgParamType::PsysIsa, FakeVendor::default(), |camera| {
        camera.dol_short_enabled = true;
    });
    let dol_graph = graph_config(&fx.config, video_stream(0, 3840, 2160), ConfigMode::Hdr);
    let plain_graph = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();

    fx.adaptor
        .configure(
            Resolution::new(3840, 2160),
            ConfigMode::Hdr,
            TuningMode::VideoHdr,
            Some(&dol_graph),
        )
        .unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Normal,
            TuningMode::Video,
            Some(&plain_graph),
        )
        .unwrap();

    let modes = fx.vendor.state.dol_modes.lock().unwrap().clone();
    assert_eq!(modes, vec![(DolMode::Dcg, 4.0), (DolMode::NonDol, 1.0)]);
}

// =============================================================================
// ISA encode
// =============================================================================

#[test]
fn test_terminal_payload_accounting() {
    let fx = configured(PgParamType::Isys);
    assert_eq!(fx.vendor.state.codec_inits.load(Ordering::SeqCst), 1);
    let fragments = fx.vendor.state.fragments.lock().unwrap().clone();
    assert_eq!(fragments.len(), 1);
    assert_eq!((fragments[0].width, fragments[0].height), (1936, 1096));

    let layout = fx.adaptor.terminal_layout();
    let inputs: usize = layout
        .terminals
        .iter()
        .filter(|t| t.is_input)
        .map(|t| t.padded_size)
        .sum();
    let outputs: usize = layout
        .terminals
        .iter()
        .filter(|t| !t.is_input)
        .map(|t| t.padded_size)
        .sum();

    assert_eq!(fx.adaptor.process_group_size(), FAKE_PG_SIZE);
    assert_eq!(inputs, fx.adaptor.input_payload_size());
    assert_eq!(outputs, fx.adaptor.output_payload_size());
    assert_eq!(fx.adaptor.input_payload_size(), 4096 + 8192 + 4096);
    assert_eq!(fx.adaptor.output_payload_size(), 8192 + 4096);
    for terminal in &layout.terminals {
        assert_eq!(terminal.padded_size % PAGE_SIZE, 0);
        assert!(terminal.padded_size >= terminal.size);
    }
}

#[test]
fn test_encode_isa_config_and_stats() {
    let fx = configured(PgParamType::Isys);
    fx.store.update_aiq_result(aiq_result(4, 1.0));
    let mut buffer = CameraBuffer::with_plane_sizes(
        BufferUsage::IsaConfig,
        &[FAKE_PG_SIZE, fx.adaptor.input_payload_size()],
    );

    fx.adaptor
        .encode_isa_params(&mut buffer, EncodeBufferType::IsaConfig, 4)
        .unwrap();
    let encoded = fx.vendor.state.encoded.lock().unwrap().clone();
    assert_eq!(encoded, vec![(0, true), (1, true), (4, true)]);
    assert_eq!(buffer.plane(0).unwrap()[0], 0xc0);
    // terminal 1 starts after the padded terminal 0
    let payload = buffer.plane(1).unwrap();
    assert_eq!(payload[4096], 2);
    assert_eq!(payload[4096 + 4999], 2);

    fx.vendor.state.encoded.lock().unwrap().clear();
    fx.adaptor
        .encode_isa_params(&mut buffer, EncodeBufferType::Stats, 4)
        .unwrap();
    let encoded = fx.vendor.state.encoded.lock().unwrap().clone();
    assert_eq!(encoded, vec![(3, false), (5, false)]);
}

#[test]
fn test_encode_needs_isys_role() {
    let fx = configured(PgParamType::PsysIsa);
    fx.store.update_aiq_result(aiq_result(1, 1.0));
    let mut buffer = CameraBuffer::with_plane_sizes(BufferUsage::IsaConfig, &[FAKE_PG_SIZE, 16384]);
    assert!(matches!(
        fx.adaptor
            .encode_isa_params(&mut buffer, EncodeBufferType::IsaConfig, 1),
        Err(Error::InvalidOperation(_))
    ));
}

// =============================================================================
// Statistics decode
// =============================================================================

#[test]
fn test_isys_stats_skip_content_query() {
    let fx = configured(PgParamType::Isys);
    fx.store.update_aiq_result(aiq_result(7, 1.0));
    let buffer = CameraBuffer::with_plane_sizes(
        BufferUsage::IsysStats,
        &[FAKE_PG_SIZE, fx.adaptor.output_payload_size()],
    )
    .with_sequence(7)
    .with_timestamp(12, 500);

    fx.adaptor
        .decode_stats_data(TuningMode::Video, &buffer, None)
        .unwrap();

    assert_eq!(fx.vendor.state.statistics_queries.load(Ordering::SeqCst), 0);
    let stats = fx.store.aiq_statistics().unwrap();
    assert_eq!(stats.sequence, 7);
    assert_eq!(stats.rgbs_grids.len(), 1);
    assert!(stats.hdr_rgbs_grid.is_none());
    assert!(fx.store.dvs_statistics().is_none());
    assert!(fx.store.ltm_statistics().is_none());
}

#[test]
fn test_psys_stats_decode_every_present_kind() {
    let mut vendor = FakeVendor::default();
    vendor.query.dvs_stats = true;
    vendor.query.yv_grids_hdr = true;
    let fx = fixture(PgParamType::PsysIsa, vendor, |_| {});
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Normal,
            TuningMode::Video,
            Some(&gc),
        )
        .unwrap();
    fx.store.update_aiq_result(aiq_result(3, 1.0));

    let buffer = CameraBuffer::with_plane_sizes(BufferUsage::PsysStats, &[1024]).with_sequence(3);
    fx.adaptor
        .decode_stats_data(TuningMode::Video, &buffer, Some(&gc))
        .unwrap();

    assert_eq!(fx.vendor.state.statistics_queries.load(Ordering::SeqCst), 1);
    let dvs = fx.store.dvs_statistics().unwrap();
    assert_eq!(dvs.sequence, 3);
    assert_eq!(dvs.resolution, Resolution::new(1920, 1088));
    assert_eq!(fx.store.ltm_statistics().unwrap().sequence, 3);
    assert_eq!(fx.store.aiq_statistics().unwrap().sequence, 3);

    // DVS decode needs the graph
    assert!(matches!(
        fx.adaptor.decode_stats_data(TuningMode::Video, &buffer, None),
        Err(Error::BadValue(_))
    ));
}

#[test]
fn test_oversized_rgbs_grid_is_rejected() {
    let vendor = FakeVendor {
        grid: (81, 60),
        ..Default::default()
    };
    let fx = fixture(PgParamType::PsysIsa, vendor, |_| {});
    let gc = normal_graph(&fx.config);
    fx.adaptor.init().unwrap();
    fx.adaptor
        .configure(
            Resolution::new(1920, 1080),
            ConfigMode::Normal,
            TuningMode::Video,
            Some(&gc),
        )
        .unwrap();
    fx.store.update_aiq_result(aiq_result(1, 1.0));

    let buffer = CameraBuffer::with_plane_sizes(BufferUsage::PsysStats, &[256]).with_sequence(1);
    assert!(matches!(
        fx.adaptor.decode_stats_data(TuningMode::Video, &buffer, Some(&gc)),
        Err(Error::BadValue(_))
    ));
    assert!(fx.store.aiq_statistics().is_none());
}

#[test]
fn test_hdr_stats_conversion_paths() {
    for fixed in [false, true] {
        let mut vendor = FakeVendor::default();
        vendor.query.rgbs_grids_hdr = true;
        let fx = fixture(PgParamType::PsysIsa, vendor, |camera| {
            camera.use_fixed_hdr_exposure_info = fixed;
            camera.hdr_stats_input_bit_depth = 24;
            camera.hdr_stats_output_bit_depth = 12;
        });
        let gc = graph_config(&fx.config, video_stream(0, 1920, 1080), ConfigMode::Hdr);
        fx.adaptor.init().unwrap();
        fx.adaptor
            .configure(
                Resolution::new(1920, 1080),
                ConfigMode::Hdr,
                TuningMode::VideoHdr,
                Some(&gc),
            )
            .unwrap();

        let mut result = aiq_result(9, 2.0);
        let second = result.ae_results.exposures[0];
        result.ae_results.exposures.push(second);
        fx.store.update_aiq_result(result);

        let buffer =
            CameraBuffer::with_plane_sizes(BufferUsage::PsysStats, &[512]).with_sequence(9);
        fx.adaptor
            .decode_stats_data(TuningMode::VideoHdr, &buffer, Some(&gc))
            .unwrap();

        let stats = fx.store.aiq_statistics().unwrap();
        assert_eq!(stats.tuning_mode, TuningMode::VideoHdr);
        assert_eq!(stats.rgbs_grids.len(), 2, "fixed exposure info: {}", fixed);
        assert!(stats.hdr_rgbs_grid.is_some());
        assert_eq!(fx.vendor.state.statistics_queries.load(Ordering::SeqCst), 2);
    }
}
