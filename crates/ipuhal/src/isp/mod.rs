// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! ISP parameter adaptation.
//!
//! [`IspParamAdaptor`] sits between the 3A results in the
//! [`ResultStore`](crate::aiq::ResultStore) and the vendor helpers behind
//! [`VendorLibrary`]. Blobs are kept per sequence in a [`ParameterPool`].

mod adaptor;
mod parameters;
mod settings;
mod vendor;

pub use adaptor::{
    AdaptorState, EncodeBufferType, IspParamAdaptor, PgParamType, KERNEL_TOGGLE_TARGET,
};
pub use parameters::{
    page_align, IspParameter, ParameterPool, SequenceHistory, SlotAcquisition, TerminalLayout,
    TerminalPayloadDescriptor, ISP_PARAM_QUEUE_SIZE, MAX_BUFFER_COUNT, PAGE_SIZE,
};
pub use settings::{
    CameraMountType, FeatureLevel, FeatureSetting, ImageEnhancement, IspEffect, IspSettings,
    ObOutput, ProjectionType, ViewProjection,
};
pub use vendor::{
    hdr_exposure_info, isys_kernel, AdaptationInit, BitCompression, BitCompressionResults,
    DolMode, FragmentDesc, HdrAwbConversion, HdrCompression, HdrExposureInfo, InputParams,
    IspAdaptation, ProcessGroupCodec, QueryResults, StatSplitThreshold, VendorLibrary,
    ViewConfig, ViewFineAdjustments, ViewRotation, MAX_STATISTICS_HEIGHT, MAX_STATISTICS_WIDTH,
};
