// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{buffer::CameraBuffer, Error};

/// A capture-only node (for example a CSI metadata device) seen as a
/// blocking buffer source.
pub trait CaptureDevice: Send {
    fn name(&self) -> &str;

    /// Buffers currently queued to the driver.
    fn queued_buffer_count(&self) -> usize;

    /// Wait up to `timeout` for a buffer. `Ok(false)` is a timeout.
    fn poll(&mut self, timeout: Duration) -> Result<bool, Error>;

    fn dequeue(&mut self) -> Result<CameraBuffer, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub retries: u32,
    /// Sleep between iterations while no buffer is queued.
    pub idle_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            timeout: Duration::from_millis(1000),
            retries: 10,
            idle_backoff: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Idle,
    Continue,
    Stop,
}

fn capture_step<F>(
    device: &mut dyn CaptureDevice,
    config: &PollConfig,
    exit: &AtomicBool,
    handler: &mut F,
) -> Step
where
    F: FnMut(CameraBuffer),
{
    if device.queued_buffer_count() == 0 {
        return Step::Idle;
    }

    let mut ready = false;
    let mut retry = config.retries;
    while !ready && retry > 0 {
        retry -= 1;
        match device.poll(config.timeout) {
            Ok(polled) => ready = polled,
            Err(err) => {
                log::error!("{}: poll failed: {}", device.name(), err);
                return Step::Stop;
            }
        }
        if exit.load(Ordering::Acquire) {
            log::debug!("{}: exit requested while polling", device.name());
            return Step::Stop;
        }
    }

    if !ready {
        log::warn!(
            "{}: no buffer after {} poll(s) of {:?}",
            device.name(),
            config.retries,
            config.timeout
        );
        return Step::Continue;
    }

    match device.dequeue() {
        Ok(buffer) => {
            // in-flight dequeues finish, nothing new is handed out
            if exit.load(Ordering::Acquire) {
                return Step::Stop;
            }
            log::trace!("{}: sequence {}", device.name(), buffer.sequence());
            handler(buffer);
        }
        Err(err) => log::error!("{}: dequeue failed: {}", device.name(), err),
    }
    Step::Continue
}

/// Dedicated poll/dequeue thread of one capture device.
///
/// The thread stops on an exit request, on a poll error, or when the
/// [`CaptureThread`] is dropped.
pub struct CaptureThread {
    exit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    pub fn spawn<D, F>(device: D, handler: F) -> Result<Self, Error>
    where
        D: CaptureDevice + 'static,
        F: FnMut(CameraBuffer) + Send + 'static,
    {
        Self::spawn_with_config(device, PollConfig::default(), handler)
    }

    pub fn spawn_with_config<D, F>(mut device: D, config: PollConfig, mut handler: F) -> Result<Self, Error>
    where
        D: CaptureDevice + 'static,
        F: FnMut(CameraBuffer) + Send + 'static,
    {
        let exit = Arc::new(AtomicBool::new(false));
        let thread_exit = exit.clone();
        let handle = thread::Builder::new()
            .name(format!("capture-{}", device.name()))
            .spawn(move || {
                log::debug!("{}: capture thread started", device.name());
                while !thread_exit.load(Ordering::Acquire) {
                    match capture_step(&mut device, &config, &thread_exit, &mut handler) {
                        Step::Idle => thread::sleep(config.idle_backoff),
                        Step::Continue => {}
                        Step::Stop => break,
                    }
                }
                log::debug!("{}: capture thread stopped", device.name());
            })?;

        Ok(CaptureThread {
            exit,
            handle: Some(handle),
        })
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    pub fn request_exit_and_wait(&mut self) {
        self.request_exit();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
    }

    /// The thread body has returned.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.request_exit_and_wait();
    }
}
