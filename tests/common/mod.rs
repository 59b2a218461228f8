// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles shared by the integration tests

#![allow(dead_code)]

use ircam::backends::camera::{
    BackendError, BackendResult, CameraFormat, DeviceDescriptor, Frame, FrameSender, FrameSource,
    Framerate, PixelFormat, SourceBackendType, SourceKind,
};
use ircam::errors::CaptureResult;
use ircam::media::ColorFrame;
use ircam::pipelines::SnapshotWriter;
use ircam::pipelines::video::{EncoderFactory, VideoEncoder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 4;

/// Handle the test keeps to drive a [`ManualSource`]
#[derive(Clone, Default)]
pub struct SourceHandle {
    sender: Arc<Mutex<Option<FrameSender>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    denied: Arc<Mutex<HashSet<String>>>,
}

impl SourceHandle {
    /// Queue a frame as if the device produced it; false when not subscribed
    pub fn push(&self, frame: Frame) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.try_send(frame).is_ok(),
            None => false,
        }
    }

    /// Simulate the device disappearing mid-stream
    pub fn disconnect(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn deny(&self, id: &str) {
        self.denied.lock().unwrap().insert(id.to_string());
    }

    /// Device ids subscribed to, in order
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }
}

/// Frame source whose frames are pushed by the test
pub struct ManualSource {
    handle: SourceHandle,
    devices: Vec<DeviceDescriptor>,
}

impl ManualSource {
    pub fn new() -> (Self, SourceHandle) {
        let handle = SourceHandle::default();
        let devices = vec![
            DeviceDescriptor::new("ir0", "Front IR", SourceKind::Infrared),
            DeviceDescriptor::new("ir1", "Rear IR", SourceKind::Infrared),
        ];
        (
            Self {
                handle: handle.clone(),
                devices,
            },
            handle,
        )
    }
}

impl FrameSource for ManualSource {
    fn backend_type(&self) -> SourceBackendType {
        SourceBackendType::Synthetic
    }

    fn list_devices(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        Ok(self.devices.clone())
    }

    fn open(&mut self, device: &DeviceDescriptor) -> BackendResult<CameraFormat> {
        if self.handle.denied.lock().unwrap().contains(&device.id) {
            return Err(BackendError::AccessDenied(device.name.clone()));
        }
        if !self.devices.iter().any(|d| d.id == device.id) {
            return Err(BackendError::DeviceNotFound(device.name.clone()));
        }
        Ok(CameraFormat {
            width: WIDTH,
            height: HEIGHT,
            framerate: Some(Framerate::from_int(10)),
            pixel_format: PixelFormat::Gray8,
        })
    }

    fn subscribe(
        &mut self,
        device: &DeviceDescriptor,
        _format: &CameraFormat,
        sender: FrameSender,
    ) -> BackendResult<()> {
        *self.handle.sender.lock().unwrap() = Some(sender);
        self.handle
            .subscriptions
            .lock()
            .unwrap()
            .push(device.id.clone());
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.handle.disconnect();
    }

    fn is_subscribed(&self) -> bool {
        self.handle.is_subscribed()
    }
}

/// Uniform frame of brightness `luma` captured `millis` after `epoch`
pub fn frame(luma: u8, epoch: Instant, millis: u64, sequence: u64) -> Frame {
    Frame::gray8(
        WIDTH,
        HEIGHT,
        vec![luma; (WIDTH * HEIGHT) as usize],
        epoch + Duration::from_millis(millis),
        sequence,
    )
}

/// What a [`MemoryEncoderFactory`] saw
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub opened: Vec<(PathBuf, Framerate)>,
    pub sequences: Vec<u64>,
    pub finished: usize,
}

/// Encoder factory that records frame sequences instead of encoding
#[derive(Clone, Default)]
pub struct MemoryEncoderFactory {
    pub log: Arc<Mutex<EncoderLog>>,
    /// Fail every write once this many frames were written
    pub fail_after: Option<usize>,
}

struct MemoryEncoder {
    log: Arc<Mutex<EncoderLog>>,
    fail_after: Option<usize>,
}

impl VideoEncoder for MemoryEncoder {
    fn write_frame(&mut self, frame: &ColorFrame) -> Result<(), String> {
        let mut log = self.log.lock().unwrap();
        if self.fail_after.is_some_and(|n| log.sequences.len() >= n) {
            return Err("disk full".to_string());
        }
        log.sequences.push(frame.sequence);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), String> {
        self.log.lock().unwrap().finished += 1;
        Ok(())
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn open(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        framerate: Framerate,
    ) -> Result<Box<dyn VideoEncoder>, String> {
        self.log
            .lock()
            .unwrap()
            .opened
            .push((path.to_path_buf(), framerate));
        Ok(Box::new(MemoryEncoder {
            log: Arc::clone(&self.log),
            fail_after: self.fail_after,
        }))
    }

    fn extension(&self) -> &'static str {
        "mem"
    }
}

/// Snapshot writer that records which frame was captured
#[derive(Clone, Default)]
pub struct MemorySnapshotWriter {
    pub written: Arc<Mutex<Vec<(u64, PathBuf)>>>,
}

impl SnapshotWriter for MemorySnapshotWriter {
    fn write(&mut self, frame: &ColorFrame, path: &Path) -> CaptureResult<PathBuf> {
        self.written
            .lock()
            .unwrap()
            .push((frame.sequence, path.to_path_buf()));
        Ok(path.to_path_buf())
    }
}
