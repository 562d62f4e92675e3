use std::time::Instant;

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::{CameraDevice, CameraEnumerator, FrameRead, FrameSource, resolve_cameras};
use crate::{
    config::CaptureSettings,
    error::{Error, Result},
    types::Frame,
};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::NV12,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
];

/// Indices tried when the platform backend cannot list devices.
const PROBE_LIMIT: u32 = 10;

fn requested_formats(settings: &CaptureSettings) -> [RequestedFormat<'static>; 3] {
    let wanted = CameraFormat::new(
        Resolution::new(settings.width, settings.height),
        FrameFormat::MJPEG,
        settings.fps,
    );

    [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted)),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: u32, settings: &CaptureSettings) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(settings) {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.to_string()),
            },
            Err(err) => last_err = Some(err.to_string()),
        }
    }

    Err(Error::CameraOpen {
        index,
        reason: last_err.unwrap_or_else(|| "no supported format".to_string()),
    })
}

/// Lists cameras through the platform backend Nokhwa picks, probing
/// indices directly when the backend reports nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NokhwaEnumerator;

impl CameraEnumerator for NokhwaEnumerator {
    fn cameras(&self) -> Result<Vec<CameraDevice>> {
        let queried = query(ApiBackend::Auto)
            .map(|found| found.iter().filter_map(device_from_info).collect())
            .map_err(|err| err.to_string());
        resolve_cameras(queried, probe_cameras)
    }
}

fn device_from_info(info: &CameraInfo) -> Option<CameraDevice> {
    let index = info.index().as_index().ok()?;
    let name = info.human_name();
    let label = if name.trim().is_empty() {
        format!("Camera {index}")
    } else {
        name
    };
    Some(CameraDevice { index, label })
}

fn probe_cameras() -> Vec<CameraDevice> {
    let settings = CaptureSettings::default();
    (0..PROBE_LIMIT)
        .filter(|index| build_camera(*index, &settings).is_ok())
        .map(|index| CameraDevice {
            index,
            label: format!("Camera {index}"),
        })
        .collect()
}

/// Open camera stream. The stream is stopped when this is dropped.
pub struct CameraFrameSource {
    camera: Camera,
    index: u32,
    sequence: u64,
}

impl CameraFrameSource {
    /// Fails immediately if the device cannot be opened in any format.
    pub fn open(index: u32, settings: &CaptureSettings) -> Result<Self> {
        let camera = build_camera(index, settings)?;
        log::info!(
            "camera {index} streaming at {:?}",
            camera.camera_format()
        );

        Ok(Self {
            camera,
            index,
            sequence: 0,
        })
    }
}

impl FrameSource for CameraFrameSource {
    fn read(&mut self) -> FrameRead {
        let frame = match self.camera.frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("camera frame read failed: {err:?}");
                return FrameRead::Missed;
            }
        };

        let decoded = match frame.decode_image::<RgbFormat>() {
            Ok(img) => img,
            Err(err) => {
                log::warn!("failed to decode camera frame: {err:?}");
                return FrameRead::Missed;
            }
        };

        let (width, height) = decoded.dimensions();
        let rgb = decoded.into_raw();
        if rgb.is_empty() {
            return FrameRead::Missed;
        }

        let sequence = self.sequence;
        self.sequence += 1;

        FrameRead::Ready(Frame {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        })
    }
}

impl Drop for CameraFrameSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            log::warn!("failed to stop camera {}: {err:?}", self.index);
        } else {
            log::info!("camera {} released", self.index);
        }
    }
}
