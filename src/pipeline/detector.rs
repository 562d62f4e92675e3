//! Bridge to an out-of-process hand landmark model.
//!
//! Per frame the child gets `FRAME <width> <height> <len>\n` followed by
//! `len` bytes of JPEG on stdin, and answers with one line on stdout: a
//! hand record (see [`super::record`]) or `null`.

use std::{
    io::{self, BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use image::{RgbImage, codecs::jpeg::JpegEncoder};

use super::{LandmarkSource, record::parse_hand};
use crate::{
    error::{Error, Result},
    types::{Frame, HandLandmarks},
};

const JPEG_QUALITY: u8 = 85;

pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone()).ok_or_else(
        || {
            Error::Frame(format!(
                "{} bytes do not fill {}x{} rgb",
                frame.rgb.len(),
                frame.width,
                frame.height
            ))
        },
    )?;

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&image)?;
    Ok(bytes)
}

/// Request/reply framing over any writer and line reader.
pub struct DetectorLink<W, R> {
    writer: W,
    reader: R,
    replies: usize,
    line: String,
}

impl<W: Write, R: BufRead> DetectorLink<W, R> {
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            replies: 0,
            line: String::new(),
        }
    }

    /// Sends one frame and waits for its reply line. The wait has no timeout.
    pub fn request(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>> {
        let jpeg = encode_jpeg(frame)?;

        writeln!(
            self.writer,
            "FRAME {} {} {}",
            frame.width,
            frame.height,
            jpeg.len()
        )
        .and_then(|()| self.writer.write_all(&jpeg))
        .and_then(|()| self.writer.flush())
        .map_err(pipe_error)?;

        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .map_err(pipe_error)?;
        if read == 0 {
            return Err(Error::DetectorExited);
        }
        self.replies += 1;

        parse_hand(self.line.trim(), self.replies)
    }

    pub fn replies(&self) -> usize {
        self.replies
    }
}

fn pipe_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::BrokenPipe {
        Error::DetectorExited
    } else {
        Error::Detector(err)
    }
}

/// Child process speaking the detector protocol. Killed on drop.
///
/// Each [`LandmarkSource::detect`] call blocks until the child answers. A
/// child that hangs without closing stdout stalls the control loop with it,
/// and a stop request is only seen once the pending reply arrives.
pub struct ProcessDetector {
    child: Child,
    link: DetectorLink<ChildStdin, BufReader<ChildStdout>>,
}

impl ProcessDetector {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(Error::Detector)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(Error::Detector(io::Error::other("detector pipes unavailable")));
        };

        log::info!("landmark detector started: {program} (pid {})", child.id());

        Ok(Self {
            child,
            link: DetectorLink::new(stdin, BufReader::new(stdout)),
        })
    }
}

impl LandmarkSource for ProcessDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>> {
        self.link.request(frame)
    }
}

impl Drop for ProcessDetector {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        log::info!(
            "landmark detector stopped after {} replies",
            self.link.replies()
        );
    }
}
