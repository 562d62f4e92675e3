use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open camera {index}: {reason}")]
    CameraOpen { index: u32, reason: String },

    #[error("failed to query cameras: {0}")]
    CameraQuery(String),

    #[error("landmark detector i/o failed: {0}")]
    Detector(#[source] std::io::Error),

    #[error("landmark detector exited")]
    DetectorExited,

    #[error("malformed landmark record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("trace time {seconds}s on line {line} is out of range")]
    Timestamp { line: usize, seconds: f64 },

    #[error("invalid landmarks: {0}")]
    Landmarks(String),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors the control loop cannot recover from by skipping a frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CameraOpen { .. } | Error::DetectorExited)
    }
}
