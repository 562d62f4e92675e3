//! Pinch-to-key control: a thumb-index pinch seen by a camera becomes a
//! single space-key press, debounced over a short vote window and rate
//! limited by a cooldown.

pub mod config;
pub mod controller;
pub mod error;
pub mod gesture;
pub mod pipeline;
pub mod types;

pub use controller::{
    ControllerState, ControllerStatus, LoopStats, MissingHandPolicy, PinchController,
    StopHandle, TriggerEvent,
};
pub use error::{Error, Result};
pub use types::{Frame, HandLandmark, HandLandmarks, Point2};
