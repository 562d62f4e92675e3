//! Collaborators around the pinch decision: where frames come from, who
//! finds the hand in them, what a trigger does, and what time it is.

#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod detector;
pub mod dispatch;
pub mod record;
pub mod trace;

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

use crate::{
    controller::TriggerEvent,
    error::{Error, Result},
    types::{Frame, HandLandmarks},
};

/// Outcome of one attempt to grab a frame.
#[derive(Debug)]
pub enum FrameRead {
    Ready(Frame),
    /// The read failed; the caller retries after a short pause.
    Missed,
    /// The source has nothing more to give (end of a recording).
    Exhausted,
}

pub trait FrameSource {
    fn read(&mut self) -> FrameRead;
}

pub trait LandmarkSource {
    /// `Ok(None)` means no hand was found in the frame.
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>>;
}

/// Fire-and-forget sink for confirmed pinches.
pub trait ActionDispatcher {
    fn dispatch(&mut self, event: &TriggerEvent);
}

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same reading.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: Instant) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: u32,
    pub label: String,
}

/// Lists capture devices. Platform differences live behind implementations.
pub trait CameraEnumerator {
    fn cameras(&self) -> Result<Vec<CameraDevice>>;
}

/// Falls back to `scan` when the platform query fails or lists nothing.
/// A failed query is only an error if the scan finds nothing either.
pub fn resolve_cameras(
    queried: std::result::Result<Vec<CameraDevice>, String>,
    scan: impl FnOnce() -> Vec<CameraDevice>,
) -> Result<Vec<CameraDevice>> {
    match queried {
        Ok(found) if !found.is_empty() => Ok(found),
        Ok(_) => Ok(scan()),
        Err(reason) => {
            log::warn!("camera query failed, probing indices: {reason}");
            let scanned = scan();
            if scanned.is_empty() {
                Err(Error::CameraQuery(reason))
            } else {
                Ok(scanned)
            }
        }
    }
}

impl<T: ActionDispatcher + ?Sized> ActionDispatcher for Box<T> {
    fn dispatch(&mut self, event: &TriggerEvent) {
        (**self).dispatch(event)
    }
}

impl<A: ActionDispatcher, B: ActionDispatcher> ActionDispatcher for (A, B) {
    fn dispatch(&mut self, event: &TriggerEvent) {
        self.0.dispatch(event);
        self.1.dispatch(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(index: u32) -> CameraDevice {
        CameraDevice {
            index,
            label: format!("Camera {index}"),
        }
    }

    #[test]
    fn listed_cameras_skip_the_index_scan() {
        let found = resolve_cameras(Ok(vec![device(2)]), || panic!("scanned")).unwrap();
        assert_eq!(found, vec![device(2)]);
    }

    #[test]
    fn empty_listing_scans_indices() {
        let found = resolve_cameras(Ok(Vec::new()), || vec![device(0)]).unwrap();
        assert_eq!(found, vec![device(0)]);
    }

    #[test]
    fn failed_query_is_rescued_by_the_scan() {
        let found = resolve_cameras(Err("no backend".into()), || vec![device(1)]).unwrap();
        assert_eq!(found, vec![device(1)]);
    }

    #[test]
    fn failed_query_with_an_empty_scan_is_an_error() {
        let err = resolve_cameras(Err("no backend".into()), Vec::new).unwrap_err();
        assert!(matches!(err, Error::CameraQuery(reason) if reason == "no backend"));
    }
}
