//! Recorded landmark traces, one JSON object per frame:
//!
//! ```text
//! {"t": 0.000, "hand": {"wrist": [0.5, 0.9], "thumb_tip": [0.52, 0.42], "index_finger_tip": [0.5, 0.4]}}
//! {"t": 0.033, "hand": null}
//! {"missed": true}
//! ```
//!
//! `t` is seconds from the start of the recording. Lines without it are
//! stamped at `index / fps`.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    time::{Duration, Instant},
};

use serde::Deserialize;

use super::{Clock, FrameRead, FrameSource, LandmarkSource, ManualClock, record::HandRecord};
use crate::{
    error::{Error, Result},
    types::{Frame, HandLandmarks},
};

#[derive(Debug, Deserialize)]
struct TraceLine {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    hand: Option<HandRecord>,
    #[serde(default)]
    missed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEntry {
    pub offset: Duration,
    pub missed: bool,
    pub hand: Option<HandLandmarks>,
}

#[derive(Clone, Debug, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn open(path: &Path, fps: u32) -> Result<Self> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file), fps)
    }

    pub fn parse<R: BufRead>(reader: R, fps: u32) -> Result<Self> {
        let fps = f64::from(fps.max(1));
        let mut entries = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parsed: TraceLine =
                serde_json::from_str(trimmed).map_err(|source| Error::Record {
                    line: idx + 1,
                    source,
                })?;
            let seconds = parsed
                .t
                .unwrap_or(entries.len() as f64 / fps)
                .max(0.0);
            let hand = parsed
                .hand
                .as_ref()
                .map(HandRecord::to_landmarks)
                .transpose()?;

            let offset = Duration::try_from_secs_f64(seconds).map_err(|_| Error::Timestamp {
                line: idx + 1,
                seconds,
            })?;

            entries.push(TraceEntry {
                offset,
                missed: parsed.missed,
                hand,
            });
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<TraceEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Splits the trace into a frame source that moves `clock` to each
    /// frame's recorded time and a landmark source keyed by frame sequence.
    pub fn into_sources(self, clock: ManualClock) -> (TraceFrames, TraceLandmarks) {
        let base = clock.now();
        let timing = self
            .entries
            .iter()
            .map(|entry| (entry.offset, entry.missed))
            .collect();
        let hands = self.entries.into_iter().map(|entry| entry.hand).collect();

        (
            TraceFrames {
                timing,
                cursor: 0,
                base,
                clock,
            },
            TraceLandmarks { hands },
        )
    }
}

pub struct TraceFrames {
    timing: Vec<(Duration, bool)>,
    cursor: usize,
    base: Instant,
    clock: ManualClock,
}

impl TraceFrames {
    pub fn base(&self) -> Instant {
        self.base
    }
}

impl FrameSource for TraceFrames {
    fn read(&mut self) -> FrameRead {
        let Some(&(offset, missed)) = self.timing.get(self.cursor) else {
            return FrameRead::Exhausted;
        };
        let sequence = self.cursor as u64;
        self.cursor += 1;

        let Some(timestamp) = self.base.checked_add(offset) else {
            log::warn!("trace frame {sequence} at {offset:?} is past the clock range");
            return FrameRead::Missed;
        };
        self.clock.set(timestamp);

        if missed {
            FrameRead::Missed
        } else {
            FrameRead::Ready(Frame::empty(sequence, timestamp))
        }
    }
}

pub struct TraceLandmarks {
    hands: Vec<Option<HandLandmarks>>,
}

impl LandmarkSource for TraceLandmarks {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>> {
        Ok(self
            .hands
            .get(frame.sequence as usize)
            .copied()
            .flatten())
    }
}
