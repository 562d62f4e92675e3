use std::time::{Duration, Instant};

use crate::types::HandLandmarks;

/// Normalized thumb-index distance below which a frame counts as a pinch.
pub const PINCH_THRESHOLD: f32 = 0.35;
/// Keeps the ratio finite when the hand collapses to a point.
pub const SCALE_EPSILON: f32 = 1e-7;
pub const VOTE_WINDOW: usize = 5;
pub const VOTES_REQUIRED: usize = 3;
pub const TRIGGER_COOLDOWN: Duration = Duration::from_millis(150);

/// Thumb-index gap measured in units of wrist-to-index length, so the
/// result does not depend on how far the hand is from the camera.
pub fn normalized_pinch_distance(hand: &HandLandmarks) -> f32 {
    let hand_scale = hand.wrist.distance(hand.index_finger_tip);
    let pinch_distance = hand.index_finger_tip.distance(hand.thumb_tip);

    pinch_distance / (hand_scale + SCALE_EPSILON)
}

pub fn is_pinch(normalized_distance: f32) -> bool {
    normalized_distance < PINCH_THRESHOLD
}

pub fn pinch_sample(hand: &HandLandmarks) -> bool {
    is_pinch(normalized_pinch_distance(hand))
}

/// Ring buffer of the most recent per-frame pinch detections.
#[derive(Clone, Debug)]
pub struct VoteWindow {
    samples: [bool; VOTE_WINDOW],
    head: usize,
    len: usize,
    votes: usize,
}

impl VoteWindow {
    pub fn new() -> Self {
        Self {
            samples: [false; VOTE_WINDOW],
            head: 0,
            len: 0,
            votes: 0,
        }
    }

    pub fn push(&mut self, sample: bool) {
        if self.len < VOTE_WINDOW {
            self.samples[(self.head + self.len) % VOTE_WINDOW] = sample;
            self.len += 1;
        } else {
            // Full: overwrite the oldest slot and advance the head past it.
            if self.samples[self.head] {
                self.votes -= 1;
            }
            self.samples[self.head] = sample;
            self.head = (self.head + 1) % VOTE_WINDOW;
        }

        if sample {
            self.votes += 1;
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes
    }

    pub fn is_confirmed(&self) -> bool {
        self.votes >= VOTES_REQUIRED
    }

    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
        self.votes = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.samples[(self.head + i) % VOTE_WINDOW])
    }
}

impl Default for VoteWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Refuses a trigger until the cooldown has strictly elapsed since the last one.
#[derive(Clone, Debug)]
pub struct CooldownGate {
    last_trigger: Option<Instant>,
    cooldown: Duration,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            last_trigger: None,
            cooldown: TRIGGER_COOLDOWN,
        }
    }

    pub fn can_trigger(&self, now: Instant) -> bool {
        match self.last_trigger {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        }
    }

    pub fn on_trigger(&mut self, now: Instant) {
        let next = match self.last_trigger {
            Some(last) => last.max(now),
            None => now,
        };
        self.last_trigger = Some(next);
    }

    /// Time left before the gate reopens; zero when it is already open.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_trigger {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}
