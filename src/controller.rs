use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::Result,
    gesture::{CooldownGate, VOTE_WINDOW, VoteWindow, pinch_sample},
    pipeline::{ActionDispatcher, Clock, FrameRead, FrameSource, LandmarkSource, SystemClock},
    types::HandLandmarks,
};

/// Pause after a failed frame read so a dead camera does not spin the loop.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// What a frame without a detected hand contributes to the vote window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingHandPolicy {
    /// Leave the window untouched.
    #[default]
    Skip,
    /// Push a "no pinch" sample.
    CountAsOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Armed,
    Cooling,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerEvent {
    pub at: Instant,
    /// Pinch votes in the window when the trigger fired.
    pub votes: usize,
    /// 1 for the first trigger of a run, 2 for the second, ...
    pub ordinal: u64,
    pub frame: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerStatus {
    pub votes: usize,
    pub window_len: usize,
    pub cooldown_remaining: Duration,
    pub state: ControllerState,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pinch {}/{} cd {:.2}s",
            self.votes,
            VOTE_WINDOW,
            self.cooldown_remaining.as_secs_f32()
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub missed_reads: u64,
    pub hands: u64,
    pub detector_errors: u64,
    pub triggers: u64,
}

/// Clears the running flag of a [`PinchController`] from anywhere.
#[derive(Clone, Debug)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Owns the vote window and the cooldown gate for one control session and
/// turns per-frame hand observations into gated trigger dispatches.
pub struct PinchController<D, C = SystemClock> {
    votes: VoteWindow,
    gate: CooldownGate,
    dispatcher: D,
    clock: C,
    missing_hand: MissingHandPolicy,
    running: Arc<AtomicBool>,
    stats: LoopStats,
}

impl<D: ActionDispatcher> PinchController<D, SystemClock> {
    pub fn new(dispatcher: D) -> Self {
        Self::with_clock(dispatcher, SystemClock)
    }
}

impl<D: ActionDispatcher, C: Clock> PinchController<D, C> {
    pub fn with_clock(dispatcher: D, clock: C) -> Self {
        Self {
            votes: VoteWindow::new(),
            gate: CooldownGate::new(),
            dispatcher,
            clock,
            missing_hand: MissingHandPolicy::default(),
            running: Arc::new(AtomicBool::new(true)),
            stats: LoopStats::default(),
        }
    }

    pub fn missing_hand_policy(mut self, policy: MissingHandPolicy) -> Self {
        self.missing_hand = policy;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    /// Feeds one frame's detection result and fires the action if the
    /// window is confirmed and the gate is open.
    pub fn observe(&mut self, hand: Option<&HandLandmarks>) -> Option<TriggerEvent> {
        self.observe_frame(hand, None)
    }

    fn observe_frame(
        &mut self,
        hand: Option<&HandLandmarks>,
        frame: Option<u64>,
    ) -> Option<TriggerEvent> {
        match (hand, self.missing_hand) {
            (Some(hand), _) => {
                self.stats.hands += 1;
                self.votes.push(pinch_sample(hand));
            }
            (None, MissingHandPolicy::CountAsOpen) => self.votes.push(false),
            (None, MissingHandPolicy::Skip) => {}
        }

        let now = self.clock.now();
        let event = self.evaluate(now, frame);
        log::debug!("{}", self.status_at(now));
        event
    }

    fn evaluate(&mut self, now: Instant, frame: Option<u64>) -> Option<TriggerEvent> {
        if !self.votes.is_confirmed() || !self.gate.can_trigger(now) {
            return None;
        }

        self.stats.triggers += 1;
        let event = TriggerEvent {
            at: now,
            votes: self.votes.vote_count(),
            ordinal: self.stats.triggers,
            frame,
        };

        self.dispatcher.dispatch(&event);
        self.gate.on_trigger(now);
        self.votes.reset();

        log::info!(
            "pinch confirmed ({} votes), trigger #{}",
            event.votes,
            event.ordinal
        );
        Some(event)
    }

    /// Pulls frames until stopped or the source runs dry.
    pub fn run<F, L>(&mut self, frames: &mut F, landmarks: &mut L) -> Result<LoopStats>
    where
        F: FrameSource,
        L: LandmarkSource,
    {
        log::info!("pinch controller started");

        while self.running.load(Ordering::Relaxed) {
            let frame = match frames.read() {
                FrameRead::Ready(frame) => frame,
                FrameRead::Missed => {
                    self.stats.missed_reads += 1;
                    thread::sleep(READ_RETRY_DELAY);
                    continue;
                }
                FrameRead::Exhausted => break,
            };
            self.stats.frames += 1;

            let hand = match landmarks.detect(&frame) {
                Ok(hand) => hand,
                Err(err) if err.is_fatal() => {
                    log::error!("landmark source failed: {err}");
                    return Err(err);
                }
                Err(err) => {
                    log::warn!("landmark detection failed on frame {}: {err}", frame.sequence);
                    self.stats.detector_errors += 1;
                    None
                }
            };

            self.observe_frame(hand.as_ref(), Some(frame.sequence));
        }

        self.running.store(false, Ordering::SeqCst);
        log::info!(
            "pinch controller stopped after {} frames ({} missed reads, {} triggers)",
            self.stats.frames,
            self.stats.missed_reads,
            self.stats.triggers
        );
        Ok(self.stats)
    }

    pub fn state(&self, now: Instant) -> ControllerState {
        if self.gate.can_trigger(now) {
            ControllerState::Armed
        } else {
            ControllerState::Cooling
        }
    }

    pub fn status(&self) -> ControllerStatus {
        self.status_at(self.clock.now())
    }

    fn status_at(&self, now: Instant) -> ControllerStatus {
        ControllerStatus {
            votes: self.votes.vote_count(),
            window_len: self.votes.len(),
            cooldown_remaining: self.gate.remaining(now),
            state: self.state(now),
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes.vote_count()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        pipeline::ManualClock,
        types::{Frame, Point2},
    };

    #[derive(Default)]
    struct Recorder {
        events: Vec<TriggerEvent>,
    }

    impl ActionDispatcher for Recorder {
        fn dispatch(&mut self, event: &TriggerEvent) {
            self.events.push(event.clone());
        }
    }

    fn pinched() -> HandLandmarks {
        HandLandmarks::new(
            Point2::new(0.5, 0.9),
            Point2::new(0.52, 0.42),
            Point2::new(0.5, 0.4),
        )
    }

    fn open() -> HandLandmarks {
        HandLandmarks::new(
            Point2::new(0.5, 0.9),
            Point2::new(0.2, 0.5),
            Point2::new(0.5, 0.4),
        )
    }

    fn controller() -> (PinchController<Recorder, ManualClock>, ManualClock, Instant) {
        let t0 = Instant::now();
        let clock = ManualClock::new(t0);
        (
            PinchController::with_clock(Recorder::default(), clock.clone()),
            clock,
            t0,
        )
    }

    #[test]
    fn three_pinches_fire_once_and_reset() {
        let (mut ctl, clock, _) = controller();

        assert!(ctl.observe(Some(&pinched())).is_none());
        clock.advance(Duration::from_millis(33));
        assert!(ctl.observe(Some(&pinched())).is_none());
        clock.advance(Duration::from_millis(33));
        let event = ctl.observe(Some(&pinched())).expect("third pinch fires");

        assert_eq!(event.votes, 3);
        assert_eq!(event.ordinal, 1);
        assert_eq!(ctl.vote_count(), 0);
        assert_eq!(ctl.dispatcher().events.len(), 1);
    }

    #[test]
    fn single_pinch_after_trigger_does_not_refire() {
        let (mut ctl, clock, _) = controller();
        for _ in 0..3 {
            ctl.observe(Some(&pinched()));
        }
        clock.advance(Duration::from_secs(1));

        assert!(ctl.observe(Some(&pinched())).is_none());
        assert_eq!(ctl.vote_count(), 1);
        assert_eq!(ctl.dispatcher().events.len(), 1);
    }

    #[test]
    fn cooldown_blocks_second_trigger_at_100ms() {
        let (mut ctl, clock, _) = controller();
        for _ in 0..3 {
            ctl.observe(Some(&pinched()));
        }
        clock.advance(Duration::from_millis(100));
        for _ in 0..3 {
            assert!(ctl.observe(Some(&pinched())).is_none());
        }
        assert_eq!(ctl.state(clock.now()), ControllerState::Cooling);
        assert_eq!(ctl.dispatcher().events.len(), 1);
    }

    #[test]
    fn cooldown_allows_second_trigger_at_160ms() {
        let (mut ctl, clock, _) = controller();
        for _ in 0..3 {
            ctl.observe(Some(&pinched()));
        }
        for _ in 0..2 {
            ctl.observe(Some(&pinched()));
        }
        clock.advance(Duration::from_millis(160));
        assert_eq!(ctl.state(clock.now()), ControllerState::Armed);
        assert!(ctl.observe(Some(&pinched())).is_some());
        assert_eq!(ctl.dispatcher().events.len(), 2);
    }

    #[test]
    fn votes_accumulate_while_cooling() {
        let (mut ctl, clock, _) = controller();
        for _ in 0..3 {
            ctl.observe(Some(&pinched()));
        }
        for _ in 0..4 {
            ctl.observe(Some(&pinched()));
        }
        assert_eq!(ctl.vote_count(), 4);

        clock.advance(Duration::from_millis(151));
        let event = ctl.observe(Some(&open())).expect("gate reopened");
        assert_eq!(event.votes, 4);
    }

    #[test]
    fn two_of_five_never_fires() {
        let (mut ctl, clock, _) = controller();
        for hand in [pinched(), open(), pinched(), open(), open()] {
            assert!(ctl.observe(Some(&hand)).is_none());
            clock.advance(Duration::from_millis(33));
        }
        assert_eq!(ctl.vote_count(), 2);
    }

    #[test]
    fn missing_hand_is_skipped_by_default() {
        let (mut ctl, _, _) = controller();
        ctl.observe(Some(&pinched()));
        ctl.observe(Some(&pinched()));
        ctl.observe(None);
        ctl.observe(None);
        assert_eq!(ctl.status().window_len, 2);
        assert!(ctl.observe(Some(&pinched())).is_some());
    }

    #[test]
    fn missing_hand_can_count_as_open() {
        let (ctl, _, _) = controller();
        let mut ctl = ctl.missing_hand_policy(MissingHandPolicy::CountAsOpen);
        ctl.observe(Some(&pinched()));
        for _ in 0..4 {
            ctl.observe(None);
        }
        // The first pinch has been evicted by four empty frames plus this one.
        ctl.observe(None);
        assert_eq!(ctl.vote_count(), 0);
        assert_eq!(ctl.status().window_len, VOTE_WINDOW);
    }

    #[test]
    fn status_reports_votes_and_cooldown() {
        let (mut ctl, clock, _) = controller();
        for _ in 0..3 {
            ctl.observe(Some(&pinched()));
        }
        ctl.observe(Some(&pinched()));
        clock.advance(Duration::from_millis(50));

        let status = ctl.status();
        assert_eq!(status.votes, 1);
        assert_eq!(status.cooldown_remaining, Duration::from_millis(100));
        assert_eq!(status.to_string(), "pinch 1/5 cd 0.10s");
    }

    struct Script {
        reads: Vec<FrameRead>,
        clock: ManualClock,
    }

    impl FrameSource for Script {
        fn read(&mut self) -> FrameRead {
            self.clock.advance(Duration::from_millis(33));
            if self.reads.is_empty() {
                FrameRead::Exhausted
            } else {
                self.reads.remove(0)
            }
        }
    }

    struct EveryFramePinched;

    impl LandmarkSource for EveryFramePinched {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<HandLandmarks>> {
            Ok(Some(pinched()))
        }
    }

    struct Dead;

    impl LandmarkSource for Dead {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<HandLandmarks>> {
            Err(Error::DetectorExited)
        }
    }

    #[test]
    fn run_skips_missed_reads_and_stops_when_exhausted() {
        let (mut ctl, clock, t0) = controller();
        let mut frames = Script {
            reads: vec![
                FrameRead::Ready(Frame::empty(0, t0)),
                FrameRead::Missed,
                FrameRead::Ready(Frame::empty(1, t0)),
                FrameRead::Ready(Frame::empty(2, t0)),
            ],
            clock,
        };

        let stats = ctl.run(&mut frames, &mut EveryFramePinched).unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.missed_reads, 1);
        assert_eq!(stats.triggers, 1);
        assert_eq!(ctl.dispatcher().events[0].frame, Some(2));
        assert!(!ctl.stop_handle().is_running());
    }

    #[test]
    fn run_propagates_fatal_detector_errors() {
        let (mut ctl, clock, t0) = controller();
        let mut frames = Script {
            reads: vec![FrameRead::Ready(Frame::empty(0, t0))],
            clock,
        };
        assert!(matches!(
            ctl.run(&mut frames, &mut Dead),
            Err(Error::DetectorExited)
        ));
    }

    #[test]
    fn stop_before_run_exits_immediately() {
        let (mut ctl, clock, t0) = controller();
        ctl.stop_handle().stop();
        let mut frames = Script {
            reads: vec![FrameRead::Ready(Frame::empty(0, t0))],
            clock,
        };
        let stats = ctl.run(&mut frames, &mut EveryFramePinched).unwrap();
        assert_eq!(stats.frames, 0);
    }
}
