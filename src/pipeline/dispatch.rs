use crossbeam_channel::{Receiver, Sender};

use super::ActionDispatcher;
use crate::controller::TriggerEvent;

/// Logs triggers without touching the OS input stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDispatcher;

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&mut self, event: &TriggerEvent) {
        log::info!("space (trigger #{}, dry run)", event.ordinal);
    }
}

/// Hands triggers to another thread. Drops the event if the receiver is
/// full or gone; the control loop never waits on a consumer.
#[derive(Clone, Debug)]
pub struct ChannelDispatcher {
    tx: Sender<TriggerEvent>,
}

impl ChannelDispatcher {
    pub fn new(tx: Sender<TriggerEvent>) -> Self {
        Self { tx }
    }

    pub fn unbounded() -> (Self, Receiver<TriggerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl ActionDispatcher for ChannelDispatcher {
    fn dispatch(&mut self, event: &TriggerEvent) {
        if self.tx.try_send(event.clone()).is_err() {
            log::warn!("trigger #{} dropped: no listener", event.ordinal);
        }
    }
}

/// Presses the space key through the platform input API.
#[cfg(feature = "input-enigo")]
pub struct KeyDispatcher {
    enigo: enigo::Enigo,
}

#[cfg(feature = "input-enigo")]
impl KeyDispatcher {
    pub fn new() -> Self {
        Self {
            enigo: enigo::Enigo::new(),
        }
    }
}

#[cfg(feature = "input-enigo")]
impl Default for KeyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "input-enigo")]
impl ActionDispatcher for KeyDispatcher {
    fn dispatch(&mut self, event: &TriggerEvent) {
        use enigo::KeyboardControllable;

        self.enigo.key_click(enigo::Key::Space);
        log::debug!("space pressed for trigger #{}", event.ordinal);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn event(ordinal: u64) -> TriggerEvent {
        TriggerEvent {
            at: Instant::now(),
            votes: 3,
            ordinal,
            frame: None,
        }
    }

    #[test]
    fn channel_forwards_events() {
        let (mut dispatcher, rx) = ChannelDispatcher::unbounded();
        dispatcher.dispatch(&event(1));
        dispatcher.dispatch(&event(2));

        let got: Vec<u64> = rx.try_iter().map(|e| e.ordinal).collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut dispatcher = ChannelDispatcher::new(tx);
        dispatcher.dispatch(&event(1));
        dispatcher.dispatch(&event(2));

        assert_eq!(rx.try_iter().map(|e| e.ordinal).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn disconnected_receiver_is_ignored() {
        let (mut dispatcher, rx) = ChannelDispatcher::unbounded();
        drop(rx);
        dispatcher.dispatch(&event(1));
    }
}
