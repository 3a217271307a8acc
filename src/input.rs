//! Button input.
//!
//! Button drivers report the full button state plus the set of buttons that
//! changed since the last report. A [`TriggerBinding`] picks out the
//! released-to-pressed edge of one configured button.

use heapless::Deque;

/// Snapshot delivered by a button driver.
///
/// Bit `i` of each mask stands for button `i + 1`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ButtonEvent {
    /// Buttons currently pressed.
    pub states: u32,
    /// Buttons whose state changed with this event.
    pub changed: u32,
}

impl ButtonEvent {
    /// Event for button `index` (1-based) going down, all others released.
    pub fn pressed(index: u8) -> Self {
        let bit = button_bit(index);
        Self {
            states: bit,
            changed: bit,
        }
    }

    /// Event for button `index` (1-based) coming back up.
    pub fn released(index: u8) -> Self {
        Self {
            states: 0,
            changed: button_bit(index),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ButtonEvent {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ButtonEvent(states={=u32:b}, changed={=u32:b})", self.states, self.changed)
    }
}

/// Source of trigger events, polled from the supervisor's thread.
pub trait EventSource {
    /// Take the oldest pending event.
    fn poll_event(&mut self) -> Option<ButtonEvent>;
}

impl<E: EventSource + ?Sized> EventSource for &mut E {
    fn poll_event(&mut self) -> Option<ButtonEvent> {
        (**self).poll_event()
    }
}

/// An event source that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl EventSource for NoEvents {
    fn poll_event(&mut self) -> Option<ButtonEvent> {
        None
    }
}

/// Bounded FIFO a platform button driver pushes into.
#[derive(Debug, Default)]
pub struct ButtonQueue<const N: usize> {
    pending: Deque<ButtonEvent, N>,
}

impl<const N: usize> ButtonQueue<N> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            pending: Deque::new(),
        }
    }

    /// Queue an event. A full queue rejects the new event and hands it back.
    pub fn push(&mut self, event: ButtonEvent) -> Result<(), ButtonEvent> {
        self.pending.push_back(event)
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no event is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<const N: usize> EventSource for ButtonQueue<N> {
    fn poll_event(&mut self) -> Option<ButtonEvent> {
        self.pending.pop_front()
    }
}

/// Maps one button's press edge to the configured publish.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TriggerBinding {
    mask: u32,
}

impl TriggerBinding {
    /// Bind to button `index` (1-based, up to 32).
    pub fn new(index: u8) -> Self {
        Self {
            mask: button_bit(index),
        }
    }

    /// True when the bound button went from released to pressed.
    pub fn matches(&self, event: &ButtonEvent) -> bool {
        event.changed & event.states & self.mask != 0
    }
}

/// Mask for a 1-based button index; out-of-range indices map to no button.
fn button_bit(index: u8) -> u32 {
    match index {
        1..=32 => 1 << (index - 1),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_of_bound_button_matches() {
        let binding = TriggerBinding::new(1);
        assert!(binding.matches(&ButtonEvent::pressed(1)));
    }

    #[test]
    fn release_does_not_match() {
        let binding = TriggerBinding::new(1);
        assert!(!binding.matches(&ButtonEvent::released(1)));
    }

    #[test]
    fn other_button_does_not_match() {
        let binding = TriggerBinding::new(2);
        for index in [1, 3, 4, 32] {
            assert!(!binding.matches(&ButtonEvent::pressed(index)));
        }
    }

    #[test]
    fn held_button_without_change_does_not_match() {
        let binding = TriggerBinding::new(1);
        // Button 1 held while button 2 changes.
        let event = ButtonEvent {
            states: 0b11,
            changed: 0b10,
        };
        assert!(!binding.matches(&event));
    }

    #[test]
    fn out_of_range_index_never_matches() {
        let binding = TriggerBinding::new(0);
        let event = ButtonEvent {
            states: u32::MAX,
            changed: u32::MAX,
        };
        assert!(!binding.matches(&event));
    }

    #[test]
    fn queue_is_fifo_and_bounded() {
        let mut queue: ButtonQueue<2> = ButtonQueue::new();
        queue.push(ButtonEvent::pressed(1)).unwrap();
        queue.push(ButtonEvent::released(1)).unwrap();
        assert_eq!(queue.push(ButtonEvent::pressed(2)), Err(ButtonEvent::pressed(2)));
        assert_eq!(queue.poll_event(), Some(ButtonEvent::pressed(1)));
        assert_eq!(queue.poll_event(), Some(ButtonEvent::released(1)));
        assert!(queue.is_empty());
    }
}
