//! Edge-triggered debouncing of status samples
//!
//! A sample is logically "pressed" iff it equals [`SAMPLE_PRESSED`]; anything
//! else is "released". A transition is emitted only when that classification
//! disagrees with the current state, so repeated identical samples are silent.

use crate::command::SAMPLE_PRESSED;
use crate::types::{ButtonState, Transition};

/// Classify a raw sample byte
pub fn classify(sample: u8) -> ButtonState {
    if sample == SAMPLE_PRESSED {
        ButtonState::Pressed
    } else {
        ButtonState::Released
    }
}

/// Feed one sample into the state machine
///
/// Returns the new state and the transition, if any.
pub fn observe(sample: u8, current: ButtonState) -> (ButtonState, Option<Transition>) {
    let next = classify(sample);
    if next == current {
        return (current, None);
    }

    let transition = match next {
        ButtonState::Pressed => Transition::Pressed,
        ButtonState::Released => Transition::Released,
    };
    (next, Some(transition))
}

/// Owned wrapper around [`observe`] for callers that keep the state in one place
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    state: ButtonState,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    pub fn observe(&mut self, sample: u8) -> Option<Transition> {
        let (state, transition) = observe(sample, self.state);
        self.state = state;
        transition
    }
}
