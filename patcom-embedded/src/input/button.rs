use alloc::vec::Vec;

use patcom_api::BUTTON_COUNT;

/// Minimum continuous hold before a press counts
pub const HOLD_TIME_MS: u64 = 50;
/// Minimum spacing between two emitted presses of the same button
pub const DEBOUNCE_INTERVAL_MS: u64 = 200;
/// A candidate held longer than this without resolving is abandoned
pub const STUCK_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTiming {
    pub hold_ms: u64,
    pub debounce_ms: u64,
    pub stuck_timeout_ms: u64,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            hold_ms: HOLD_TIME_MS,
            debounce_ms: DEBOUNCE_INTERVAL_MS,
            stuck_timeout_ms: STUCK_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Released,
    PressCandidate { since: u64 },
    Pressed,
}

/// Debounce state machine of a single button line
#[derive(Debug, Clone)]
pub struct Debouncer {
    state: ButtonState,
    last_level: bool,
    last_emit: Option<u64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self {
            state: ButtonState::Released,
            last_level: false,
            last_emit: None,
        }
    }
}

impl Debouncer {
    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Feed one sample of the line. Returns true when a press is emitted.
    pub fn update(&mut self, pressed: bool, now: u64, timing: &ButtonTiming) -> bool {
        let rising = pressed && !self.last_level;
        self.last_level = pressed;

        match self.state {
            ButtonState::Released => {
                // A line still held after an abandoned candidate must be released first
                if rising {
                    self.state = ButtonState::PressCandidate { since: now };
                }
                false
            }
            ButtonState::PressCandidate { since } => {
                let held = now.saturating_sub(since);
                if !pressed {
                    self.state = ButtonState::Released;
                    false
                } else if held > timing.stuck_timeout_ms {
                    log::warn!("Button held {} ms without resolving, ignoring", held);
                    self.state = ButtonState::Released;
                    false
                } else if held >= timing.hold_ms && self.debounce_elapsed(now, timing) {
                    self.state = ButtonState::Pressed;
                    self.last_emit = Some(now);
                    true
                } else {
                    false
                }
            }
            ButtonState::Pressed => {
                if !pressed {
                    self.state = ButtonState::Released;
                }
                false
            }
        }
    }

    fn debounce_elapsed(&self, now: u64, timing: &ButtonTiming) -> bool {
        match self.last_emit {
            Some(at) => now.saturating_sub(at) >= timing.debounce_ms,
            None => true,
        }
    }
}

/// Independent debouncers for every button
#[derive(Debug, Clone)]
pub struct ButtonBank {
    buttons: [Debouncer; BUTTON_COUNT],
    timing: ButtonTiming,
}

impl ButtonBank {
    pub fn new(timing: ButtonTiming) -> Self {
        Self {
            buttons: Default::default(),
            timing,
        }
    }

    /// Feed one sample of every line and return the ids of emitted presses
    pub fn poll(&mut self, levels: [bool; BUTTON_COUNT], now: u64) -> Vec<u8> {
        let timing = self.timing;
        self.buttons
            .iter_mut()
            .zip(levels)
            .enumerate()
            .filter_map(|(id, (button, pressed))| {
                button.update(pressed, now, &timing).then_some(id as u8)
            })
            .collect()
    }

    pub fn state(&self, id: u8) -> Option<ButtonState> {
        self.buttons.get(id as usize).map(Debouncer::state)
    }
}
