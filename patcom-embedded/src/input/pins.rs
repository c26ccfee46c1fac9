use embedded_hal::digital::InputPin;

use patcom_api::BUTTON_COUNT;

/// Button lines wired to ground with pull-ups: a low level means pressed
pub struct ButtonPins<P> {
    pins: [P; BUTTON_COUNT],
}

impl<P> ButtonPins<P>
where
    P: InputPin,
{
    pub fn new(pins: [P; BUTTON_COUNT]) -> Self {
        Self { pins }
    }

    /// Sample every line. A line that cannot be read counts as released.
    pub fn sample(&mut self) -> [bool; BUTTON_COUNT] {
        let mut levels = [false; BUTTON_COUNT];
        for (id, pin) in self.pins.iter_mut().enumerate() {
            levels[id] = match pin.is_low() {
                Ok(pressed) => pressed,
                Err(e) => {
                    log::warn!("Failed to read button {}: {:?}", id, e);
                    false
                }
            };
        }
        levels
    }
}
