use embedded_hal::pwm::SetDutyCycle;

use patcom_api::BUTTON_COUNT;

/// Number of flashes signalling a failed action
pub const ERROR_FLASHES: u64 = 3;
/// Length of each on and off phase of an error flash
pub const ERROR_FLASH_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
struct ErrorBlink {
    started: u64,
    restore: bool,
}

/// Per-button indicator LEDs driven by PWM at the configured brightness.
///
/// Error flashes run from [`refresh`](Self::refresh) so they never block the
/// polling loop; the LED returns to its state at the start of the flash.
pub struct ButtonLeds<L> {
    leds: [L; BUTTON_COUNT],
    states: [bool; BUTTON_COUNT],
    blinks: [Option<ErrorBlink>; BUTTON_COUNT],
    written: [Option<bool>; BUTTON_COUNT],
    brightness: u8,
}

impl<L> ButtonLeds<L>
where
    L: SetDutyCycle,
{
    pub fn new(leds: [L; BUTTON_COUNT], brightness: u8) -> Self {
        Self {
            leds,
            states: [false; BUTTON_COUNT],
            blinks: [None; BUTTON_COUNT],
            written: [None; BUTTON_COUNT],
            brightness,
        }
    }

    pub fn state(&self, id: u8) -> bool {
        self.states.get(id as usize).copied().unwrap_or(false)
    }

    pub fn set(&mut self, id: u8, on: bool) {
        if let Some(state) = self.states.get_mut(id as usize) {
            *state = on;
        }
    }

    pub fn toggle(&mut self, id: u8) -> bool {
        let next = !self.state(id);
        self.set(id, next);
        next
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        if brightness != self.brightness {
            self.brightness = brightness;
            self.written = [None; BUTTON_COUNT];
        }
    }

    /// Flash the LED, then put back the state it has now
    pub fn start_error_blink(&mut self, id: u8, now: u64) {
        let restore = self.state(id);
        if let Some(blink) = self.blinks.get_mut(id as usize) {
            *blink = Some(ErrorBlink {
                started: now,
                restore,
            });
        }
    }

    pub fn is_blinking(&self, id: u8) -> bool {
        matches!(self.blinks.get(id as usize), Some(Some(_)))
    }

    /// Drive the outputs for time `now`
    pub fn refresh(&mut self, now: u64) {
        for id in 0..BUTTON_COUNT {
            let lit = match self.blinks[id] {
                Some(blink) => {
                    let elapsed = now.saturating_sub(blink.started);
                    if elapsed >= ERROR_FLASHES * 2 * ERROR_FLASH_MS {
                        self.blinks[id] = None;
                        self.states[id] = blink.restore;
                        blink.restore
                    } else {
                        (elapsed / ERROR_FLASH_MS) % 2 == 0
                    }
                }
                None => self.states[id],
            };

            if self.written[id] != Some(lit) {
                self.write(id, lit);
            }
        }
    }

    fn write(&mut self, id: usize, lit: bool) {
        let led = &mut self.leds[id];
        let result = if lit {
            led.set_duty_cycle_fraction(self.brightness as u16, u8::MAX as u16)
        } else {
            led.set_duty_cycle_fully_off()
        };

        match result {
            Ok(()) => self.written[id] = Some(lit),
            Err(e) => log::warn!("Failed to drive LED {}: {:?}", id, e),
        }
    }
}
