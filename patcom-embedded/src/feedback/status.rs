use embedded_hal::digital::OutputPin;

const CONNECTING_PERIOD_MS: u64 = 250;
const LOW_POWER_PERIOD_MS: u64 = 2000;
const ERROR_CYCLE_MS: u64 = 1000;
const ERROR_PULSE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    Off,
    /// Joining WiFi: fast blink
    Connecting,
    /// Online: solid
    Active,
    /// Low-power mode: slow blink
    LowPower,
    /// No usable network: double blink, then pause
    Error,
}

impl StatusMode {
    /// Whether the LED is lit at time `now`
    pub fn level(&self, now: u64) -> bool {
        match self {
            StatusMode::Off => false,
            StatusMode::Active => true,
            StatusMode::Connecting => (now / CONNECTING_PERIOD_MS) % 2 == 0,
            StatusMode::LowPower => (now / LOW_POWER_PERIOD_MS) % 2 == 0,
            StatusMode::Error => {
                let phase = now % ERROR_CYCLE_MS;
                phase < ERROR_PULSE_MS || (2 * ERROR_PULSE_MS..3 * ERROR_PULSE_MS).contains(&phase)
            }
        }
    }
}

pub struct StatusLed<O> {
    pin: O,
    mode: StatusMode,
    lit: Option<bool>,
}

impl<O> StatusLed<O>
where
    O: OutputPin,
{
    pub fn new(pin: O) -> Self {
        Self {
            pin,
            mode: StatusMode::Off,
            lit: None,
        }
    }

    pub fn mode(&self) -> StatusMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StatusMode) {
        if mode != self.mode {
            log::debug!("Status LED {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn refresh(&mut self, now: u64) {
        let lit = self.mode.level(now);
        if self.lit == Some(lit) {
            return;
        }

        let result = if lit {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.lit = Some(lit),
            Err(e) => log::warn!("Failed to drive status LED: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blink_patterns() {
        assert!(StatusMode::Active.level(12345));
        assert!(!StatusMode::Off.level(0));

        assert!(StatusMode::Connecting.level(0));
        assert!(!StatusMode::Connecting.level(250));
        assert!(StatusMode::Connecting.level(500));

        assert!(StatusMode::LowPower.level(1999));
        assert!(!StatusMode::LowPower.level(2000));
    }

    #[test]
    fn test_error_double_blink() {
        let lit: alloc::vec::Vec<bool> = (0..10)
            .map(|slot| StatusMode::Error.level(slot * 100 + 50))
            .collect();
        assert_eq!(
            lit,
            [true, false, true, false, false, false, false, false, false, false]
        );
    }
}
