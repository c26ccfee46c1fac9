use alloc::vec::Vec;

/// Inactivity and supply thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSettings {
    pub low_power_after_ms: u64,
    pub deep_sleep_after_ms: u64,
    pub battery_check_interval_ms: u64,
    /// Volts
    pub low_voltage: f32,
    /// Volts
    pub critical_voltage: f32,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            low_power_after_ms: 60_000,
            deep_sleep_after_ms: 300_000,
            battery_check_interval_ms: 60_000,
            low_voltage: 6.0,
            critical_voltage: 5.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerEvent {
    EnterLowPower,
    ExitLowPower,
    BatteryLow(f32),
    BatteryCritical(f32),
    /// Device should enter deep sleep now
    Sleep,
}

/// Tracks inactivity and supply voltage
#[derive(Debug, Clone)]
pub struct PowerManager {
    settings: PowerSettings,
    last_activity: u64,
    last_battery_check: Option<u64>,
    low_power: bool,
    battery_low: bool,
    battery_critical: bool,
}

impl PowerManager {
    pub fn new(settings: PowerSettings, now: u64) -> Self {
        Self {
            settings,
            last_activity: now,
            last_battery_check: None,
            low_power: false,
            battery_low: false,
            battery_critical: false,
        }
    }

    pub fn is_low_power(&self) -> bool {
        self.low_power
    }

    pub fn is_battery_low(&self) -> bool {
        self.battery_low
    }

    pub fn is_battery_critical(&self) -> bool {
        self.battery_critical
    }

    /// A button was pressed
    pub fn record_activity(&mut self, now: u64) -> Option<PowerEvent> {
        self.last_activity = now;
        if self.low_power {
            self.low_power = false;
            Some(PowerEvent::ExitLowPower)
        } else {
            None
        }
    }

    pub fn evaluate(&mut self, now: u64, voltage: f32) -> Vec<PowerEvent> {
        let mut events = Vec::new();
        let idle = now.saturating_sub(self.last_activity);

        if !self.low_power && idle >= self.settings.low_power_after_ms {
            self.low_power = true;
            events.push(PowerEvent::EnterLowPower);
        }

        let check_due = self
            .last_battery_check
            .is_none_or(|at| now.saturating_sub(at) >= self.settings.battery_check_interval_ms);
        if check_due {
            self.last_battery_check = Some(now);
            self.battery_low = voltage < self.settings.low_voltage;
            self.battery_critical = voltage < self.settings.critical_voltage;
            if self.battery_critical {
                events.push(PowerEvent::BatteryCritical(voltage));
                events.push(PowerEvent::Sleep);
                return events;
            } else if self.battery_low {
                events.push(PowerEvent::BatteryLow(voltage));
            }
        }

        if idle >= self.settings.deep_sleep_after_ms {
            events.push(PowerEvent::Sleep);
        }
        events
    }
}
