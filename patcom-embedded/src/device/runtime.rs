use alloc::format;

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal_nb::serial::{Read, Write};

use patcom_api::{BUTTON_COUNT, ValidationError};
use patcom_api::message::{ButtonEvent, SerialTag};

use crate::action::{ActionDispatcher, DispatchResult, HttpClient, SkipReason};
use crate::feedback::{ButtonLeds, StatusLed, StatusMode};
use crate::input::{ButtonBank, ButtonPins};
use crate::network::{
    ConfigSyncResponder, DatagramSocket, DiscoveryResponder, PacketChannel, PacketQueue,
};
use crate::serial::{CommandEffect, SerialControlChannel, SerialLine};
use crate::storage::{ConfigStore, LocalStorage};

use super::context::{DeviceContext, DeviceSettings};
use super::platform::Platform;
use super::power::{PowerEvent, PowerManager};

/// Peripherals handed to [`Device::start`]
pub struct DeviceIo<P, L, O, C, H, N> {
    pub buttons: [P; BUTTON_COUNT],
    pub leds: [L; BUTTON_COUNT],
    pub status_led: O,
    pub serial: C,
    pub http: H,
    pub discovery_socket: N,
    pub config_socket: N,
}

/// The cooperative control loop.
///
/// Every [`tick`](Self::tick) services serial input, queued UDP packets,
/// button lines and timers in that order. Nothing inside a tick waits on the
/// network longer than the dispatch timeout.
pub struct Device<'q, S, P, L, O, C, H, N, X> {
    ctx: DeviceContext<S>,
    pins: ButtonPins<P>,
    bank: ButtonBank,
    leds: ButtonLeds<L>,
    status: StatusLed<O>,
    serial: SerialControlChannel<C>,
    dispatcher: ActionDispatcher<H>,
    discovery: DiscoveryResponder<N>,
    config_sync: ConfigSyncResponder<N>,
    power: PowerManager,
    platform: X,
    queue: &'q PacketQueue,
    last_heartbeat: u64,
}

impl<'q, S, P, L, O, C, H, N, X> Device<'q, S, P, L, O, C, H, N, X>
where
    S: LocalStorage,
    P: InputPin,
    L: SetDutyCycle,
    O: OutputPin,
    C: Read<u8> + Write<u8>,
    H: HttpClient,
    N: DatagramSocket,
    X: Platform,
{
    pub async fn start(
        storage: S,
        io: DeviceIo<P, L, O, C, H, N>,
        mut platform: X,
        queue: &'q PacketQueue,
        settings: DeviceSettings,
    ) -> Self {
        let store = ConfigStore::open(storage, platform.hardware_id()).await;
        let ctx = DeviceContext::new(store, settings);
        let brightness = ctx.config().preferences.brightness;

        let network = &ctx.config().network;
        if network.has_credentials() {
            let address = network.static_address();
            if network.static_ip && address.is_none() {
                log::warn!("Static addressing is invalid, falling back to DHCP");
            }
            platform.join_network(&network.ssid, &network.password, address);
        } else {
            log::info!("No WiFi network configured");
        }

        log::info!(
            "PATCOM v{} starting as {} ({})",
            ctx.identity().firmware_version,
            ctx.identity().device_id,
            ctx.identity().device_name
        );

        Self {
            pins: ButtonPins::new(io.buttons),
            bank: ButtonBank::new(settings.timing),
            leds: ButtonLeds::new(io.leds, brightness),
            status: StatusLed::new(io.status_led),
            serial: SerialControlChannel::new(io.serial),
            dispatcher: ActionDispatcher::new(io.http, settings.dispatch_timeout_ms),
            discovery: DiscoveryResponder::new(io.discovery_socket),
            config_sync: ConfigSyncResponder::new(io.config_socket),
            power: PowerManager::new(settings.power, 0),
            platform,
            queue,
            last_heartbeat: 0,
            ctx,
        }
    }

    pub fn context(&self) -> &DeviceContext<S> {
        &self.ctx
    }

    pub fn platform(&self) -> &X {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut X {
        &mut self.platform
    }

    pub fn serial(&self) -> &SerialControlChannel<C> {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SerialControlChannel<C> {
        &mut self.serial
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<H> {
        &self.dispatcher
    }

    pub fn leds(&self) -> &ButtonLeds<L> {
        &self.leds
    }

    pub fn config_sync(&self) -> &ConfigSyncResponder<N> {
        &self.config_sync
    }

    /// Milliseconds to wait before the next tick
    pub fn poll_interval(&self) -> u64 {
        let settings = &self.ctx.settings;
        if self.power.is_battery_critical() {
            settings.critical_poll_interval_ms
        } else if self.power.is_low_power() || self.power.is_battery_low() {
            settings.low_power_poll_interval_ms
        } else {
            settings.poll_interval_ms
        }
    }

    /// One pass of the loop at time `now` (milliseconds since boot)
    pub async fn tick(&mut self, now: u64) {
        self.ctx.now = now;
        self.ctx.wifi = self.platform.wifi_status();
        self.ctx.supply_voltage = self.platform.supply_voltage();

        if self.service_serial().await {
            return;
        }
        self.service_packets().await;
        self.leds.set_brightness(self.ctx.config().preferences.brightness);

        let levels = self.pins.sample();
        for id in self.bank.poll(levels, now) {
            self.trigger(id).await;
        }

        if let Err(e) = self.discovery.poll_announce(&self.ctx).await {
            log::warn!("Announcement failed: {}", e);
        }
        self.send_heartbeat();
        self.service_power();

        self.status.set_mode(self.status_mode());
        self.leds.refresh(now);
        self.status.refresh(now);

        if self.ctx.restart_due() {
            log::info!("Restarting");
            self.platform.restart();
        }
    }

    /// Returns true when the device restarted
    async fn service_serial(&mut self) -> bool {
        while let Some(line) = self.serial.poll_line() {
            let line = match line {
                SerialLine::Complete(line) => line,
                SerialLine::Overflowed { keyword } => {
                    if let Err(e) = self.serial.reject_overflow(&keyword, self.ctx.now) {
                        log::warn!("Failed to answer oversized line: {}", e);
                    }
                    continue;
                }
            };
            match self.serial.handle_line(&line, &mut self.ctx).await {
                Ok(CommandEffect::None) => {}
                Ok(CommandEffect::Test(id)) => {
                    let result = self.trigger(id).await;
                    if let Err(e) = self.serial.report_test(id, &result, self.ctx.now) {
                        log::warn!("Failed to report test result: {}", e);
                    }
                }
                Ok(CommandEffect::Restart) => {
                    self.platform.restart();
                    return true;
                }
                Err(e) => log::warn!("Failed to answer serial command: {}", e),
            }
        }
        false
    }

    async fn service_packets(&mut self) {
        while let Some(packet) = self.queue.pop() {
            let result = match packet.channel {
                PacketChannel::Discovery => self.discovery.handle_packet(&packet, &self.ctx).await,
                PacketChannel::Config => {
                    self.config_sync.handle_packet(&packet, &mut self.ctx).await
                }
            };
            if let Err(e) = result {
                log::warn!("Failed to handle packet from {}: {}", packet.source, e);
            }
        }
    }

    /// Press handling shared by real presses and `TEST:<n>`
    async fn trigger(&mut self, id: u8) -> DispatchResult {
        let now = self.ctx.now;
        if self.power.record_activity(now) == Some(PowerEvent::ExitLowPower) {
            log::info!("Leaving low power mode");
            self.ctx.low_power = false;
        }

        let Some(slot) = self.ctx.config().button(id) else {
            return DispatchResult::Skipped(SkipReason::Invalid(ValidationError::ButtonOutOfRange {
                button: id,
            }));
        };
        log::info!("Button {} ({}) pressed", id, slot.name);
        let event = ButtonEvent::press(id, slot.name.clone(), now);
        if let Err(e) = self.serial.send(SerialTag::Event, &event) {
            log::warn!("Failed to send press event: {}", e);
        }

        self.leds.toggle(id);
        let env = self.ctx.dispatch_env();
        let result = self.dispatcher.dispatch(id, slot, &env).await;
        match &result {
            DispatchResult::Success { .. } => self.leds.set(id, true),
            DispatchResult::Failed(_) => self.leds.start_error_blink(id, now),
            DispatchResult::Skipped(_) => {}
        }
        result
    }

    fn send_heartbeat(&mut self) {
        let interval = self.ctx.config().preferences.heartbeat_interval_ms as u64;
        if interval == 0 || self.ctx.now.saturating_sub(self.last_heartbeat) < interval {
            return;
        }
        self.last_heartbeat = self.ctx.now;
        if let Err(e) = self.serial.send(SerialTag::Heartbeat, &self.ctx.heartbeat()) {
            log::warn!("Failed to send heartbeat: {}", e);
        }
    }

    fn service_power(&mut self) {
        for event in self.power.evaluate(self.ctx.now, self.ctx.supply_voltage) {
            match event {
                PowerEvent::EnterLowPower => log::info!("Entering low power mode"),
                PowerEvent::ExitLowPower => log::info!("Leaving low power mode"),
                PowerEvent::BatteryLow(volts) => {
                    log::warn!("Battery low: {:.2}V", volts);
                    self.send_raw(&format!("BATTERY:LOW:{:.2}", volts));
                }
                PowerEvent::BatteryCritical(volts) => {
                    log::error!("Battery critical: {:.2}V", volts);
                    self.send_raw(&format!("BATTERY:CRITICAL:{:.2}", volts));
                }
                PowerEvent::Sleep => {
                    log::info!("Entering deep sleep");
                    self.platform.deep_sleep();
                    // Waking up counts as activity
                    self.power.record_activity(self.ctx.now);
                }
            }
        }
        self.ctx.low_power = self.power.is_low_power();
    }

    fn send_raw(&mut self, line: &str) {
        if let Err(e) = self.serial.send_raw(line) {
            log::warn!("Failed to write serial line: {}", e);
        }
    }

    fn status_mode(&self) -> StatusMode {
        if self.ctx.low_power {
            StatusMode::LowPower
        } else if self.ctx.online() {
            StatusMode::Active
        } else if self.ctx.config().network.has_credentials() {
            StatusMode::Connecting
        } else {
            StatusMode::Error
        }
    }
}
