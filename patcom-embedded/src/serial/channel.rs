use alloc::format;
use alloc::string::String;

use embedded_hal_nb::nb;
use embedded_hal_nb::serial::{Read, Write};
use serde::Serialize;

use patcom_api::ConfigPatch;
use patcom_api::message::{
    CommandParseError, CommandResponse, MAX_LINE_LEN, ResponseKind, SerialCommand, SerialTag,
    encode_line,
};

use crate::action::DispatchResult;
use crate::device::DeviceContext;
use crate::error::Result;
use crate::storage::LocalStorage;

use super::line::{LineReader, SerialLine, send_line};

/// Connection name reported in `IDENTIFY` answers
const CONNECTION: &str = "serial";

/// What the loop has to do after a command was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    None,
    /// Run the action of this button and report it with [`SerialControlChannel::report_test`]
    Test(u8),
    /// Restart immediately
    Restart,
}

/// Line protocol on the USB serial link. One request line in, one tagged line out.
pub struct SerialControlChannel<C> {
    port: C,
    reader: LineReader,
}

impl<C> SerialControlChannel<C>
where
    C: Read<u8> + Write<u8>,
{
    pub fn new(port: C) -> Self {
        Self {
            port,
            reader: LineReader::new(),
        }
    }

    pub fn port(&self) -> &C {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut C {
        &mut self.port
    }

    /// Drain received bytes until a full line is available or the port runs dry
    pub fn poll_line(&mut self) -> Option<SerialLine> {
        loop {
            match self.port.read() {
                Ok(byte) => {
                    if let Some(line) = self.reader.push(byte) {
                        return Some(line);
                    }
                }
                Err(nb::Error::WouldBlock) => return None,
                Err(nb::Error::Other(e)) => {
                    log::warn!("Serial read failed: {:?}", e);
                    return None;
                }
            }
        }
    }

    pub fn send<T: Serialize>(&mut self, tag: SerialTag, payload: &T) -> Result<()> {
        let line = encode_line(tag, payload)?;
        send_line(&mut self.port, &line)
    }

    /// Untagged or preformatted output
    pub fn send_raw(&mut self, line: &str) -> Result<()> {
        send_line(&mut self.port, line)
    }

    pub fn respond<M: Into<String>>(
        &mut self,
        kind: ResponseKind,
        success: bool,
        message: M,
        now: u64,
    ) -> Result<()> {
        self.send(
            SerialTag::Response,
            &CommandResponse::new(kind, success, message, now),
        )
    }

    pub async fn handle_line<S>(
        &mut self,
        line: &str,
        ctx: &mut DeviceContext<S>,
    ) -> Result<CommandEffect>
    where
        S: LocalStorage,
    {
        let command = match SerialCommand::parse(line) {
            Ok(command) => command,
            Err(CommandParseError::Empty) => return Ok(CommandEffect::None),
            Err(e @ CommandParseError::InvalidButton(_)) => {
                self.respond(ResponseKind::Test, false, format!("{}", e), ctx.now)?;
                return Ok(CommandEffect::None);
            }
            Err(e) => {
                log::warn!("{}", e);
                self.respond(ResponseKind::Error, false, format!("{}", e), ctx.now)?;
                return Ok(CommandEffect::None);
            }
        };

        match command {
            SerialCommand::Identify => {
                self.send(SerialTag::Identify, &ctx.identify_info(CONNECTION))?;
            }
            SerialCommand::Status => {
                self.send(SerialTag::DeviceInfo, &ctx.device_info())?;
            }
            SerialCommand::Config => {
                self.send(SerialTag::Config, &ctx.config().report())?;
            }
            SerialCommand::SetConfig(payload) => {
                self.set_config(&payload, ctx).await?;
            }
            SerialCommand::Test(button) => return Ok(CommandEffect::Test(button)),
            SerialCommand::ResetWifi => {
                if let Err(e) = ctx.store.reset_network_credentials().await {
                    self.respond(ResponseKind::Wifi, false, format!("{}", e), ctx.now)?;
                    return Ok(CommandEffect::None);
                }
                log::info!("WiFi credentials cleared, restarting");
                return Ok(CommandEffect::Restart);
            }
            SerialCommand::Wifi => {
                let wifi = ctx.wifi.report();
                let message = if wifi.connected {
                    format!("Connected to {} ({}), RSSI {} dBm", wifi.ssid, wifi.ip, wifi.rssi)
                } else {
                    String::from("Not connected")
                };
                self.respond(ResponseKind::Wifi, wifi.connected, message, ctx.now)?;
            }
            SerialCommand::Battery => {
                let message = format!("{:.2}V", ctx.supply_voltage);
                self.respond(ResponseKind::Battery, true, message, ctx.now)?;
            }
            SerialCommand::Help => {
                self.respond(ResponseKind::Help, true, SerialCommand::HELP_TEXT, ctx.now)?;
            }
        }
        Ok(CommandEffect::None)
    }

    /// Answer a line that was too long to keep
    pub fn reject_overflow(&mut self, keyword: &str, now: u64) -> Result<()> {
        let message = format!("Line exceeds {} bytes", MAX_LINE_LEN);
        let kind = if keyword == "SET_CONFIG" {
            ResponseKind::ConfigUpload
        } else {
            ResponseKind::Error
        };
        self.respond(kind, false, message, now)
    }

    /// Report the outcome of a `TEST:<n>` request
    pub fn report_test(&mut self, button: u8, result: &DispatchResult, now: u64) -> Result<()> {
        self.respond(
            ResponseKind::Test,
            !result.is_failure(),
            result.describe(button),
            now,
        )
    }

    async fn set_config<S>(&mut self, payload: &str, ctx: &mut DeviceContext<S>) -> Result<()>
    where
        S: LocalStorage,
    {
        // Parsed whole before anything is touched, so a bad document changes nothing
        let patch: ConfigPatch = match serde_json::from_str(payload) {
            Ok(patch) => patch,
            Err(e) => {
                log::warn!("Failed to parse configuration JSON: {}", e);
                return self.respond(ResponseKind::ConfigUpload, false, "Invalid JSON", ctx.now);
            }
        };

        match ctx.store.apply_patch(&patch).await {
            Ok(report) => {
                if report.network_changed {
                    ctx.schedule_restart();
                }
                let message = if report.warnings.is_empty() {
                    String::from("Configuration updated")
                } else {
                    format!(
                        "Configuration updated with {} warning(s): {}",
                        report.warnings.len(),
                        report.warnings[0]
                    )
                };
                self.respond(ResponseKind::ConfigUpload, true, message, ctx.now)
            }
            Err(e) => self.respond(ResponseKind::ConfigUpload, false, format!("{}", e), ctx.now),
        }
    }
}

#[cfg(test)]
mod tests {
    use patcom_api::message::split_line;
    use patcom_api::{ActionType, ValidationError};

    use crate::action::{DispatchError, SkipReason};
    use crate::device::DeviceSettings;
    use crate::mock::{HARDWARE_ID, MockSerial};
    use crate::storage::{CONFIG_KEY, ConfigStore, MemoryStorage};

    use super::*;

    async fn context() -> DeviceContext<MemoryStorage> {
        let mut store = ConfigStore::open(MemoryStorage::new(), HARDWARE_ID).await;
        let snapshot = store.current().clone();
        store.save(snapshot).await.unwrap();
        DeviceContext::new(store, DeviceSettings::default())
    }

    fn response(line: &str) -> serde_json::Value {
        let (tag, payload) = split_line(line).unwrap();
        assert_eq!(tag, SerialTag::Response);
        serde_json::from_str(payload).unwrap()
    }

    async fn run(
        channel: &mut SerialControlChannel<MockSerial>,
        ctx: &mut DeviceContext<MemoryStorage>,
        line: &str,
    ) -> CommandEffect {
        channel.handle_line(line, ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_invalid_json_leaves_store_untouched() {
        let mut ctx = context().await;
        let before = ctx.store.storage().raw(CONFIG_KEY).map(String::from);
        let mut channel = SerialControlChannel::new(MockSerial::new());

        run(&mut channel, &mut ctx, "SET_CONFIG:{not valid json}").await;

        let lines = channel.port().sent_lines();
        let json = response(&lines[0]);
        assert_eq!(json["type"], "config_upload");
        assert_eq!(json["success"], false);
        assert_eq!(ctx.store.storage().raw(CONFIG_KEY).map(String::from), before);
    }

    #[tokio::test]
    async fn test_set_config_applies_patch() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());

        run(
            &mut channel,
            &mut ctx,
            r#"SET_CONFIG:{"device":{"name":"Desk"},"buttons":[{"id":2,"action":"http","config":{"url":"http://hub/2"}}]}"#,
        )
        .await;

        let json = response(&channel.port().sent_lines()[0]);
        assert_eq!(json["success"], true);
        assert_eq!(ctx.identity().device_name, "Desk");
        assert_eq!(ctx.config().buttons[2].action, ActionType::Http);
        assert!(!ctx.restart_pending());
    }

    #[tokio::test]
    async fn test_network_change_schedules_restart() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());

        run(
            &mut channel,
            &mut ctx,
            r#"SET_CONFIG:{"network":{"ssid":"home","password":"pw"}}"#,
        )
        .await;

        assert_eq!(ctx.config().network.ssid, "home");
        assert!(ctx.restart_pending());
    }

    #[tokio::test]
    async fn test_identify_and_status() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());

        run(&mut channel, &mut ctx, "IDENTIFY").await;
        run(&mut channel, &mut ctx, "status").await;

        let lines = channel.port().sent_lines();
        let (tag, payload) = split_line(&lines[0]).unwrap();
        assert_eq!(tag, SerialTag::Identify);
        let identify: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(identify["device_id"], "PATCOM-ABC");
        assert_eq!(identify["connection"], "serial");

        let (tag, payload) = split_line(&lines[1]).unwrap();
        assert_eq!(tag, SerialTag::DeviceInfo);
        let info: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(info["config_hash"], ctx.store.current_hash().to_string());
    }

    #[tokio::test]
    async fn test_test_command_defers_to_loop() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());

        assert_eq!(run(&mut channel, &mut ctx, "TEST:3").await, CommandEffect::Test(3));
        assert!(channel.port().sent_lines().is_empty());

        channel
            .report_test(
                3,
                &DispatchResult::Skipped(SkipReason::Invalid(ValidationError::MissingUrl {
                    button: 3,
                })),
                5,
            )
            .unwrap();
        channel
            .report_test(4, &DispatchResult::Failed(DispatchError::Offline), 6)
            .unwrap();

        let lines = channel.port().sent_lines();
        assert_eq!(response(&lines[0])["success"], true);
        assert_eq!(response(&lines[1])["type"], "test");
        assert_eq!(response(&lines[1])["success"], false);
    }

    #[tokio::test]
    async fn test_bad_and_unknown_commands_answered() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());

        run(&mut channel, &mut ctx, "TEST:9").await;
        run(&mut channel, &mut ctx, "REBOOT").await;
        run(&mut channel, &mut ctx, "").await;

        let lines = channel.port().sent_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(response(&lines[0])["type"], "test");
        assert_eq!(response(&lines[1])["type"], "error");
        assert_eq!(response(&lines[1])["success"], false);
    }

    #[tokio::test]
    async fn test_reset_wifi_clears_credentials_silently() {
        let mut ctx = context().await;
        let mut channel = SerialControlChannel::new(MockSerial::new());
        run(
            &mut channel,
            &mut ctx,
            r#"SET_CONFIG:{"network":{"ssid":"home","password":"pw"}}"#,
        )
        .await;
        let answered = channel.port().sent_lines().len();

        assert_eq!(run(&mut channel, &mut ctx, "RESET_WIFI").await, CommandEffect::Restart);

        assert_eq!(channel.port().sent_lines().len(), answered);
        assert!(ctx.config().network.ssid.is_empty());
        assert!(ctx.config().network.password.is_empty());
    }

    #[test]
    fn test_poll_line_reads_queued_bytes() {
        let mut serial = MockSerial::new();
        serial.receive("HELP\r\nWIFI\nBAT");
        let mut channel = SerialControlChannel::new(serial);

        let complete = |line: &str| Some(SerialLine::Complete(String::from(line)));
        assert_eq!(channel.poll_line(), complete("HELP"));
        assert_eq!(channel.poll_line(), complete("WIFI"));
        assert_eq!(channel.poll_line(), None);
        channel.port_mut().receive("TERY\n");
        assert_eq!(channel.poll_line(), complete("BATTERY"));
    }

    #[test]
    fn test_oversized_lines_answered() {
        let mut channel = SerialControlChannel::new(MockSerial::new());

        channel.reject_overflow("SET_CONFIG", 7).unwrap();
        channel.reject_overflow("IDENTIFY", 8).unwrap();

        let lines = channel.port().sent_lines();
        let upload = response(&lines[0]);
        assert_eq!(upload["type"], "config_upload");
        assert_eq!(upload["success"], false);
        assert_eq!(response(&lines[1])["type"], "error");
    }
}
