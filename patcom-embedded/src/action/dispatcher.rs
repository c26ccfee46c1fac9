use alloc::format;
use alloc::string::String;
use alloc::vec;

use embassy_time::{Duration, with_timeout};
use serde::Serialize;

use patcom_api::validation::{ValidationError, validate_button};
use patcom_api::{
    ActionType, ButtonSlot, Credentials, DeviceIdentity, FIRMWARE_VERSION, PARAM_BODY,
    PARAM_METHOD, PARAM_SECRET,
};

use super::http::{HttpClient, HttpMethod, HttpRequest};

/// Upper bound on one action's network call
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 5000;

const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoAction,
    /// Stored despite this problem; the button behaves as if it had no action
    Invalid(ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// WiFi is down
    Offline,
    Timeout,
    /// Request could not be built or sent
    Transport,
    /// Target answered outside 2xx
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Skipped(SkipReason),
    Success { status: u16 },
    Failed(DispatchError),
}

impl DispatchResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchResult::Failed(_))
    }

    /// One-line summary for serial responses and logs
    pub fn describe(&self, button_id: u8) -> String {
        match self {
            DispatchResult::Skipped(SkipReason::Disabled) => {
                format!("Button {} is disabled", button_id)
            }
            DispatchResult::Skipped(SkipReason::NoAction) => {
                format!("No action configured for button {}", button_id)
            }
            DispatchResult::Skipped(SkipReason::Invalid(e)) => format!("Skipped: {}", e),
            DispatchResult::Success { status } => {
                format!("Button {} triggered, response {}", button_id, status)
            }
            DispatchResult::Failed(DispatchError::Offline) => {
                String::from("WiFi not connected, action not sent")
            }
            DispatchResult::Failed(DispatchError::Timeout) => String::from("Action timed out"),
            DispatchResult::Failed(DispatchError::Transport) => String::from("Action request failed"),
            DispatchResult::Failed(DispatchError::Status(status)) => {
                format!("Action failed with status {}", status)
            }
        }
    }
}

/// Device state an action needs besides the button itself
pub struct DispatchEnv<'a> {
    pub identity: &'a DeviceIdentity,
    pub credentials: &'a Credentials,
    pub supply_voltage: f32,
    pub timestamp: u64,
    pub online: bool,
}

/// Fixed body posted by webhook actions
#[derive(Debug, Serialize)]
pub struct WebhookEnvelope<'a> {
    pub device_id: &'a str,
    pub device_name: &'a str,
    pub button: u8,
    pub button_name: &'a str,
    pub timestamp: u64,
    pub battery: f32,
}

pub struct ActionDispatcher<H> {
    client: H,
    timeout: Duration,
}

impl<H> ActionDispatcher<H>
where
    H: HttpClient,
{
    pub fn new(client: H, timeout_ms: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn client(&self) -> &H {
        &self.client
    }

    /// Run the action configured on `slot`. Never retries.
    pub async fn dispatch(
        &mut self,
        button_id: u8,
        slot: &ButtonSlot,
        env: &DispatchEnv<'_>,
    ) -> DispatchResult {
        if !slot.enabled {
            return DispatchResult::Skipped(SkipReason::Disabled);
        }
        if slot.action == ActionType::None {
            return DispatchResult::Skipped(SkipReason::NoAction);
        }
        if let Some(e @ (ValidationError::MissingUrl { .. } | ValidationError::InvalidUrl { .. })) =
            validate_button(slot)
        {
            log::warn!("Button {}: {}", button_id, e);
            return DispatchResult::Skipped(SkipReason::Invalid(e));
        }
        if !env.online {
            log::warn!("WiFi not connected, cannot run action of button {}", button_id);
            return DispatchResult::Failed(DispatchError::Offline);
        }

        let Some(request) = build_request(button_id, slot, env) else {
            return DispatchResult::Failed(DispatchError::Transport);
        };

        match with_timeout(self.timeout, self.client.send(&request)).await {
            Ok(Ok(response)) if response.is_success() => {
                log::info!(
                    "{} {} -> {}",
                    request.method.as_str(),
                    request.url,
                    response.status
                );
                DispatchResult::Success {
                    status: response.status,
                }
            }
            Ok(Ok(response)) => {
                log::warn!(
                    "{} {} -> {}",
                    request.method.as_str(),
                    request.url,
                    response.status
                );
                DispatchResult::Failed(DispatchError::Status(response.status))
            }
            Ok(Err(e)) => {
                log::warn!("Request for button {} failed: {:?}", button_id, e);
                DispatchResult::Failed(DispatchError::Transport)
            }
            Err(_) => {
                log::warn!("Request for button {} timed out", button_id);
                DispatchResult::Failed(DispatchError::Timeout)
            }
        }
    }
}

/// Request for an HTTP or webhook slot, with `{{name}}` placeholders resolved
pub fn build_request(button_id: u8, slot: &ButtonSlot, env: &DispatchEnv<'_>) -> Option<HttpRequest> {
    let credentials = env.credentials;
    let url = credentials.resolve(slot.url()?);

    let mut headers = vec![
        (String::from("Content-Type"), String::from("application/json")),
        (String::from("User-Agent"), format!("PATCOM/{}", FIRMWARE_VERSION)),
    ];
    headers.extend(
        slot.params
            .headers()
            .map(|(name, value)| (String::from(name), credentials.resolve(value))),
    );

    match slot.action {
        ActionType::Http => {
            let method = HttpMethod::from_param(slot.params.get(PARAM_METHOD));
            let body = method
                .has_body()
                .then(|| credentials.resolve(slot.params.get(PARAM_BODY).unwrap_or("")));
            Some(HttpRequest {
                method,
                url,
                headers,
                body,
            })
        }
        ActionType::Webhook => {
            if let Some(secret) = slot.params.get(PARAM_SECRET).filter(|s| !s.is_empty()) {
                headers.push((
                    String::from(WEBHOOK_SECRET_HEADER),
                    credentials.resolve(secret),
                ));
            }
            let envelope = WebhookEnvelope {
                device_id: &env.identity.device_id,
                device_name: &env.identity.device_name,
                button: button_id,
                button_name: &slot.name,
                timestamp: env.timestamp,
                battery: env.supply_voltage,
            };
            let body = serde_json::to_string(&envelope).ok()?;
            Some(HttpRequest {
                method: HttpMethod::Post,
                url,
                headers,
                body: Some(body),
            })
        }
        ActionType::None => None,
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use patcom_api::{ActionParams, PARAM_URL};

    use super::super::http::HttpResponse;
    use super::*;

    #[derive(Debug)]
    struct Unreachable;

    enum Reply {
        Status(u16),
        Fail,
        Hang,
    }

    struct MockHttp {
        reply: Reply,
        sent: Vec<HttpRequest>,
    }

    impl MockHttp {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                sent: Vec::new(),
            }
        }
    }

    impl HttpClient for MockHttp {
        type Error = Unreachable;

        async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, Self::Error> {
            self.sent.push(request.clone());
            match self.reply {
                Reply::Status(status) => Ok(HttpResponse { status }),
                Reply::Fail => Err(Unreachable),
                Reply::Hang => core::future::pending().await,
            }
        }
    }

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            device_id: "PATCOM-ABC".into(),
            device_name: "Desk".into(),
            ..Default::default()
        }
    }

    fn slot(action: ActionType, params: &[(&str, &str)]) -> ButtonSlot {
        let mut slot = ButtonSlot::new(3);
        slot.action = action;
        slot.params = params
            .iter()
            .try_fold(ActionParams::new(), |p, (k, v)| p.with(*k, *v))
            .unwrap();
        slot
    }

    async fn run(
        http: &mut ActionDispatcher<MockHttp>,
        slot: &ButtonSlot,
        credentials: &Credentials,
        online: bool,
    ) -> DispatchResult {
        let identity = identity();
        let env = DispatchEnv {
            identity: &identity,
            credentials,
            supply_voltage: 8.4,
            timestamp: 1234,
            online,
        };
        http.dispatch(3, slot, &env).await
    }

    #[tokio::test]
    async fn test_skips_without_network_call() {
        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Status(200)), 1000);
        let credentials = Credentials::new();

        let empty_url = slot(ActionType::Http, &[(PARAM_URL, "")]);
        assert_eq!(
            run(&mut dispatcher, &empty_url, &credentials, true).await,
            DispatchResult::Skipped(SkipReason::Invalid(ValidationError::MissingUrl {
                button: 3
            }))
        );

        let mut disabled = slot(ActionType::Http, &[(PARAM_URL, "http://hub")]);
        disabled.enabled = false;
        assert_eq!(
            run(&mut dispatcher, &disabled, &credentials, true).await,
            DispatchResult::Skipped(SkipReason::Disabled)
        );

        let none = slot(ActionType::None, &[]);
        assert_eq!(
            run(&mut dispatcher, &none, &credentials, true).await,
            DispatchResult::Skipped(SkipReason::NoAction)
        );

        assert!(dispatcher.client().sent.is_empty());
    }

    #[tokio::test]
    async fn test_http_action_with_credentials() {
        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Status(204)), 1000);
        let mut credentials = Credentials::new();
        credentials.insert("token", "s3cret").unwrap();
        let slot = slot(
            ActionType::Http,
            &[
                (PARAM_URL, "http://hub/scene?key={{token}}"),
                (PARAM_METHOD, "put"),
                (PARAM_BODY, "{\"on\":true}"),
                ("header.Authorization", "Bearer {{token}}"),
            ],
        );

        let result = run(&mut dispatcher, &slot, &credentials, true).await;

        assert_eq!(result, DispatchResult::Success { status: 204 });
        let request = &dispatcher.client().sent[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, "http://hub/scene?key=s3cret");
        assert_eq!(request.body.as_deref(), Some("{\"on\":true}"));
        assert_eq!(request.header("authorization"), Some("Bearer s3cret"));
        assert_eq!(request.header("User-Agent"), Some("PATCOM/2.1.0"));
    }

    #[tokio::test]
    async fn test_webhook_envelope_and_secret() {
        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Status(200)), 1000);
        let slot = slot(
            ActionType::Webhook,
            &[(PARAM_URL, "https://hooks/abc"), (PARAM_SECRET, "shh")],
        );

        let result = run(&mut dispatcher, &slot, &Credentials::new(), true).await;

        assert_eq!(result, DispatchResult::Success { status: 200 });
        let request = &dispatcher.client().sent[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.header("X-Webhook-Secret"), Some("shh"));
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["device_id"], "PATCOM-ABC");
        assert_eq!(body["button"], 3);
        assert_eq!(body["button_name"], "Button 3");
        assert_eq!(body["timestamp"], 1234);
    }

    #[tokio::test]
    async fn test_failures_reported() {
        let target = slot(ActionType::Http, &[(PARAM_URL, "http://hub")]);
        let credentials = Credentials::new();

        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Status(500)), 1000);
        assert_eq!(
            run(&mut dispatcher, &target, &credentials, true).await,
            DispatchResult::Failed(DispatchError::Status(500))
        );

        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Fail), 1000);
        assert_eq!(
            run(&mut dispatcher, &target, &credentials, true).await,
            DispatchResult::Failed(DispatchError::Transport)
        );

        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Status(200)), 1000);
        assert_eq!(
            run(&mut dispatcher, &target, &credentials, false).await,
            DispatchResult::Failed(DispatchError::Offline)
        );
        assert!(dispatcher.client().sent.is_empty());
    }

    #[tokio::test]
    async fn test_hanging_request_times_out() {
        let mut dispatcher = ActionDispatcher::new(MockHttp::new(Reply::Hang), 20);
        let target = slot(ActionType::Http, &[(PARAM_URL, "http://hub")]);

        let result = run(&mut dispatcher, &target, &Credentials::new(), true).await;

        assert_eq!(result, DispatchResult::Failed(DispatchError::Timeout));
    }
}
