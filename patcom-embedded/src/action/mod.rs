mod dispatcher;
mod http;

pub use dispatcher::{
    ActionDispatcher, DEFAULT_DISPATCH_TIMEOUT_MS, DispatchEnv, DispatchError, DispatchResult,
    SkipReason, WebhookEnvelope,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
