use alloc::string::String;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Parse a configured method name; anything unrecognised means POST
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("GET") => HttpMethod::Get,
            Some(m) if m.eq_ignore_ascii_case("PUT") => HttpMethod::Put,
            Some(m) if m.eq_ignore_ascii_case("DELETE") => HttpMethod::Delete,
            _ => HttpMethod::Post,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP used by button actions
#[allow(async_fn_in_trait)]
pub trait HttpClient {
    type Error: core::fmt::Debug;

    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, Self::Error>;
}
