use patcom_embedded::action::{HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Button actions sent for real through reqwest
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("patcom-mock/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    type Error = reqwest::Error;

    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, Self::Error> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::debug!("{} {}", request.method.as_str(), request.url);
        let response = builder.send().await?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
        })
    }
}
