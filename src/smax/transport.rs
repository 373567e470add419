use std::time::Duration;

use reqwest::Method;

use crate::error::TransportError;

/// One outgoing HTTP exchange.
#[derive(Debug)]
pub struct TransportRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    /// Port the connection is opened on, whatever the url says.
    pub port: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Resolve, connect, write, read and shut down, once per call. Idle
/// connections are not kept, so nothing outlives a single exchange.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(0);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn send(
        &self,
        request: TransportRequest<'_>,
    ) -> Result<TransportResponse, TransportError> {
        let mut url = url::Url::parse(request.url).map_err(|source| TransportError::InvalidUrl {
            url: request.url.to_string(),
            source,
        })?;

        url.set_port(Some(request.port))
            .map_err(|()| TransportError::InvalidPort {
                url: request.url.to_string(),
                port: request.port,
            })?;

        let mut builder = self.client.request(request.method, url);

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse { status, body })
    }
}
