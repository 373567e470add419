mod interfaces;
mod token;
mod transport;
mod urls;

use chrono::Utc;
use reqwest::Method;
use tokio::sync::Mutex;

use crate::config::{Action, ConnectionConfig};
use crate::error::{RequestError, TransportError};

pub use self::interfaces::{
    Attachment, AttachmentList, BulkPayload, EntityRecord, LoginDto, Operation, Response, Verb,
};
pub use self::token::TokenCache;
pub use self::transport::{Transport, TransportRequest, TransportResponse};
pub use self::urls::UrlBuilder;

pub type RequestOutcome = Result<Response, RequestError>;

/// Ensures a valid token, performs one request and interprets the result.
///
/// The token cache sits behind an async mutex that stays locked from the
/// validity check until a fresh token is stored, so concurrent callers share
/// a single authentication round-trip.
pub struct RequestPipeline<'a> {
    config: &'a ConnectionConfig,
    urls: UrlBuilder<'a>,
    transport: Transport,
    token: Mutex<TokenCache>,
}

impl<'a> RequestPipeline<'a> {
    pub fn new(config: &'a ConnectionConfig, user_agent: &str) -> Result<Self, TransportError> {
        Ok(Self {
            config,
            urls: UrlBuilder::new(config),
            transport: Transport::new(user_agent, config.request_timeout)?,
            token: Mutex::new(TokenCache::default()),
        })
    }

    pub const fn urls(&self) -> UrlBuilder<'a> {
        self.urls
    }

    pub fn auth_body(&self) -> LoginDto {
        LoginDto {
            login: self.config.username.clone(),
            password: self.config.password.clone(),
        }
    }

    /// Sends `body` (if any) to `url` and returns the parsed JSON of an
    /// HTTP 200 answer.
    pub async fn execute(
        &self,
        action: Action,
        url: &str,
        verb: Verb,
        body: Option<String>,
    ) -> RequestOutcome {
        let response = self.send_authorized(action, url, verb, body).await?;

        if response.status != 200 {
            tracing::warn!(%action, status = response.status, "Request was not successful");
            return Err(RequestError::HttpStatus {
                status: response.status,
                body: response.text(),
            });
        }

        let body = serde_json::from_slice(&response.body).map_err(|err| {
            tracing::error!(%action, error = %err, "Failed to parse response body as JSON");
            RequestError::JsonParse(err)
        })?;

        Ok(Response {
            status: response.status,
            body,
        })
    }

    /// GETs `url` and returns the body of an HTTP 200 answer untouched.
    pub async fn execute_raw(&self, action: Action, url: &str) -> Result<Vec<u8>, RequestError> {
        let response = self.send_authorized(action, url, Verb::Get, None).await?;

        if response.status != 200 {
            tracing::warn!(%action, status = response.status, "Download was not successful");
            return Err(RequestError::HttpStatus {
                status: response.status,
                body: response.text(),
            });
        }

        Ok(response.body)
    }

    async fn send_authorized(
        &self,
        action: Action,
        url: &str,
        verb: Verb,
        body: Option<String>,
    ) -> Result<TransportResponse, RequestError> {
        let token = self.ensure_token().await?;

        let mut headers = vec![("Cookie", format!("SMAX_AUTH_TOKEN={token}"))];
        if verb == Verb::Post {
            headers.push(("Content-Type", "application/json".to_string()));
        }

        tracing::info!(%action, %verb, url, "Sending request");

        let response = self
            .transport
            .send(TransportRequest {
                method: verb.into(),
                url,
                port: self.config.connect_port(),
                headers,
                body,
            })
            .await
            .map_err(|err| {
                tracing::error!(%action, error = %err, "Request failed");
                RequestError::Transport(err)
            })?;

        tracing::info!(%action, status = response.status, "Received response");

        Ok(response)
    }

    async fn ensure_token(&self) -> Result<String, RequestError> {
        let mut cache = self.token.lock().await;

        if cache.is_valid() {
            if let Some(token) = cache.token() {
                return Ok(token.to_string());
            }
        }

        tracing::info!("Getting a new token");

        let token = match self.authenticate().await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, "Failed to get a token");
                cache.invalidate();
                return Err(err);
            }
        };

        cache.store(token.clone(), Utc::now());

        if !cache.is_valid() {
            cache.invalidate();
            return Err(RequestError::Authentication {
                status: Some(200),
                reason: "authorization endpoint returned an unusable token".into(),
            });
        }

        Ok(token)
    }

    async fn authenticate(&self) -> Result<String, RequestError> {
        let body = serde_json::to_string(&self.auth_body()).map_err(|err| {
            RequestError::Authentication {
                status: None,
                reason: err.to_string(),
            }
        })?;
        let url = self.urls.authorization_url();

        let response = self
            .transport
            .send(TransportRequest {
                method: Method::POST,
                url: &url,
                port: self.config.secure_port,
                headers: vec![("Content-Type", "application/json".to_string())],
                body: Some(body),
            })
            .await
            .map_err(|err| RequestError::Authentication {
                status: None,
                reason: err.to_string(),
            })?;

        tracing::info!(status = response.status, "Authorization endpoint answered");

        if response.status != 200 {
            return Err(RequestError::Authentication {
                status: Some(response.status),
                reason: format!(
                    "authorization endpoint returned HTTP status {}",
                    response.status
                ),
            });
        }

        Ok(response.text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::fixtures::config;

    const AUTH_PATH: &str = "/auth/authentication-endpoint/authenticate/login";
    const ENTITY_PATH: &str = "/rest/123456789/ems/Request";

    fn local_config(port: u16, secure_port: u16, extra: &[&str]) -> ConnectionConfig {
        let port = port.to_string();
        let secure_port = secure_port.to_string();
        let mut args = vec![
            "--smax-protocol",
            "http",
            "--smax-host",
            "127.0.0.1",
            "--smax-port",
            port.as_str(),
            "--smax-secure-port",
            secure_port.as_str(),
        ];
        args.extend_from_slice(extra);
        config(&args)
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn mount_auth(server: &MockServer, status: u16, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .and(query_param("TENANTID", "123456789"))
            .and(body_json(json!({"login": "admin", "password": "secret"})))
            .respond_with(ResponseTemplate::new(status).set_body_string("token-123"))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn authenticates_once_then_reuses_cached_token() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        Mock::given(method("GET"))
            .and(path(ENTITY_PATH))
            .and(query_param("layout", "Id,DisplayLabel"))
            .and(header("Cookie", "SMAX_AUTH_TOKEN=token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": []})))
            .expect(2)
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let first = pipeline.execute(Action::Get, &url, Verb::Get, None).await.unwrap();
        let second = pipeline.execute(Action::Get, &url, Verb::Get, None).await.unwrap();

        assert_eq!(first.status, 200);
        assert_eq!(first.body, json!({"entities": []}));
        assert_eq!(first, second);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].url.path(), AUTH_PATH);
        assert_eq!(requests[1].url.path(), ENTITY_PATH);
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_authentication() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        Mock::given(method("GET"))
            .and(path(ENTITY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entities": []})))
            .expect(2)
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let (first, second) = tokio::join!(
            pipeline.execute(Action::Get, &url, Verb::Get, None),
            pipeline.execute(Action::Get, &url, Verb::Get, None),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn rejected_authentication_skips_main_request() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 401, 1).await;

        Mock::given(method("GET"))
            .and(path(ENTITY_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let err = pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::Authentication {
                status: Some(401),
                ..
            }
        ));
        assert!(pipeline.token.lock().await.token().is_none());
    }

    #[tokio::test]
    async fn unreachable_authorization_endpoint_is_an_authentication_error() {
        let server = MockServer::start().await;
        let config = local_config(server.address().port(), unused_port(), &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let err = pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RequestError::Authentication { status: None, .. }
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_body_is_a_parse_error() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        Mock::given(method("GET"))
            .and(path(ENTITY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not-json"))
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let err = pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::JsonParse(_)));
    }

    #[tokio::test]
    async fn non_200_status_is_reported_with_its_code() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        Mock::given(method("GET"))
            .and(path(ENTITY_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let err = pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await
            .unwrap_err();

        match err {
            RequestError::HttpStatus { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_main_port_is_a_transport_error() {
        let server = MockServer::start().await;
        mount_auth(&server, 200, 1).await;

        let config = local_config(unused_port(), server.address().port(), &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().entity_url(&config.layout);

        let err = pipeline
            .execute(Action::Get, &url, Verb::Get, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Transport(_)));
    }

    #[tokio::test]
    async fn post_carries_cookie_content_type_and_body() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        let payload = json!({
            "entities": [{"entity_type": "Request", "properties": {"Id": "42"}}],
            "operation": "UPDATE"
        });

        Mock::given(method("POST"))
            .and(path("/rest/123456789/ems/bulk"))
            .and(header("Cookie", "SMAX_AUTH_TOKEN=token-123"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(payload.clone()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"meta": {"completion_status": "OK"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().bulk_url();

        let response = pipeline
            .execute(Action::Update, &url, Verb::Post, Some(payload.to_string()))
            .await
            .unwrap();

        assert_eq!(response.body["meta"]["completion_status"], "OK");
    }

    #[tokio::test]
    async fn raw_download_returns_bytes() {
        let server = MockServer::start().await;
        let port = server.address().port();
        mount_auth(&server, 200, 1).await;

        Mock::given(method("GET"))
            .and(path("/rest/123456789/ems/frs/file-list/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8, 159, 146, 150]))
            .mount(&server)
            .await;

        let config = local_config(port, port, &[]);
        let pipeline = RequestPipeline::new(&config, "test").unwrap();
        let url = pipeline.urls().file_url("abc");

        let bytes = pipeline
            .execute_raw(Action::GetAttachments, &url)
            .await
            .unwrap();

        assert_eq!(bytes, vec![0_u8, 159, 146, 150]);
    }
}
