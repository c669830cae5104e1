use crate::application::ports::{OutboundRequest, Transport, TransportError, TransportResponse};
use crate::domain::value_objects::{HttpMethod, RequestBody, ResourceUrl};
use crate::shared::config::NetworkConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;

/// HTTP transport against the board API. Every request carries the caller's
/// bearer token; a timeout or connection failure is reported as
/// [`TransportError`], any status code as a response.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| AppError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, url: &ResourceUrl) -> String {
        format!("{}{}", self.base_url, url.as_key())
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(method(request.method), self.endpoint(&request.url));

        if let Some(auth) = &request.auth {
            builder = builder.bearer_auth(auth.bearer_token());
        }

        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Attachment(attachment)) => builder
                .header(CONTENT_TYPE, attachment.media_type.as_str())
                .header(
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", attachment.name),
                )
                .body(attachment.bytes.clone()),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        // The status line arrived, so the server has acted on the request.
        let body = match response.text().await {
            Ok(text) if text.trim().is_empty() => Value::Null,
            Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Err(err) => {
                tracing::warn!(
                    target: "sync::transport",
                    method = %request.method,
                    url = %request.url,
                    status,
                    error = %err,
                    "response body could not be read"
                );
                Value::Null
            }
        };

        tracing::trace!(
            target: "sync::transport",
            method = %request.method,
            url = %request.url,
            status,
            "response received"
        );
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::AuthContext;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(base_url: String) -> NetworkConfig {
        NetworkConfig {
            base_url,
            request_timeout: 5,
        }
    }

    fn get(raw: &str) -> OutboundRequest {
        OutboundRequest {
            method: HttpMethod::Get,
            url: ResourceUrl::parse(raw).unwrap(),
            body: None,
            auth: Some(AuthContext::new("t1".into()).unwrap()),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(&config(format!("http://{address}/api"))).unwrap();
        let result = transport.send(&get("/boards")).await;

        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }

    /// Answers one request with `raw` and returns what the client sent.
    async fn serve_once(raw: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buffer = [0u8; 1024];
            while !received.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&buffer[..read]);
            }
            socket.write_all(raw.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&received).to_ascii_lowercase()
        });

        (format!("http://{address}/api/"), server)
    }

    #[tokio::test]
    async fn status_and_json_body_are_returned() {
        let body = r#"{"error":"gone"}"#;
        let (base_url, server) = serve_once(format!(
            "HTTP/1.1 410 Gone\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

        let transport = ReqwestTransport::new(&config(base_url)).unwrap();
        let response = transport.send(&get("/boards/b1")).await.unwrap();

        assert_eq!(response.status, 410);
        assert_eq!(response.body, serde_json::json!({"error": "gone"}));
        let request = server.await.unwrap();
        assert!(request.starts_with("get /api/boards/b1 http/1.1"));
        assert!(request.contains("authorization: bearer t1"));
    }

    #[tokio::test]
    async fn truncated_body_still_reports_status() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 201 Created\r\ncontent-type: application/json\r\ncontent-length: 64\r\nconnection: close\r\n\r\n{\"id\":"
                .to_string(),
        )
        .await;

        let transport = ReqwestTransport::new(&config(base_url)).unwrap();
        let response = transport.send(&get("/boards")).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.body, Value::Null);
        server.await.unwrap();
    }
}
