// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP agent transport for routing daemons (FRR, BIRD).
//!
//! The agent runs next to the daemon and accepts `POST /query/` with
//! `{"encoded": "<jwt>"}`. The token is an HS256 JWT signed with the
//! credential's password whose `payload` claim holds the command and whose
//! expiry is the request timeout. A 200 answer carries the output the same
//! way; 204 means the command produced nothing.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

use super::{Connection, Connector, DeviceTarget};
use crate::config::Settings;
use crate::inventory::format_socket_address;
use crate::shared::error::{AuthConfigError, ConnectionErrorKind, DeviceError};

/// Body of both agent requests and agent answers.
#[derive(Debug, Serialize, Deserialize)]
struct AgentEnvelope {
    encoded: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentClaims {
    payload: String,
    #[serde(default)]
    iat: i64,
    #[serde(default)]
    nbf: i64,
    exp: i64,
}

/// Sign `payload` with `secret`, valid for `lifetime`.
fn encode_payload(
    payload: &str,
    secret: &str,
    lifetime: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX).max(1);
    let claims = AgentClaims {
        payload: payload.to_string(),
        iat: now,
        nbf: now,
        exp: now.saturating_add(lifetime),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify `token` against `secret` and return its `payload` claim.
fn decode_payload(token: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let data = jsonwebtoken::decode::<AgentClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims.payload)
}

/// Issues agent requests over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpAgentConnector {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpAgentConnector {
    pub fn new(use_tls: bool, accept_invalid_certs: bool) -> Result<Self, DeviceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lookglass/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| {
                DeviceError::connection(
                    ConnectionErrorKind::Unknown,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            scheme: if use_tls { "https" } else { "http" },
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, DeviceError> {
        Self::new(
            settings.http_agent.use_tls,
            settings.http_agent.accept_invalid_certs,
        )
    }

    pub fn query_url(&self, address: &str, port: u16) -> String {
        format!(
            "{}://{}/query/",
            self.scheme,
            format_socket_address(address, port)
        )
    }
}

#[async_trait]
impl Connector for HttpAgentConnector {
    async fn connect(
        &self,
        target: &DeviceTarget,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, DeviceError> {
        let credential = &target.credential;
        let secret = credential
            .password
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AuthConfigError::MissingPassword {
                username: credential.username.clone(),
            })?;

        if let Some(proxy) = &target.proxy {
            return Err(DeviceError::connection(
                ConnectionErrorKind::Unknown,
                format!(
                    "HTTP agent on {} cannot be reached through proxy '{}'",
                    target.device.id, proxy.descriptor.id
                ),
            ));
        }

        Ok(Box::new(HttpAgentConnection {
            client: self.client.clone(),
            url: self.query_url(&target.device.address, target.device.port),
            secret: secret.clone(),
            timeout,
        }))
    }
}

/// A prepared request to one agent.
pub struct HttpAgentConnection {
    client: reqwest::Client,
    url: String,
    secret: Zeroizing<String>,
    timeout: Duration,
}

#[async_trait]
impl Connection for HttpAgentConnection {
    async fn execute(self: Box<Self>, command: &str) -> Result<Vec<u8>, DeviceError> {
        debug!("POST {}: {}", self.url, command);
        let encoded = encode_payload(command, &self.secret, self.timeout).map_err(|e| {
            DeviceError::Execution(format!("failed to sign agent request: {e}"))
        })?;

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&AgentEnvelope { encoded })
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(request_error)?;
        debug!("Agent {} answered {}", self.url, status);

        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(DeviceError::EmptyResponse);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DeviceError::connection(
                ConnectionErrorKind::AuthFailed,
                format!("agent rejected request ({status})"),
            ));
        }

        if status != reqwest::StatusCode::OK {
            let text = String::from_utf8_lossy(&body);
            return Err(DeviceError::Execution(format!(
                "agent returned {status}: {}",
                text.trim()
            )));
        }

        let envelope: AgentEnvelope = serde_json::from_slice(&body)
            .map_err(|e| DeviceError::Execution(format!("malformed agent response: {e}")))?;
        let output = decode_payload(&envelope.encoded, &self.secret).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => DeviceError::connection(
                    ConnectionErrorKind::AuthFailed,
                    "agent response signature does not match",
                ),
                _ => DeviceError::Execution(format!("invalid agent response token: {e}")),
            }
        })?;

        Ok(output.into_bytes())
    }
}

fn request_error(e: reqwest::Error) -> DeviceError {
    let kind = if e.is_timeout() {
        ConnectionErrorKind::Timeout
    } else if e.is_connect() {
        ConnectionErrorKind::Refused
    } else {
        ConnectionErrorKind::Unknown
    };
    DeviceError::connection(kind, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{CredentialMaterial, DeviceDescriptor, Platform, ProxyDescriptor};
    use crate::transport::ProxyTarget;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn target(port: u16, token: &str) -> DeviceTarget {
        let mut device = DeviceDescriptor::new("rs1", "127.0.0.1", Platform::Bird, "agent");
        device.port = port;
        DeviceTarget {
            device,
            credential: Arc::new(CredentialMaterial::password("agent", token)),
            proxy: None,
        }
    }

    /// Serve one canned HTTP response and return the raw request text.
    async fn serve_once(listener: TcpListener, status_line: &'static str, body: String) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let mut request = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        let response = format!(
            "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    }

    #[test]
    fn test_query_url() {
        let connector = HttpAgentConnector::new(true, false).unwrap();
        assert_eq!(
            connector.query_url("2001:db8::5", 8080),
            "https://[2001:db8::5]:8080/query/"
        );
        let plain = HttpAgentConnector::new(false, false).unwrap();
        assert_eq!(
            plain.query_url("rs1.example.net", 8001),
            "http://rs1.example.net:8001/query/"
        );
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let connector = HttpAgentConnector::new(false, false).unwrap();
        let err = connector
            .connect(&target(8080, ""), Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::AuthConfig(_)));
    }

    #[tokio::test]
    async fn test_proxy_is_refused() {
        let mut proxied = target(8080, "s3cret");
        proxied.proxy = Some(ProxyTarget {
            descriptor: ProxyDescriptor {
                id: "bastion".to_string(),
                address: "192.0.2.254".to_string(),
                port: 22,
                credential: "jump".to_string(),
            },
            credential: Arc::new(CredentialMaterial::password("jump", "x")),
        });

        let connector = HttpAgentConnector::new(false, false).unwrap();
        match connector.connect(&proxied, Duration::from_secs(1)).await {
            Err(DeviceError::Connection { detail, .. }) => assert!(detail.contains("bastion")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("proxied HTTP agent connection was accepted"),
        }
    }

    fn request_body(request: &str) -> AgentEnvelope {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn answer(output: &str, secret: &str) -> String {
        let encoded = encode_payload(output, secret, Duration::from_secs(30)).unwrap();
        serde_json::to_string(&AgentEnvelope { encoded }).unwrap()
    }

    async fn execute_against(
        status_line: &'static str,
        body: String,
        command: &str,
    ) -> (Result<Vec<u8>, DeviceError>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, status_line, body));

        let connector = HttpAgentConnector::new(false, false).unwrap();
        let conn = connector
            .connect(&target(port, "s3cret"), Duration::from_secs(5))
            .await
            .unwrap();
        let result = conn.execute(command).await;
        (result, server.await.unwrap())
    }

    #[test]
    fn test_payload_signing() {
        let token = encode_payload("show route", "s3cret", Duration::from_secs(10)).unwrap();
        assert_eq!(decode_payload(&token, "s3cret").unwrap(), "show route");

        let err = decode_payload(&token, "other").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
    }

    #[tokio::test]
    async fn test_execute_sends_signed_query() {
        let (result, request) = execute_against(
            "HTTP/1.1 200 OK",
            answer("BGP.as_path: 64500", "s3cret"),
            "birdc show route",
        )
        .await;
        assert_eq!(result.unwrap(), b"BGP.as_path: 64500");

        assert!(request.starts_with("POST /query/ HTTP/1.1"));
        let sent = request_body(&request);
        assert_eq!(decode_payload(&sent.encoded, "s3cret").unwrap(), "birdc show route");
    }

    #[tokio::test]
    async fn test_no_content_is_empty_response() {
        let (result, _) = execute_against("HTTP/1.1 204 No Content", String::new(), "show").await;
        assert!(matches!(result, Err(DeviceError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_answer_signed_with_other_secret_is_rejected() {
        let (result, _) =
            execute_against("HTTP/1.1 200 OK", answer("forged", "not-the-secret"), "show").await;
        match result {
            Err(DeviceError::Connection { kind, .. }) => {
                assert_eq!(kind, ConnectionErrorKind::AuthFailed)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_maps_error_status() {
        let (result, _) = execute_against(
            "HTTP/1.1 500 Internal Server Error",
            "birdc: not running".to_string(),
            "birdc show route",
        )
        .await;
        match result {
            Err(DeviceError::Execution(detail)) => assert!(detail.contains("birdc: not running")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
