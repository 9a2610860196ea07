use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::model::{HttpMethod, TestConfig};

/// One request as handed to a [`Transport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Per-request timeout, enforced by the transport.
    pub timeout: Duration,
}

impl TransportRequest {
    /// The request every index of a run sends.
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            method: config.method,
            url: config.target.clone(),
            headers: config.headers.clone(),
            body: config.body.clone(),
            timeout: config.timeout(),
        }
    }
}

/// A response received from the target, whatever its status code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportResponse {
    pub status: u16,
    /// Response headers as a flat key/value map.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Connection-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Aborted,
    HostNotFound,
    TimedOut,
    Other,
}

impl TransportErrorKind {
    /// Conventional reason code, if the category has one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            TransportErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
            TransportErrorKind::ConnectionReset => Some("ECONNRESET"),
            TransportErrorKind::Aborted => Some("ECONNABORTED"),
            TransportErrorKind::HostNotFound => Some("ENOTFOUND"),
            TransportErrorKind::TimedOut => Some("ETIMEDOUT"),
            TransportErrorKind::Other => None,
        }
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The literal string recorded on a result: the reason code where one
    /// exists, the underlying message otherwise.
    pub fn reason(&self) -> String {
        match self.kind.code() {
            Some(code) => code.to_string(),
            None => self.message.clone(),
        }
    }
}

/// Performs one timed request/response exchange against the target.
///
/// Implementations must report status >= 400 as `Ok`; only failures where no
/// response was received are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}
