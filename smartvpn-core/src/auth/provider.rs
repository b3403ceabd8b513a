//! Message channel to the network extension process
//!
//! Requests and responses are single datagrams: one code byte followed by
//! an optional payload.

use crate::agent::VpnConnectionFeatures;
use crate::error::ProviderMessageError;
use crate::types::{SessionCookie, SessionSelector};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

const GET_RUNTIME_TUNNEL_CONFIGURATION: u8 = 0;
const FLUSH_LOGS_TO_FILE: u8 = 101;
const SET_API_SELECTOR: u8 = 102;
const REFRESH_CERTIFICATE: u8 = 103;
const CANCEL_REFRESHES: u8 = 104;
const RESTART_REFRESHES: u8 = 105;
const GET_CURRENT_LOGICAL_AND_SERVER_ID: u8 = 106;

const RESPONSE_OK: u8 = 0;
const RESPONSE_SESSION_EXPIRED: u8 = 1;
const RESPONSE_NEED_KEY_REGENERATION: u8 = 2;
const RESPONSE_TOO_MANY_CERT_REQUESTS: u8 = 3;
const RESPONSE_ERROR: u8 = 4;

#[derive(Debug, Clone)]
pub enum ProviderRequest {
    GetRuntimeTunnelConfiguration,
    FlushLogsToFile,
    /// Hand over a freshly forked API session
    SetApiSelector {
        selector: SessionSelector,
        session_cookie: Option<SessionCookie>,
    },
    /// Ask the extension to fetch a new certificate and store it
    RefreshCertificate {
        features: Option<VpnConnectionFeatures>,
    },
    /// Pause the extension's own refresh timers
    CancelRefreshes,
    RestartRefreshes,
    GetCurrentLogicalAndServerId,
}

#[derive(Deserialize)]
struct ApiSelectorPayload {
    selector: String,
    #[serde(rename = "sessionCookie")]
    session_cookie: serde_json::Value,
}

impl ProviderRequest {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::GetRuntimeTunnelConfiguration => vec![GET_RUNTIME_TUNNEL_CONFIGURATION],
            Self::FlushLogsToFile => vec![FLUSH_LOGS_TO_FILE],
            Self::SetApiSelector {
                selector,
                session_cookie,
            } => {
                let cookie = session_cookie
                    .as_ref()
                    .and_then(|cookie| serde_json::to_value(cookie).ok())
                    .unwrap_or_else(|| serde_json::json!({}));
                let payload = serde_json::json!({
                    "selector": selector.expose(),
                    "sessionCookie": cookie,
                });
                with_payload(SET_API_SELECTOR, serde_json::to_vec(&payload))
            }
            Self::RefreshCertificate { features: None } => vec![REFRESH_CERTIFICATE],
            Self::RefreshCertificate {
                features: Some(features),
            } => with_payload(REFRESH_CERTIFICATE, serde_json::to_vec(features)),
            Self::CancelRefreshes => vec![CANCEL_REFRESHES],
            Self::RestartRefreshes => vec![RESTART_REFRESHES],
            Self::GetCurrentLogicalAndServerId => vec![GET_CURRENT_LOGICAL_AND_SERVER_ID],
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProviderMessageError> {
        let (&code, payload) = data
            .split_first()
            .ok_or(ProviderMessageError::NoDataReceived)?;

        match code {
            GET_RUNTIME_TUNNEL_CONFIGURATION => Ok(Self::GetRuntimeTunnelConfiguration),
            FLUSH_LOGS_TO_FILE => Ok(Self::FlushLogsToFile),
            SET_API_SELECTOR => {
                let payload: ApiSelectorPayload = serde_json::from_slice(payload)
                    .map_err(|e| ProviderMessageError::Decoding(e.to_string()))?;
                Ok(Self::SetApiSelector {
                    selector: SessionSelector::new(payload.selector),
                    session_cookie: serde_json::from_value(payload.session_cookie).ok(),
                })
            }
            // Undecodable features degrade to a plain refresh
            REFRESH_CERTIFICATE => Ok(Self::RefreshCertificate {
                features: serde_json::from_slice(payload).ok(),
            }),
            CANCEL_REFRESHES => Ok(Self::CancelRefreshes),
            RESTART_REFRESHES => Ok(Self::RestartRefreshes),
            GET_CURRENT_LOGICAL_AND_SERVER_ID => Ok(Self::GetCurrentLogicalAndServerId),
            other => Err(ProviderMessageError::UnknownCode(other)),
        }
    }
}

fn with_payload(code: u8, payload: serde_json::Result<Vec<u8>>) -> Vec<u8> {
    let mut data = vec![code];
    match payload {
        Ok(payload) => data.extend(payload),
        Err(e) => warn!(code, "Failed to encode provider message payload: {}", e),
    }
    data
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    Ok(Option<Vec<u8>>),
    SessionExpired,
    NeedKeyRegeneration,
    /// Retry hint in seconds when the extension has one
    TooManyCertRequests { retry_after: Option<i64> },
    Error(String),
}

impl ProviderResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Ok(data) => {
                let mut encoded = vec![RESPONSE_OK];
                if let Some(data) = data {
                    encoded.extend_from_slice(data);
                }
                encoded
            }
            Self::SessionExpired => vec![RESPONSE_SESSION_EXPIRED],
            Self::NeedKeyRegeneration => vec![RESPONSE_NEED_KEY_REGENERATION],
            Self::TooManyCertRequests { retry_after } => {
                let mut encoded = vec![RESPONSE_TOO_MANY_CERT_REQUESTS];
                if let Some(retry_after) = retry_after {
                    encoded.extend_from_slice(&retry_after.to_le_bytes());
                }
                encoded
            }
            Self::Error(message) => {
                let mut encoded = vec![RESPONSE_ERROR];
                encoded.extend_from_slice(message.as_bytes());
                encoded
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProviderMessageError> {
        let (&code, payload) = data
            .split_first()
            .ok_or(ProviderMessageError::NoDataReceived)?;

        match code {
            RESPONSE_OK => Ok(Self::Ok((!payload.is_empty()).then(|| payload.to_vec()))),
            RESPONSE_SESSION_EXPIRED => Ok(Self::SessionExpired),
            RESPONSE_NEED_KEY_REGENERATION => Ok(Self::NeedKeyRegeneration),
            RESPONSE_TOO_MANY_CERT_REQUESTS => Ok(Self::TooManyCertRequests {
                retry_after: <[u8; 8]>::try_from(payload).ok().map(i64::from_le_bytes),
            }),
            RESPONSE_ERROR => Ok(Self::Error(String::from_utf8_lossy(payload).into_owned())),
            other => Err(ProviderMessageError::UnknownCode(other)),
        }
    }
}

/// Sends datagrams to the extension and waits for its answer
#[async_trait]
pub trait ProviderMessageSender: Send + Sync {
    async fn send_data(&self, data: Vec<u8>) -> Result<Vec<u8>, ProviderMessageError>;

    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderMessageError> {
        let response = self.send_data(request.encode()).await?;
        ProviderResponse::decode(&response)
    }
}
