//! Error types for the smartvpn core
//!
//! Every concern owns a `thiserror` enum; `SmartVpnError` aggregates them
//! for callers that only need to report a failure.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the smartvpn crate
#[derive(Error, Debug)]
pub enum SmartVpnError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to credential storage
    #[error("Keyring error: {0}")]
    Keyring(#[from] KeyringError),

    /// Malformed probe setup (not a reachability failure)
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Errors reported by the local agent control channel
    #[error("Local agent error: {0}")]
    LocalAgent(#[from] LocalAgentError),

    /// Certificate refresh and credential errors
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Provider message codec and channel errors
    #[error("Provider message error: {0}")]
    ProviderMessage(#[from] ProviderMessageError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON errors (server descriptors, stored credentials)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ConfigValidationError),

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Validation errors for a loaded configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("No default ports configured for {0}")]
    EmptyPorts(String),

    #[error("Port 0 is not a valid probe target for {0}")]
    ZeroPort(String),

    #[error("probe timeout must be between 100 and 30000 ms, got {0}")]
    InvalidProbeTimeout(u64),

    #[error("WireGuard retry delay must be at most 10000 ms, got {0}")]
    InvalidRetryDelay(u64),

    #[error("statistics interval must be between 5 and 3600 seconds, got {0}")]
    InvalidStatisticsInterval(u64),

    #[error("statistics leeway ({leeway}s) must be smaller than the interval ({interval}s)")]
    LeewayTooLarge { leeway: u64, interval: u64 },

    #[error("local agent host must be host:port, got {0}")]
    InvalidAgentHost(String),
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Keyring service unavailable")]
    ServiceUnavailable,

    #[error("Failed to store credential in keyring")]
    StoreFailed,

    #[error("Failed to retrieve credential from keyring")]
    RetrieveFailed,

    #[error("Credential not found in keyring")]
    NotFound,

    #[error("Invalid credential format")]
    InvalidFormat,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
}

/// Malformed probe configuration
///
/// A probe that simply gets no answer is *not* an error; these variants
/// describe setups where no probe can be built at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("OpenVPN static key is not valid hex")]
    InvalidStaticKey,

    #[error("server has no usable X25519 public key")]
    MissingServerKey,

    #[error("failed to seal handshake field")]
    HandshakeEncryption,
}

/// Typed errors reported by the local agent control channel
///
/// Integer codes come from the transport; `from_code` returns `None` for
/// codes this client does not know about.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalAgentError {
    #[error("Too many sessions (unknown plan)")]
    MaxSessionsUnknown,
    #[error("Too many sessions (free plan)")]
    MaxSessionsFree,
    #[error("Too many sessions (basic plan)")]
    MaxSessionsBasic,
    #[error("Too many sessions (plus plan)")]
    MaxSessionsPlus,
    #[error("Too many sessions (visionary plan)")]
    MaxSessionsVisionary,
    #[error("Too many sessions (pro plan)")]
    MaxSessionsPro,
    #[error("Plan does not allow this server")]
    PolicyViolationLowPlan,
    #[error("Account is delinquent")]
    PolicyViolationDelinquent,
    #[error("Torrenting is not allowed on this server")]
    UserTorrentNotAllowed,
    #[error("Connection blocked due to bad behaviour")]
    UserBadBehavior,
    #[error("Guest session is not allowed")]
    GuestSession,
    #[error("Server error")]
    ServerError,
    #[error("Server is restricted")]
    RestrictedServer,
    #[error("Client certificate expired")]
    CertificateExpired,
    #[error("Client certificate revoked")]
    CertificateRevoked,
    #[error("Client certificate has a bad signature")]
    BadCertificateSignature,
    #[error("Client certificate not provided")]
    CertificateNotProvided,
    #[error("Server session does not match")]
    ServerSessionDoesNotMatch,
    #[error("Key used multiple times")]
    KeyUsedMultipleTimes,
}

impl LocalAgentError {
    /// Map a transport error code onto a typed error
    pub fn from_code(code: i64) -> Option<Self> {
        let error = match code {
            86100 => Self::MaxSessionsUnknown,
            86101 => Self::MaxSessionsFree,
            86102 => Self::MaxSessionsBasic,
            86103 => Self::MaxSessionsPlus,
            86104 => Self::MaxSessionsVisionary,
            86105 => Self::MaxSessionsPro,
            86111 => Self::PolicyViolationLowPlan,
            86112 => Self::PolicyViolationDelinquent,
            86113 => Self::UserTorrentNotAllowed,
            86114 => Self::UserBadBehavior,
            86115 => Self::GuestSession,
            86150 => Self::ServerError,
            86151 => Self::RestrictedServer,
            86202 => Self::CertificateExpired,
            86203 => Self::CertificateRevoked,
            86211 => Self::BadCertificateSignature,
            86212 => Self::CertificateNotProvided,
            86215 => Self::ServerSessionDoesNotMatch,
            86226 => Self::KeyUsedMultipleTimes,
            _ => return None,
        };
        Some(error)
    }
}

/// Failure to build a local agent connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("invalid client certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid agent host: {0}")]
    InvalidHost(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors on the provider message channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderMessageError {
    #[error("Failed to send provider message: {0}")]
    SendingError(String),

    #[error("Provider sent no response")]
    NoDataReceived,

    #[error("Unknown provider message code {0}")]
    UnknownCode(u8),

    #[error("Malformed provider message: {0}")]
    Decoding(String),
}

/// Certificate refresh and credential errors
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("Certificate refresh requires an active connection provider")]
    ProviderNotSet,

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Keys have been wiped and must be regenerated")]
    NeedNewKeys,

    #[error("Too many certificate requests{}", retry_hint(.retry_after))]
    TooManyCertRequests { retry_after: Option<Duration> },

    #[error("User credentials expired")]
    UserCredentialsExpired,

    #[error("User credentials missing")]
    UserCredentialsMissing,

    #[error("Failed to fork API session: {0}")]
    SessionFork(String),

    #[error("Provider message error: {0}")]
    Provider(#[from] ProviderMessageError),

    #[error("Credential storage error: {0}")]
    Storage(#[from] KeyringError),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {}s", d.as_secs()))
        .unwrap_or_default()
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SmartVpnError>;
