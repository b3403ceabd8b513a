//! Integration tests for certificate management through the extension
//!
//! The provider double plays the network extension: it answers with
//! scripted responses and, like the real extension, writes an issued
//! certificate into the shared storage before answering `Ok`.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use smartvpn_core::agent::{NatType, NetShieldType, VpnConnectionFeatures};
use smartvpn_core::auth::{
    CertificateKeyExtractor, MemoryStore, PlanEvent, ProviderMessageSender, ProviderRequest,
    ProviderResponse, SessionService, VpnAuthenticationRemoteClient, VpnAuthenticationStorage,
    VpnCertificate,
};
use smartvpn_core::config::FeatureFlags;
use smartvpn_core::error::{AuthenticationError, ProviderMessageError};
use smartvpn_core::types::{SessionCookie, SessionSelector};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SET_API_SELECTOR: u8 = 102;
const REFRESH_CERTIFICATE: u8 = 103;
const CANCEL_REFRESHES: u8 = 104;
const RESTART_REFRESHES: u8 = 105;

struct MockProvider {
    store: Arc<MemoryStore>,
    refresh_responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<u8>>,
    issued: AtomicUsize,
}

impl MockProvider {
    fn new(store: Arc<MemoryStore>, refresh_responses: Vec<ProviderResponse>) -> Self {
        Self {
            store,
            refresh_responses: Mutex::new(refresh_responses.into()),
            requests: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
        }
    }

    fn request_codes(&self) -> Vec<u8> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderMessageSender for MockProvider {
    async fn send_data(&self, data: Vec<u8>) -> Result<Vec<u8>, ProviderMessageError> {
        let request = ProviderRequest::decode(&data)?;
        self.requests.lock().unwrap().push(data[0]);

        let response = match request {
            ProviderRequest::RefreshCertificate { features } => {
                let response = self
                    .refresh_responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(ProviderResponse::Ok(None));
                if matches!(response, ProviderResponse::Ok(_)) {
                    let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                    let certificate = certificate(&format!("issued-{}", n), ChronoDuration::days(1));
                    self.store
                        .store_certificate(&certificate, features.as_ref())
                        .unwrap();
                }
                response
            }
            _ => ProviderResponse::Ok(None),
        };
        Ok(response.encode())
    }
}

#[derive(Default)]
struct MockSessions {
    forks: AtomicUsize,
}

#[async_trait]
impl SessionService for MockSessions {
    async fn extension_session_selector(&self) -> Result<SessionSelector, AuthenticationError> {
        let n = self.forks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionSelector::new(format!("selector-{}", n)))
    }

    fn session_cookie(&self) -> Option<SessionCookie> {
        None
    }
}

/// Reports the same public key for every certificate
struct FixedKeyExtractor(Option<Vec<u8>>);

impl CertificateKeyExtractor for FixedKeyExtractor {
    fn public_key(&self, _certificate_pem: &str) -> Option<Vec<u8>> {
        self.0.clone()
    }
}

struct Fixture {
    client: VpnAuthenticationRemoteClient,
    store: Arc<MemoryStore>,
    sessions: Arc<MockSessions>,
}

impl Fixture {
    /// Client whose certificates carry no readable public key
    fn new() -> Self {
        Self::with_extractor(FixedKeyExtractor(None))
    }

    fn with_extractor(extractor: FixedKeyExtractor) -> Self {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MockSessions::default());
        let client = VpnAuthenticationRemoteClient::new(sessions.clone(), store.clone())
            .with_key_extractor(Arc::new(extractor));
        Self {
            client,
            store,
            sessions,
        }
    }

    fn attach_provider(&self, refresh_responses: Vec<ProviderResponse>) -> Arc<MockProvider> {
        let provider = Arc::new(MockProvider::new(self.store.clone(), refresh_responses));
        self.client.set_connection_provider(Some(provider.clone()));
        provider
    }

    /// Store keys and a certificate with the given remaining validity
    fn seed(&self, valid_for: ChronoDuration, features: Option<&VpnConnectionFeatures>) {
        self.store.get_keys().unwrap();
        self.store
            .store_certificate(&certificate("stored", valid_for), features)
            .unwrap();
    }
}

fn certificate(name: &str, valid_for: ChronoDuration) -> VpnCertificate {
    let now = Utc::now();
    VpnCertificate {
        certificate: name.to_string(),
        valid_until: now + valid_for,
        refresh_time: now + valid_for / 2,
    }
}

fn features(netshield: NetShieldType, safe_mode: Option<bool>) -> VpnConnectionFeatures {
    VpnConnectionFeatures {
        netshield,
        vpn_accelerator: true,
        bouncing: None,
        nat_type: NatType::Strict,
        safe_mode,
    }
}

#[tokio::test]
async fn test_valid_stored_certificate_is_used() {
    // Given: valid stored credentials and no provider
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::days(1), None);

    // When: loading authentication data
    let data = fixture.client.load_authentication_data(None).await.unwrap();

    // Then: the stored certificate comes back without a refresh
    assert_eq!(data.client_certificate, "stored");
    let keys = fixture.store.get_stored_keys().unwrap().unwrap();
    assert_eq!(data.client_key.expose(), keys.private_key().expose());
}

#[tokio::test]
async fn test_certificate_for_other_keys_is_replaced() {
    // Given: a stored certificate issued for a different public key
    let fixture = Fixture::with_extractor(FixedKeyExtractor(Some(vec![7; 32])));
    fixture.seed(ChronoDuration::days(1), None);
    let provider = fixture.attach_provider(vec![]);

    // When: loading authentication data
    let data = fixture.client.load_authentication_data(None).await.unwrap();

    // Then: a new certificate was requested
    assert_eq!(data.client_certificate, "issued-1");
    assert_eq!(provider.request_codes(), vec![REFRESH_CERTIFICATE]);
}

#[tokio::test]
async fn test_certificate_without_keys_is_dropped() {
    // Given: a stored certificate but no keys
    let fixture = Fixture::new();
    fixture
        .store
        .store_certificate(&certificate("orphan", ChronoDuration::days(1)), None)
        .unwrap();

    // When: loading authentication data without a provider
    let result = fixture.client.load_authentication_data(None).await;

    // Then: the orphan is deleted and the refresh fails for lack of a provider
    assert!(matches!(result, Err(AuthenticationError::ProviderNotSet)));
    assert!(fixture.store.get_stored_certificate().unwrap().is_none());
}

#[tokio::test]
async fn test_expired_certificate_is_refreshed() {
    // Given: a certificate that expired an hour ago
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::hours(-1), None);
    let provider = fixture.attach_provider(vec![]);

    // When: loading authentication data
    let data = fixture.client.load_authentication_data(None).await.unwrap();

    // Then: the certificate was refreshed
    assert_eq!(data.client_certificate, "issued-1");
    assert_eq!(provider.request_codes(), vec![REFRESH_CERTIFICATE]);
}

#[tokio::test]
async fn test_feature_change_triggers_refresh() {
    // Given: a certificate issued with NetShield level 1
    let fixture = Fixture::new();
    let stored = features(NetShieldType::Level1, None);
    fixture.seed(ChronoDuration::days(1), Some(&stored));
    let provider = fixture.attach_provider(vec![]);

    // When: connecting with NetShield level 2
    let requested = features(NetShieldType::Level2, None);
    let data = fixture
        .client
        .load_authentication_data(Some(&requested))
        .await
        .unwrap();

    // Then: a certificate with the new features is requested and stored
    assert_eq!(data.client_certificate, "issued-1");
    assert_eq!(provider.request_codes(), vec![REFRESH_CERTIFICATE]);
    assert_eq!(
        fixture.store.get_stored_certificate_features().unwrap(),
        Some(requested)
    );
}

#[tokio::test]
async fn test_safe_mode_only_matters_when_enabled() {
    // Given: a certificate issued with safe mode on
    let fixture = Fixture::new();
    fixture.seed(
        ChronoDuration::days(1),
        Some(&features(NetShieldType::Level1, Some(true))),
    );
    let provider = fixture.attach_provider(vec![]);
    let requested = features(NetShieldType::Level1, Some(false));

    // When: the safe mode flag is off
    let data = fixture
        .client
        .load_authentication_data(Some(&requested))
        .await
        .unwrap();

    // Then: the stored certificate is still good
    assert_eq!(data.client_certificate, "stored");
    assert!(provider.request_codes().is_empty());

    // When: the safe mode flag is on
    fixture.client.set_feature_flags(FeatureFlags {
        safe_mode: true,
        ..FeatureFlags::default()
    });
    let data = fixture
        .client
        .load_authentication_data(Some(&requested))
        .await
        .unwrap();

    // Then: the differing safe mode forces a refresh
    assert_eq!(data.client_certificate, "issued-1");
}

#[tokio::test]
async fn test_expired_session_is_forked_once() {
    // Given: the extension session expired once
    let fixture = Fixture::new();
    fixture.store.get_keys().unwrap();
    let provider = fixture.attach_provider(vec![ProviderResponse::SessionExpired]);

    // When: refreshing
    let data = fixture.client.refresh_certificates(None).await.unwrap();

    // Then: a forked session was handed over and the retry succeeded
    assert_eq!(data.client_certificate, "issued-1");
    assert_eq!(fixture.sessions.forks.load(Ordering::SeqCst), 1);
    assert_eq!(
        provider.request_codes(),
        vec![REFRESH_CERTIFICATE, SET_API_SELECTOR, REFRESH_CERTIFICATE]
    );
}

#[tokio::test]
async fn test_session_expired_twice_fails() {
    // Given: the extension session stays expired
    let fixture = Fixture::new();
    fixture.store.get_keys().unwrap();
    let provider = fixture.attach_provider(vec![
        ProviderResponse::SessionExpired,
        ProviderResponse::SessionExpired,
    ]);

    // When: refreshing
    let result = fixture.client.refresh_certificates(None).await;

    // Then: the user has to log in again and only one fork happened
    assert!(matches!(result, Err(AuthenticationError::UserCredentialsExpired)));
    assert_eq!(fixture.sessions.forks.load(Ordering::SeqCst), 1);
    assert_eq!(provider.request_codes().len(), 3);
}

#[tokio::test]
async fn test_key_regeneration_wipes_credentials() {
    // Given: stored credentials and an extension asking for new keys
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::days(1), None);
    fixture.attach_provider(vec![ProviderResponse::NeedKeyRegeneration]);

    // When: refreshing
    let result = fixture.client.refresh_certificates(None).await;

    // Then: keys and certificate are gone
    assert!(matches!(result, Err(AuthenticationError::NeedNewKeys)));
    assert!(fixture.store.get_stored_keys().unwrap().is_none());
    assert!(fixture.store.get_stored_certificate().unwrap().is_none());
}

#[tokio::test]
async fn test_rate_limit_carries_retry_hint() {
    // Given: the extension is rate limited for 30 seconds
    let fixture = Fixture::new();
    fixture.attach_provider(vec![ProviderResponse::TooManyCertRequests {
        retry_after: Some(30),
    }]);

    // When: refreshing
    let result = fixture.client.refresh_certificates(None).await;

    // Then: the hint is surfaced as a duration
    match result {
        Err(AuthenticationError::TooManyCertRequests { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("unexpected result: {:?}", other.map(|d| d.client_certificate)),
    }
}

#[tokio::test]
async fn test_remote_error_is_surfaced() {
    // Given: the extension fails the request
    let fixture = Fixture::new();
    fixture.attach_provider(vec![ProviderResponse::Error("api unreachable".to_string())]);

    // When: refreshing
    let result = fixture.client.refresh_certificates(None).await;

    // Then: the message is kept
    assert!(matches!(result, Err(AuthenticationError::Remote(m)) if m == "api unreachable"));
}

#[tokio::test]
async fn test_refresh_without_provider_fails() {
    // Given: no provider was ever set
    let fixture = Fixture::new();

    // When: refreshing
    let result = fixture.client.refresh_certificates(None).await;

    // Then: the refresh is refused
    assert!(matches!(result, Err(AuthenticationError::ProviderNotSet)));
}

#[tokio::test]
async fn test_plan_change_replaces_keys_and_certificate() {
    // Given: credentials issued with NetShield level 2
    let fixture = Fixture::new();
    let stored = features(NetShieldType::Level2, None);
    fixture.seed(ChronoDuration::days(1), Some(&stored));
    let old_key = fixture.client.load_client_private_key().unwrap();
    let provider = fixture.attach_provider(vec![]);

    // When: the plan is downgraded
    fixture
        .client
        .handle_plan_event(PlanEvent::Downgraded)
        .await
        .unwrap();

    // Then: refreshes were paused around the wipe and a new certificate
    // was requested for new keys with the old features
    assert_eq!(
        provider.request_codes(),
        vec![CANCEL_REFRESHES, RESTART_REFRESHES, REFRESH_CERTIFICATE]
    );
    let new_key = fixture.client.load_client_private_key().unwrap();
    assert_ne!(new_key.expose(), old_key.expose());
    assert_eq!(
        fixture.store.get_stored_certificate().unwrap().unwrap().certificate,
        "issued-1"
    );
    assert_eq!(
        fixture.store.get_stored_certificate_features().unwrap(),
        Some(stored)
    );
}

#[tokio::test]
async fn test_plan_change_without_provider_only_wipes() {
    // Given: stored credentials and no provider
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::days(1), None);

    // When: the account becomes delinquent
    fixture
        .client
        .handle_plan_event(PlanEvent::Delinquent)
        .await
        .unwrap();

    // Then: everything is wiped and nothing is requested
    assert!(fixture.store.get_stored_keys().unwrap().is_none());
    assert!(fixture.store.get_stored_certificate().unwrap().is_none());
}

#[tokio::test]
async fn test_plan_listener_handles_events() {
    // Given: a listener with a connected provider
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::days(1), None);
    let provider = fixture.attach_provider(vec![]);
    let store = fixture.store.clone();
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let listener = Arc::new(fixture.client).spawn_plan_listener(events_rx);

    // When: a plan event arrives and the sender goes away
    events_tx.send(PlanEvent::Delinquent).unwrap();
    drop(events_tx);
    listener.await.unwrap();

    // Then: a fresh certificate was issued
    assert_eq!(provider.issued.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_stored_certificate().unwrap().unwrap().certificate, "issued-1");
}

#[tokio::test]
async fn test_clear_everything_pauses_refreshes() {
    // Given: stored credentials and a provider
    let fixture = Fixture::new();
    fixture.seed(ChronoDuration::days(1), None);
    let provider = fixture.attach_provider(vec![]);

    // When: clearing everything
    fixture.client.clear_everything().await.unwrap();

    // Then: storage is empty and the extension was paused and resumed
    assert!(fixture.store.get_stored_keys().unwrap().is_none());
    assert!(fixture.store.get_stored_certificate().unwrap().is_none());
    assert_eq!(provider.request_codes(), vec![CANCEL_REFRESHES, RESTART_REFRESHES]);
}
