//! Certificate management delegated to the network extension
//!
//! The extension owns the API session that issues certificates. This client
//! asks it for refreshes over the provider channel and reads the results
//! back from shared credential storage.

use super::keys::{CertificateKeyExtractor, VpnAuthenticationData, VpnCertificate, VpnKeys, X509KeyExtractor};
use super::provider::{ProviderMessageSender, ProviderRequest, ProviderResponse};
use super::session::SessionService;
use super::storage::VpnAuthenticationStorage;
use crate::agent::VpnConnectionFeatures;
use crate::config::FeatureFlags;
use crate::error::AuthenticationError;
use crate::types::ClientPrivateKey;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Account changes that invalidate the current certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEvent {
    Downgraded,
    Delinquent,
}

pub struct VpnAuthenticationRemoteClient {
    provider: RwLock<Option<Arc<dyn ProviderMessageSender>>>,
    session_service: Arc<dyn SessionService>,
    storage: Arc<dyn VpnAuthenticationStorage>,
    key_extractor: Arc<dyn CertificateKeyExtractor>,
    flags: RwLock<FeatureFlags>,
}

struct StoredAuthData {
    keys: VpnKeys,
    certificate: VpnCertificate,
}

impl VpnAuthenticationRemoteClient {
    pub fn new(session_service: Arc<dyn SessionService>, storage: Arc<dyn VpnAuthenticationStorage>) -> Self {
        Self {
            provider: RwLock::new(None),
            session_service,
            storage,
            key_extractor: Arc::new(X509KeyExtractor),
            flags: RwLock::new(FeatureFlags::default()),
        }
    }

    pub fn with_key_extractor(mut self, key_extractor: Arc<dyn CertificateKeyExtractor>) -> Self {
        self.key_extractor = key_extractor;
        self
    }

    pub fn set_feature_flags(&self, flags: FeatureFlags) {
        *self.flags.write().unwrap_or_else(PoisonError::into_inner) = flags;
    }

    /// Provider of the active connection; `None` once it goes away
    pub fn set_connection_provider(&self, provider: Option<Arc<dyn ProviderMessageSender>>) {
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = provider;
    }

    fn provider(&self) -> Option<Arc<dyn ProviderMessageSender>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn safe_mode_enabled(&self) -> bool {
        self.flags.read().unwrap_or_else(PoisonError::into_inner).safe_mode
    }

    /// Stored credentials when still usable, otherwise freshly refreshed ones
    #[instrument(skip_all)]
    pub async fn load_authentication_data(
        &self,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<VpnAuthenticationData, AuthenticationError> {
        if let Some(stored) = self.load_stored_authentication_data()? {
            if !self.needs_refresh(&stored, features)? {
                debug!("Stored VPN auth data does not need refreshing");
                return Ok(VpnAuthenticationData {
                    client_key: stored.keys.private_key().clone(),
                    client_certificate: stored.certificate.certificate,
                });
            }
        }

        match self.refresh_certificates(features).await {
            Ok(data) => {
                info!("Refreshed certificate");
                Ok(data)
            }
            Err(e) => {
                error!("Failed to refresh certificate: {}", e);
                Err(e)
            }
        }
    }

    /// Ask the extension for a new certificate
    ///
    /// An expired extension session is renewed once by forking a new one;
    /// a second expiry is reported as `UserCredentialsExpired`.
    #[instrument(skip_all)]
    pub async fn refresh_certificates(
        &self,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<VpnAuthenticationData, AuthenticationError> {
        let Some(provider) = self.provider() else {
            error!("Certificate refresh attempted with no provider set");
            return Err(AuthenticationError::ProviderNotSet);
        };

        let mut session_renewed = false;
        loop {
            let request = ProviderRequest::RefreshCertificate {
                features: features.cloned(),
            };
            match provider.send(request).await? {
                ProviderResponse::Ok(_) => return self.read_refreshed_data(),
                ProviderResponse::Error(message) => return Err(AuthenticationError::Remote(message)),
                ProviderResponse::SessionExpired if session_renewed => {
                    warn!("Extension session expired again after renewal");
                    return Err(AuthenticationError::UserCredentialsExpired);
                }
                ProviderResponse::SessionExpired => {
                    info!("Extension session expired, forking a new one");
                    self.push_selector_to_provider(provider.as_ref()).await?;
                    session_renewed = true;
                }
                ProviderResponse::NeedKeyRegeneration => {
                    warn!("Extension requested key regeneration, wiping keys");
                    self.storage.delete_keys()?;
                    self.storage.delete_certificate()?;
                    return Err(AuthenticationError::NeedNewKeys);
                }
                ProviderResponse::TooManyCertRequests { retry_after } => {
                    let retry_after = retry_after
                        .and_then(|secs| u64::try_from(secs).ok())
                        .map(Duration::from_secs);
                    warn!(?retry_after, "Too many certificate requests");
                    return Err(AuthenticationError::TooManyCertRequests { retry_after });
                }
            }
        }
    }

    fn read_refreshed_data(&self) -> Result<VpnAuthenticationData, AuthenticationError> {
        let keys = self.storage.get_stored_keys()?;
        let certificate = self.storage.get_stored_certificate()?;
        let (Some(keys), Some(certificate)) = (keys, certificate) else {
            return Err(AuthenticationError::UserCredentialsMissing);
        };

        info!(valid_until = %certificate.valid_until, "Certificate retrieved from extension");
        Ok(VpnAuthenticationData {
            client_key: keys.private_key().clone(),
            client_certificate: certificate.certificate,
        })
    }

    async fn push_selector_to_provider(
        &self,
        provider: &dyn ProviderMessageSender,
    ) -> Result<(), AuthenticationError> {
        let selector = self.session_service.extension_session_selector().await?;
        let request = ProviderRequest::SetApiSelector {
            selector,
            session_cookie: self.session_service.session_cookie(),
        };

        match provider.send(request).await? {
            ProviderResponse::Ok(_) => Ok(()),
            ProviderResponse::Error(message) => Err(AuthenticationError::Remote(message)),
            ProviderResponse::TooManyCertRequests { .. } => {
                Err(AuthenticationError::TooManyCertRequests { retry_after: None })
            }
            response @ (ProviderResponse::SessionExpired | ProviderResponse::NeedKeyRegeneration) => {
                error!(?response, "Unexpected response to session selector");
                Err(AuthenticationError::UserCredentialsExpired)
            }
        }
    }

    /// Run a storage mutation with the extension's refresh cycle paused
    ///
    /// Returns the mutation result and whether refreshes were resumed.
    /// Without a provider the mutation runs alone and nothing is resumed.
    async fn with_refreshes_paused<T>(
        &self,
        mutate: impl FnOnce() -> Result<T, AuthenticationError>,
    ) -> Result<(T, bool), AuthenticationError> {
        let Some(provider) = self.provider() else {
            return Ok((mutate()?, false));
        };

        if let Err(e) = provider.send(ProviderRequest::CancelRefreshes).await {
            error!("Could not pause extension certificate refreshes: {}", e);
        }

        let value = mutate();

        let resumed = match provider.send(ProviderRequest::RestartRefreshes).await {
            Ok(_) => true,
            Err(e) => {
                error!("Could not restart extension certificate refreshes: {}", e);
                false
            }
        };

        Ok((value?, resumed))
    }

    /// Wipe keys and certificate in step with the extension
    pub async fn clear_everything(&self) -> Result<(), AuthenticationError> {
        self.with_refreshes_paused(|| {
            self.storage.delete_keys()?;
            self.storage.delete_certificate()?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Current private key, generating a pair when none is stored
    pub fn load_client_private_key(&self) -> Result<ClientPrivateKey, AuthenticationError> {
        Ok(self.storage.get_keys()?.private_key().clone())
    }

    /// Replace keys and certificate after the user's plan changed
    ///
    /// The new certificate is requested with the features of the old one.
    #[instrument(skip(self))]
    pub async fn handle_plan_event(&self, event: PlanEvent) -> Result<(), AuthenticationError> {
        info!("User plan downgraded or delinquent, replacing keys and certificate");

        let (features, resumed) = self
            .with_refreshes_paused(|| {
                let features = self.storage.get_stored_certificate_features()?;
                self.storage.delete_keys()?;
                self.storage.delete_certificate()?;
                Ok(features)
            })
            .await?;

        if !resumed {
            debug!("Extension refreshes not resumed, skipping certificate request");
            return Ok(());
        }

        self.storage.get_keys()?;
        self.refresh_certificates(features.as_ref()).await?;
        Ok(())
    }

    /// Handle plan events until the sender goes away
    pub fn spawn_plan_listener(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<PlanEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = self.handle_plan_event(event).await {
                    warn!(?event, "Failed to replace credentials after plan change: {}", e);
                }
            }
        })
    }

    fn load_stored_authentication_data(&self) -> Result<Option<StoredAuthData>, AuthenticationError> {
        let Some(certificate) = self.storage.get_stored_certificate()? else {
            debug!("No stored VPN certificate found");
            return Ok(None);
        };

        // A certificate without keys is unusable
        let Some(keys) = self.storage.get_stored_keys()? else {
            error!("Missing VPN keys, deleting stored certificate");
            self.storage.delete_certificate()?;
            return Ok(None);
        };

        Ok(Some(StoredAuthData { keys, certificate }))
    }

    fn is_valid(&self, stored: &StoredAuthData) -> Result<bool, AuthenticationError> {
        let Some(certificate_key) = self.key_extractor.public_key(&stored.certificate.certificate) else {
            warn!("Failed to extract certificate's public key, skipping verification");
            return Ok(true);
        };

        if certificate_key.as_slice() != stored.keys.public_key().as_slice() {
            error!("Deleting stored certificate as its public key does not match our current keys");
            self.storage.delete_certificate()?;
            return Ok(false);
        }

        Ok(true)
    }

    fn needs_refresh(
        &self,
        stored: &StoredAuthData,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<bool, AuthenticationError> {
        if !self.is_valid(stored)? {
            return Ok(true);
        }

        let certificate = &stored.certificate;
        if certificate.is_expired() || certificate.should_be_refreshed() {
            info!(
                valid_until = %certificate.valid_until,
                refresh_time = %certificate.refresh_time,
                "Stored certificate is expired or due for refresh"
            );
            return Ok(true);
        }

        if let Some(features) = features {
            let stored_features = self.storage.get_stored_certificate_features()?;
            if !features.equals(stored_features.as_ref(), self.safe_mode_enabled()) {
                info!(
                    current = ?features,
                    saved = ?stored_features,
                    "Requested features differ from the certificate's"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
