//! Credential storage contract

use super::keys::{VpnCertificate, VpnKeys};
use crate::agent::VpnConnectionFeatures;
use crate::error::KeyringError;
use tracing::info;

/// Persistent home of the key pair, certificate and certificate features
///
/// Deleting keys also deletes the certificate, which is useless without
/// them. Deleting or replacing the certificate replaces its features.
pub trait VpnAuthenticationStorage: Send + Sync {
    fn get_stored_keys(&self) -> Result<Option<VpnKeys>, KeyringError>;

    fn get_stored_certificate(&self) -> Result<Option<VpnCertificate>, KeyringError>;

    /// Features the stored certificate was issued with
    fn get_stored_certificate_features(&self) -> Result<Option<VpnConnectionFeatures>, KeyringError>;

    fn store_keys(&self, keys: &VpnKeys) -> Result<(), KeyringError>;

    fn store_certificate(
        &self,
        certificate: &VpnCertificate,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<(), KeyringError>;

    fn delete_keys(&self) -> Result<(), KeyringError>;

    fn delete_certificate(&self) -> Result<(), KeyringError>;

    /// Stored keys, generating and storing a fresh pair when there are none
    fn get_keys(&self) -> Result<VpnKeys, KeyringError> {
        if let Some(keys) = self.get_stored_keys()? {
            return Ok(keys);
        }

        let keys = VpnKeys::generate();
        self.store_keys(&keys)?;
        info!("Generated new VPN key pair");
        Ok(keys)
    }
}
