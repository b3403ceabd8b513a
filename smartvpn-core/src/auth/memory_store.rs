//! In-memory credential storage
//!
//! Holds everything in process memory. Used where no system keyring is
//! available and as the storage double in tests.

use super::keys::{VpnCertificate, VpnKeys};
use super::storage::VpnAuthenticationStorage;
use crate::agent::VpnConnectionFeatures;
use crate::error::KeyringError;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<StoredItems>,
}

#[derive(Debug, Default)]
struct StoredItems {
    keys: Option<VpnKeys>,
    certificate: Option<VpnCertificate>,
    features: Option<VpnConnectionFeatures>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<MutexGuard<'_, StoredItems>, KeyringError> {
        self.items.lock().map_err(|_| KeyringError::ServiceUnavailable)
    }
}

impl VpnAuthenticationStorage for MemoryStore {
    fn get_stored_keys(&self) -> Result<Option<VpnKeys>, KeyringError> {
        Ok(self.items()?.keys.clone())
    }

    fn get_stored_certificate(&self) -> Result<Option<VpnCertificate>, KeyringError> {
        Ok(self.items()?.certificate.clone())
    }

    fn get_stored_certificate_features(&self) -> Result<Option<VpnConnectionFeatures>, KeyringError> {
        Ok(self.items()?.features.clone())
    }

    fn store_keys(&self, keys: &VpnKeys) -> Result<(), KeyringError> {
        self.items()?.keys = Some(keys.clone());
        Ok(())
    }

    fn store_certificate(
        &self,
        certificate: &VpnCertificate,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<(), KeyringError> {
        let mut items = self.items()?;
        items.certificate = Some(certificate.clone());
        items.features = features.cloned();
        Ok(())
    }

    fn delete_keys(&self) -> Result<(), KeyringError> {
        let mut items = self.items()?;
        items.keys = None;
        items.certificate = None;
        items.features = None;
        Ok(())
    }

    fn delete_certificate(&self) -> Result<(), KeyringError> {
        let mut items = self.items()?;
        items.certificate = None;
        items.features = None;
        Ok(())
    }
}
