//! System keyring backed credential storage
//!
//! Uses the system keyring (Secret Service on Linux, Keychain on macOS).
//! Each item lives in its own entry under the smartvpn service.

use super::keys::{VpnCertificate, VpnKeys};
use super::storage::VpnAuthenticationStorage;
use crate::agent::VpnConnectionFeatures;
use crate::error::KeyringError;
use crate::types::{
    ClientPrivateKey, KEYRING_ACCOUNT_CERTIFICATE, KEYRING_ACCOUNT_FEATURES, KEYRING_ACCOUNT_KEYS,
    KEYRING_SERVICE,
};
use keyring::Entry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry, KeyringError> {
        Entry::new(&self.service, account).map_err(|_| KeyringError::ServiceUnavailable)
    }

    fn read_raw(&self, account: &str) -> Result<Option<String>, KeyringError> {
        match self.entry(account)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!(account, "Keyring read failed: {}", e);
                Err(KeyringError::RetrieveFailed)
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, account: &str) -> Result<Option<T>, KeyringError> {
        self.read_raw(account)?
            .map(|json| serde_json::from_str(&json).map_err(|_| KeyringError::InvalidFormat))
            .transpose()
    }

    fn write_raw(&self, account: &str, value: &str) -> Result<(), KeyringError> {
        self.entry(account)?
            .set_password(value)
            .map_err(|_| KeyringError::StoreFailed)
    }

    fn write_json<T: Serialize>(&self, account: &str, value: &T) -> Result<(), KeyringError> {
        let json = serde_json::to_string(value).map_err(|_| KeyringError::InvalidFormat)?;
        self.write_raw(account, &json)
    }

    fn remove(&self, account: &str) -> Result<(), KeyringError> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!(account, "Keyring delete failed: {}", e);
                Err(KeyringError::StoreFailed)
            }
        }
    }
}

impl VpnAuthenticationStorage for KeyringStore {
    fn get_stored_keys(&self) -> Result<Option<VpnKeys>, KeyringError> {
        self.read_raw(KEYRING_ACCOUNT_KEYS)?
            .map(|seed| VpnKeys::from_private_key(ClientPrivateKey::new(seed)))
            .transpose()
    }

    fn get_stored_certificate(&self) -> Result<Option<VpnCertificate>, KeyringError> {
        self.read_json(KEYRING_ACCOUNT_CERTIFICATE)
    }

    fn get_stored_certificate_features(&self) -> Result<Option<VpnConnectionFeatures>, KeyringError> {
        self.read_json(KEYRING_ACCOUNT_FEATURES)
    }

    fn store_keys(&self, keys: &VpnKeys) -> Result<(), KeyringError> {
        self.write_raw(KEYRING_ACCOUNT_KEYS, keys.private_key().expose())
    }

    fn store_certificate(
        &self,
        certificate: &VpnCertificate,
        features: Option<&VpnConnectionFeatures>,
    ) -> Result<(), KeyringError> {
        self.write_json(KEYRING_ACCOUNT_CERTIFICATE, certificate)?;
        match features {
            Some(features) => self.write_json(KEYRING_ACCOUNT_FEATURES, features)?,
            None => self.remove(KEYRING_ACCOUNT_FEATURES)?,
        }
        debug!(valid_until = %certificate.valid_until, "VPN certificate saved");
        Ok(())
    }

    fn delete_keys(&self) -> Result<(), KeyringError> {
        self.remove(KEYRING_ACCOUNT_KEYS)?;
        self.delete_certificate()
    }

    fn delete_certificate(&self) -> Result<(), KeyringError> {
        self.remove(KEYRING_ACCOUNT_CERTIFICATE)?;
        self.remove(KEYRING_ACCOUNT_FEATURES)
    }
}
