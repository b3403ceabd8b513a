//! Authentication module
//!
//! Client key pair and certificate storage, the provider channel to the
//! network extension and certificate refresh.

pub mod keyring;
pub mod keys;
pub mod memory_store;
pub mod provider;
pub mod remote_client;
pub mod session;
pub mod storage;

// Public re-exports
pub use keyring::KeyringStore;
pub use keys::{
    private_key_pem, CertificateKeyExtractor, VpnAuthenticationData, VpnCertificate, VpnKeys,
    X509KeyExtractor,
};
pub use memory_store::MemoryStore;
pub use provider::{ProviderMessageSender, ProviderRequest, ProviderResponse};
pub use remote_client::{PlanEvent, VpnAuthenticationRemoteClient};
pub use session::SessionService;
pub use storage::VpnAuthenticationStorage;
