//! RFC 2104 HMAC for OpenVPN `tls-auth` packet signing
//!
//! Reference: https://www.ietf.org/rfc/rfc2104.txt
//! Inner pad (ipad): 0x36
//! Outer pad (opad): 0x5C

use sha2::digest::Output;
use sha2::{Digest, Sha512};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5C;

/// HMAC with hash `D` whose internal block is `BLOCK` bytes
fn hmac<D: Digest, const BLOCK: usize>(key: &[u8], message: &[u8]) -> Output<D> {
    let mut key_block = [0u8; BLOCK];

    if key.len() > BLOCK {
        let hashed = D::digest(key);
        key_block[..hashed.len()].copy_from_slice(&hashed);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut ipad_key = [0u8; BLOCK];
    let mut opad_key = [0u8; BLOCK];
    for i in 0..BLOCK {
        ipad_key[i] = key_block[i] ^ IPAD;
        opad_key[i] = key_block[i] ^ OPAD;
    }

    let mut inner = D::new();
    inner.update(ipad_key);
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = D::new();
    outer.update(opad_key);
    outer.update(inner_hash);
    outer.finalize()
}

/// HMAC-SHA512 (128-byte block)
pub fn hmac_sha512(key: &[u8], message: &[u8]) -> [u8; 64] {
    let mut result = [0u8; 64];
    result.copy_from_slice(&hmac::<Sha512, 128>(key, message));
    result
}
