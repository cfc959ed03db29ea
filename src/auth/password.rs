//! Password digest sent to the tenant service in place of the password.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

/// Base64 of the SHA-1 digest of the raw password.
pub fn hash_password(password: &str) -> String {
    let digest = Sha1::digest(password.as_bytes());
    STANDARD.encode(digest)
}
