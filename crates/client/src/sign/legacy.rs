//! Sorted-concatenation HMAC-SHA256 request signing (scheme version 1).
//!
//! Kept for endpoints that still expect the historical scheme: parameters
//! are sorted case-insensitively by key, keys and values concatenated
//! without separators, and the HMAC is hex-encoded.

use hmac::{Hmac, Mac};
use querywire_domain::constants::SIGNATURE_PARAM;
use querywire_domain::Credentials;
use sha2::Sha256;

use super::{attach_auth_params, RequestSigner, SignatureScheme, SignedRequest};
use crate::errors::ClientError;

type HmacSha256 = Hmac<Sha256>;

/// Historical signer for legacy endpoints.
#[derive(Debug, Clone)]
pub struct LegacySigner {
    credentials: Credentials,
}

impl LegacySigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Concatenated `key``value` pairs, sorted case-insensitively by key.
    pub(crate) fn string_to_sign(request: &SignedRequest) -> String {
        let mut pairs: Vec<(&String, &String)> = request.params.iter().collect();
        pairs.sort_by_key(|(k, _)| k.to_lowercase());

        let mut data = String::new();
        for (key, value) in pairs {
            data.push_str(key);
            data.push_str(value);
        }
        data
    }

    fn compute_signature(&self, data: &str) -> Result<String, ClientError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_access_key.as_bytes())
            .map_err(|e| ClientError::Config(format!("Failed to create HMAC: {e}")))?;
        mac.update(data.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl RequestSigner for LegacySigner {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Legacy
    }

    fn sign(&self, request: &mut SignedRequest) -> Result<(), ClientError> {
        attach_auth_params(request, &self.credentials, SignatureScheme::Legacy);

        let data = Self::string_to_sign(request);
        let signature = self.compute_signature(&data)?;
        request.params.insert(SIGNATURE_PARAM.to_string(), signature);

        Ok(())
    }
}
