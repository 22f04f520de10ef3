//! Canonical-string HMAC-SHA256 request signing (scheme version 2).
//!
//! The string to sign is `METHOD\nhost\npath\ncanonical-query`, where the
//! canonical query is the key-sorted, percent-encoded parameter mapping.
//! The signature is base64-encoded and attached as the `Signature` param.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use querywire_domain::constants::SIGNATURE_PARAM;
use querywire_domain::Credentials;
use sha2::Sha256;

use super::{attach_auth_params, RequestSigner, SignatureScheme, SignedRequest};
use crate::errors::ClientError;
use crate::params::form_encode;

type HmacSha256 = Hmac<Sha256>;

/// Canonical-string signer for current endpoints.
#[derive(Debug, Clone)]
pub struct V2Signer {
    credentials: Credentials,
}

impl V2Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Canonical request representation covered by the signature.
    ///
    /// The host is lowercased; everything else is taken verbatim from the
    /// request. Parameters are already key-sorted by the mapping.
    pub(crate) fn string_to_sign(request: &SignedRequest) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            request.method.to_uppercase(),
            request.host.to_lowercase(),
            request.path,
            form_encode(&request.params)
        )
    }

    fn compute_signature(&self, data: &str) -> Result<String, ClientError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_access_key.as_bytes())
            .map_err(|e| ClientError::Config(format!("Failed to create HMAC: {e}")))?;
        mac.update(data.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl RequestSigner for V2Signer {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::V2
    }

    fn sign(&self, request: &mut SignedRequest) -> Result<(), ClientError> {
        attach_auth_params(request, &self.credentials, SignatureScheme::V2);

        let canonical = Self::string_to_sign(request);
        let signature = self.compute_signature(&canonical)?;
        request.params.insert(SIGNATURE_PARAM.to_string(), signature);

        Ok(())
    }
}
