//! Wire-protocol constants
//!
//! Centralized location for the parameter names and defaults the query
//! protocol uses on the wire.

// Implicit request parameters
pub const ACTION_PARAM: &str = "Action";
pub const VERSION_PARAM: &str = "Version";

// Authentication parameters attached by signers
pub const ACCESS_KEY_PARAM: &str = "AccessKeyId";
pub const SIGNATURE_PARAM: &str = "Signature";
pub const SIGNATURE_METHOD_PARAM: &str = "SignatureMethod";
pub const SIGNATURE_VERSION_PARAM: &str = "SignatureVersion";
pub const TIMESTAMP_PARAM: &str = "Timestamp";
pub const SECURITY_TOKEN_PARAM: &str = "SecurityToken";

// Scheme defaults
pub const DEFAULT_HTTPS_PORT: u16 = 443;
pub const DEFAULT_HTTP_PORT: u16 = 80;

// Retry configuration defaults
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Timestamp format attached to signed requests (ISO 8601, millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
