/*!
 * Error Handling for the Keystore
 *
 * Provides the error taxonomy shared by the key store, the authorization
 * engine, the operation engines and key generation, together with numeric
 * error codes and user-facing messages.
 */

use thiserror::Error;

/// Error type for all keystore operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeystoreError {
    #[error("Keystore state error: {operation} - {cause}")]
    StoreState {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Operation not supported: {operation} - {cause}")]
    UnsupportedOperation {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Invalid key: {operation} - {cause}")]
    InvalidKey {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Invalid parameter: {parameter} - {expected} - got {actual}")]
    InvalidParameter {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("No such algorithm: {algorithm} for {service}")]
    NoSuchAlgorithm {
        service: String,
        algorithm: String,
        error_code: u32,
    },

    #[error("Bad padding: {operation} - {cause}")]
    BadPadding {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Illegal block size: {operation} - {cause}")]
    IllegalBlockSize {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Illegal state: {operation} - {cause}")]
    IllegalState {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Signature error: {operation} - {cause}")]
    Signature {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Encoding error: {structure} - {cause}")]
    Encoding {
        structure: String,
        cause: String,
        error_code: u32,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Key store errors: 1000-1999
    pub const STORE_NOT_LOADED: u32 = 1001;
    pub const STORE_LOAD_REJECTED: u32 = 1002;
    pub const STORE_SERIALIZATION_UNSUPPORTED: u32 = 1003;
    pub const PASSWORD_PROTECTION_UNSUPPORTED: u32 = 1004;
    pub const ENTRY_KIND_CONFLICT: u32 = 1005;
    pub const KEY_ALIAS_MISMATCH: u32 = 1006;
    pub const ENCRYPTED_STORAGE_UNAVAILABLE: u32 = 1007;
    pub const CAPACITY_EXCEEDED: u32 = 1008;
    pub const PROTECTION_REQUIRED: u32 = 1009;
    pub const INVALID_CHAIN: u32 = 1010;

    // Authorization errors: 2000-2999
    pub const PURPOSE_NOT_AUTHORIZED: u32 = 2001;
    pub const DIGEST_NOT_AUTHORIZED: u32 = 2002;
    pub const BLOCK_MODE_NOT_AUTHORIZED: u32 = 2003;
    pub const PADDING_NOT_AUTHORIZED: u32 = 2004;
    pub const KEY_NOT_YET_VALID: u32 = 2005;
    pub const KEY_EXPIRED: u32 = 2006;
    pub const RANDOMIZATION_REQUIRED: u32 = 2007;

    // Key errors: 3000-3999
    pub const KEY_NOT_FOUND: u32 = 3001;
    pub const KEY_TYPE_MISMATCH: u32 = 3002;
    pub const IV_REQUIRED: u32 = 3003;
    pub const KEY_NOT_EXPORTABLE: u32 = 3004;

    // Parameter errors: 4000-4999
    pub const UNSUPPORTED_KEY_SIZE: u32 = 4001;
    pub const UNRECOGNIZED_NAME: u32 = 4002;
    pub const INVALID_IV: u32 = 4003;
    pub const INVALID_TAG_LENGTH: u32 = 4004;
    pub const INVALID_DIGEST_SET: u32 = 4005;
    pub const INPUT_TOO_LONG: u32 = 4006;
    pub const INVALID_AUTHORIZATION: u32 = 4007;
    pub const GENERIC_PARAMETER: u32 = 4999;

    // Operation errors: 5000-5999
    pub const NO_SUCH_ALGORITHM: u32 = 5001;
    pub const PADDING_INVALID: u32 = 5002;
    pub const AUTHENTICATION_TAG_MISMATCH: u32 = 5003;
    pub const INPUT_NOT_BLOCK_ALIGNED: u32 = 5004;
    pub const NOT_INITIALIZED: u32 = 5005;
    pub const SESSION_FINALIZED: u32 = 5006;
    pub const WRONG_MODE: u32 = 5007;
    pub const AAD_AFTER_DATA: u32 = 5008;
    pub const SIGNING_FAILED: u32 = 5009;
    pub const MESSAGE_TOO_LARGE: u32 = 5010;

    // Encoding errors: 6000-6999
    pub const CERTIFICATE_MALFORMED: u32 = 6001;
    pub const PRIVATE_KEY_MALFORMED: u32 = 6002;
    pub const PUBLIC_KEY_MALFORMED: u32 = 6003;
    pub const CERTIFICATE_ENCODING_FAILED: u32 = 6004;

    // Miscellaneous errors: 9000-9999
    pub const CONFIGURATION_INVALID: u32 = 9001;
    pub const INTERNAL: u32 = 9002;
}

impl KeystoreError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KeystoreError::StoreState { error_code, .. } => *error_code,
            KeystoreError::UnsupportedOperation { error_code, .. } => *error_code,
            KeystoreError::InvalidKey { error_code, .. } => *error_code,
            KeystoreError::InvalidParameter { error_code, .. } => *error_code,
            KeystoreError::NoSuchAlgorithm { error_code, .. } => *error_code,
            KeystoreError::BadPadding { error_code, .. } => *error_code,
            KeystoreError::IllegalBlockSize { error_code, .. } => *error_code,
            KeystoreError::IllegalState { error_code, .. } => *error_code,
            KeystoreError::Signature { error_code, .. } => *error_code,
            KeystoreError::Encoding { error_code, .. } => *error_code,
            KeystoreError::Configuration(_) => error_codes::CONFIGURATION_INVALID,
            KeystoreError::Internal(_) => error_codes::INTERNAL,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            KeystoreError::StoreState { .. } => "StoreState",
            KeystoreError::UnsupportedOperation { .. } => "UnsupportedOperation",
            KeystoreError::InvalidKey { .. } => "InvalidKey",
            KeystoreError::InvalidParameter { .. } => "InvalidParameter",
            KeystoreError::NoSuchAlgorithm { .. } => "NoSuchAlgorithm",
            KeystoreError::BadPadding { .. } => "BadPadding",
            KeystoreError::IllegalBlockSize { .. } => "IllegalBlockSize",
            KeystoreError::IllegalState { .. } => "IllegalState",
            KeystoreError::Signature { .. } => "Signature",
            KeystoreError::Encoding { .. } => "Encoding",
            KeystoreError::Configuration(_) => "Configuration",
            KeystoreError::Internal(_) => "Internal",
        }
    }

    /// Whether this error is a denial by the authorization engine
    pub fn is_authorization_denial(&self) -> bool {
        matches!(
            self,
            KeystoreError::InvalidKey { error_code, .. }
                if (2000..3000).contains(error_code)
        )
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            KeystoreError::StoreState { operation, .. } => {
                format!("The keystore refused '{}' in its current state.", operation)
            }
            KeystoreError::UnsupportedOperation { operation, .. } => {
                format!("'{}' is not supported by this keystore.", operation)
            }
            KeystoreError::InvalidKey { operation, .. } => {
                format!("The key cannot be used for '{}'.", operation)
            }
            KeystoreError::InvalidParameter {
                parameter,
                expected,
                ..
            } => {
                format!("Invalid parameter '{}'. Expected {}.", parameter, expected)
            }
            KeystoreError::NoSuchAlgorithm { algorithm, .. } => {
                format!("Algorithm '{}' is not available.", algorithm)
            }
            KeystoreError::BadPadding { .. } => {
                "Decryption failed: the data is corrupted or was not produced with this key."
                    .to_string()
            }
            KeystoreError::IllegalBlockSize { .. } => {
                "Input length is not a multiple of the cipher block size.".to_string()
            }
            KeystoreError::IllegalState { operation, .. } => {
                format!("'{}' was called in the wrong order. Re-initialize the operation.", operation)
            }
            KeystoreError::Signature { operation, .. } => {
                format!("Signature operation '{}' failed.", operation)
            }
            KeystoreError::Encoding { structure, .. } => {
                format!("Could not decode or encode {}.", structure)
            }
            KeystoreError::Configuration(_) => "Keystore configuration is invalid.".to_string(),
            KeystoreError::Internal(_) => "Internal keystore failure.".to_string(),
        }
    }
}

/// Convenience constructors for common error types
impl KeystoreError {
    pub fn store_state(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::StoreState {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn not_loaded(operation: &str) -> Self {
        Self::store_state(
            operation,
            "keystore has not been loaded",
            error_codes::STORE_NOT_LOADED,
        )
    }

    pub fn unsupported(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::UnsupportedOperation {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn invalid_key(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::InvalidKey {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str) -> Self {
        Self::invalid_parameter_with_code(
            parameter,
            expected,
            actual,
            error_codes::GENERIC_PARAMETER,
        )
    }

    pub fn invalid_parameter_with_code(
        parameter: &str,
        expected: &str,
        actual: &str,
        error_code: u32,
    ) -> Self {
        KeystoreError::InvalidParameter {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code,
        }
    }

    pub fn no_such_algorithm(service: &str, algorithm: &str) -> Self {
        KeystoreError::NoSuchAlgorithm {
            service: service.to_string(),
            algorithm: algorithm.to_string(),
            error_code: error_codes::NO_SUCH_ALGORITHM,
        }
    }

    pub fn bad_padding(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::BadPadding {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn illegal_block_size(operation: &str, cause: &str) -> Self {
        KeystoreError::IllegalBlockSize {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::INPUT_NOT_BLOCK_ALIGNED,
        }
    }

    pub fn illegal_state(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::IllegalState {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn signature_error(operation: &str, cause: &str, error_code: u32) -> Self {
        KeystoreError::Signature {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn encoding(structure: &str, cause: impl std::fmt::Display, error_code: u32) -> Self {
        KeystoreError::Encoding {
            structure: structure.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }
}

impl From<serde_json::Error> for KeystoreError {
    fn from(err: serde_json::Error) -> Self {
        KeystoreError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for KeystoreError {
    fn from(err: std::io::Error) -> Self {
        KeystoreError::Configuration(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for KeystoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        KeystoreError::Internal(format!("alias namespace lock poisoned: {}", err))
    }
}

/// Result type for keystore operations
pub type KeystoreResult<T> = Result<T, KeystoreError>;
