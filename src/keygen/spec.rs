use std::str::FromStr;

use chrono::{DateTime, Utc};
use rsa::BigUint;
use x509_cert::name::Name;

use crate::algorithm::Purposes;
use crate::authorization::{KeyProtection, KeyProtectionBuilder};
use crate::error::{error_codes, KeystoreError, KeystoreResult};
use crate::keys::EcCurve;

/// F4, the RSA public exponent used unless one is requested
pub const RSA_F4: u64 = 65_537;

/// Everything needed to generate a key into the keystore: the alias, the
/// authorizations to bind, the size or curve, and the fields of the
/// self-signed certificate issued for key pairs.
///
/// Unset sizes and certificate fields take the service's configured
/// defaults when a generator is initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenParameterSpec {
    alias: String,
    protection: KeyProtection,
    key_size: Option<u32>,
    ec_curve: Option<EcCurve>,
    rsa_public_exponent: Option<u64>,
    certificate_subject: Option<String>,
    certificate_serial_number: Option<u64>,
    certificate_not_before: Option<DateTime<Utc>>,
    certificate_not_after: Option<DateTime<Utc>>,
}

impl KeyGenParameterSpec {
    pub fn builder(alias: &str, purposes: Purposes) -> KeyGenParameterSpecBuilder {
        KeyGenParameterSpecBuilder::new(alias, purposes)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn protection(&self) -> &KeyProtection {
        &self.protection
    }

    pub fn purposes(&self) -> Purposes {
        self.protection.purposes()
    }

    pub fn key_size(&self) -> Option<u32> {
        self.key_size
    }

    pub fn ec_curve(&self) -> Option<EcCurve> {
        self.ec_curve
    }

    pub fn rsa_public_exponent(&self) -> Option<u64> {
        self.rsa_public_exponent
    }

    pub fn certificate_subject(&self) -> Option<&str> {
        self.certificate_subject.as_deref()
    }

    pub fn certificate_serial_number(&self) -> Option<u64> {
        self.certificate_serial_number
    }

    pub fn certificate_not_before(&self) -> Option<DateTime<Utc>> {
        self.certificate_not_before
    }

    pub fn certificate_not_after(&self) -> Option<DateTime<Utc>> {
        self.certificate_not_after
    }

    pub(crate) fn public_exponent(&self) -> BigUint {
        BigUint::from(self.rsa_public_exponent.unwrap_or(RSA_F4))
    }
}

/// Builder for [`KeyGenParameterSpec`]. The authorization setters are
/// those of [`KeyProtectionBuilder`].
#[derive(Debug, Clone)]
pub struct KeyGenParameterSpecBuilder {
    alias: String,
    protection: KeyProtectionBuilder,
    key_size: Option<u32>,
    ec_curve: Option<String>,
    rsa_public_exponent: Option<u64>,
    certificate_subject: Option<String>,
    certificate_serial_number: Option<u64>,
    certificate_not_before: Option<DateTime<Utc>>,
    certificate_not_after: Option<DateTime<Utc>>,
}

macro_rules! protection_setter {
    ($name:ident, $arg:ty) => {
        pub fn $name(mut self, value: $arg) -> Self {
            self.protection = self.protection.$name(value);
            self
        }
    };
}

impl KeyGenParameterSpecBuilder {
    pub fn new(alias: &str, purposes: Purposes) -> Self {
        Self {
            alias: alias.to_string(),
            protection: KeyProtectionBuilder::new(purposes),
            key_size: None,
            ec_curve: None,
            rsa_public_exponent: None,
            certificate_subject: None,
            certificate_serial_number: None,
            certificate_not_before: None,
            certificate_not_after: None,
        }
    }

    protection_setter!(digests, &[&str]);
    protection_setter!(block_modes, &[&str]);
    protection_setter!(encryption_paddings, &[&str]);
    protection_setter!(signature_paddings, &[&str]);
    protection_setter!(key_validity_start, DateTime<Utc>);
    protection_setter!(key_validity_for_origination_end, DateTime<Utc>);
    protection_setter!(key_validity_for_consumption_end, DateTime<Utc>);
    protection_setter!(key_validity_end, DateTime<Utc>);
    protection_setter!(randomized_encryption_required, bool);
    protection_setter!(encryption_required, bool);

    /// Key size in bits. For EC keys this selects the curve.
    pub fn key_size(mut self, bits: u32) -> Self {
        self.key_size = Some(bits);
        self
    }

    /// Named curve for EC keys
    pub fn ec_curve(mut self, name: &str) -> Self {
        self.ec_curve = Some(name.to_string());
        self
    }

    pub fn rsa_public_exponent(mut self, exponent: u64) -> Self {
        self.rsa_public_exponent = Some(exponent);
        self
    }

    /// Subject and issuer of the self-signed certificate, as an RFC 4514
    /// distinguished name
    pub fn certificate_subject(mut self, subject: &str) -> Self {
        self.certificate_subject = Some(subject.to_string());
        self
    }

    pub fn certificate_serial_number(mut self, serial: u64) -> Self {
        self.certificate_serial_number = Some(serial);
        self
    }

    pub fn certificate_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.certificate_not_before = Some(not_before);
        self
    }

    pub fn certificate_not_after(mut self, not_after: DateTime<Utc>) -> Self {
        self.certificate_not_after = Some(not_after);
        self
    }

    /// Validate names and produce the spec
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an empty alias, an unrecognized digest, mode,
    /// padding or curve name, an unparseable subject, or an even or too
    /// small public exponent.
    pub fn build(self) -> KeystoreResult<KeyGenParameterSpec> {
        if self.alias.is_empty() {
            return Err(KeystoreError::invalid_parameter("alias", "a non-empty alias", "\"\""));
        }
        if let Some(exponent) = self.rsa_public_exponent {
            if exponent < 3 || exponent % 2 == 0 {
                return Err(KeystoreError::invalid_parameter_with_code(
                    "RSA public exponent",
                    "an odd value of at least 3",
                    &exponent.to_string(),
                    error_codes::GENERIC_PARAMETER,
                ));
            }
        }
        if let Some(subject) = &self.certificate_subject {
            Name::from_str(subject).map_err(|e| {
                KeystoreError::invalid_parameter("certificate subject", "an RFC 4514 name", &e.to_string())
            })?;
        }
        let ec_curve = self.ec_curve.as_deref().map(EcCurve::from_name).transpose()?;

        Ok(KeyGenParameterSpec {
            alias: self.alias,
            protection: self.protection.build()?,
            key_size: self.key_size,
            ec_curve,
            rsa_public_exponent: self.rsa_public_exponent,
            certificate_subject: self.certificate_subject,
            certificate_serial_number: self.certificate_serial_number,
            certificate_not_before: self.certificate_not_before,
            certificate_not_after: self.certificate_not_after,
        })
    }
}
