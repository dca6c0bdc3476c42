use chrono::{DateTime, Utc};

use crate::algorithm::{BlockMode, Digest, EncryptionPadding, Purposes, SignaturePadding};
use crate::error::KeystoreResult;

/// Caller-requested protection for a key being imported or generated.
///
/// `None` for a list means "not specified", which is distinct from an empty
/// list. Resolution into an [`AuthorizationSet`](super::AuthorizationSet)
/// happens when the key is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProtection {
    purposes: Purposes,
    digests: Option<Vec<Digest>>,
    block_modes: Option<Vec<BlockMode>>,
    encryption_paddings: Option<Vec<EncryptionPadding>>,
    signature_paddings: Option<Vec<SignaturePadding>>,
    key_validity_start: Option<DateTime<Utc>>,
    key_validity_for_origination_end: Option<DateTime<Utc>>,
    key_validity_for_consumption_end: Option<DateTime<Utc>>,
    randomized_encryption_required: bool,
    encryption_required: bool,
}

impl KeyProtection {
    /// Start building protection for the given purposes
    pub fn builder(purposes: Purposes) -> KeyProtectionBuilder {
        KeyProtectionBuilder::new(purposes)
    }

    pub fn purposes(&self) -> Purposes {
        self.purposes
    }

    pub fn digests(&self) -> Option<&[Digest]> {
        self.digests.as_deref()
    }

    pub fn block_modes(&self) -> Option<&[BlockMode]> {
        self.block_modes.as_deref()
    }

    pub fn encryption_paddings(&self) -> Option<&[EncryptionPadding]> {
        self.encryption_paddings.as_deref()
    }

    pub fn signature_paddings(&self) -> Option<&[SignaturePadding]> {
        self.signature_paddings.as_deref()
    }

    pub fn key_validity_start(&self) -> Option<DateTime<Utc>> {
        self.key_validity_start
    }

    pub fn key_validity_for_origination_end(&self) -> Option<DateTime<Utc>> {
        self.key_validity_for_origination_end
    }

    pub fn key_validity_for_consumption_end(&self) -> Option<DateTime<Utc>> {
        self.key_validity_for_consumption_end
    }

    pub fn is_randomized_encryption_required(&self) -> bool {
        self.randomized_encryption_required
    }

    /// Whether the entry must be encrypted at rest
    pub fn is_encryption_required(&self) -> bool {
        self.encryption_required
    }
}

/// Builder for [`KeyProtection`].
///
/// Names are kept as given and parsed by [`build`](Self::build), so an
/// unrecognized digest, mode or padding fails there rather than at use.
#[derive(Debug, Clone)]
pub struct KeyProtectionBuilder {
    purposes: Purposes,
    digests: Option<Vec<String>>,
    block_modes: Option<Vec<String>>,
    encryption_paddings: Option<Vec<String>>,
    signature_paddings: Option<Vec<String>>,
    key_validity_start: Option<DateTime<Utc>>,
    key_validity_for_origination_end: Option<DateTime<Utc>>,
    key_validity_for_consumption_end: Option<DateTime<Utc>>,
    randomized_encryption_required: bool,
    encryption_required: bool,
}

fn owned(names: &[&str]) -> Option<Vec<String>> {
    Some(names.iter().map(|n| n.to_string()).collect())
}

fn parse_all<T>(
    names: Option<Vec<String>>,
    parse: fn(&str) -> KeystoreResult<T>,
) -> KeystoreResult<Option<Vec<T>>>
where
    T: PartialEq,
{
    let Some(names) = names else {
        return Ok(None);
    };
    let mut values = Vec::with_capacity(names.len());
    for name in &names {
        let value = parse(name)?;
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(Some(values))
}

impl KeyProtectionBuilder {
    pub fn new(purposes: Purposes) -> Self {
        Self {
            purposes,
            digests: None,
            block_modes: None,
            encryption_paddings: None,
            signature_paddings: None,
            key_validity_start: None,
            key_validity_for_origination_end: None,
            key_validity_for_consumption_end: None,
            randomized_encryption_required: true,
            encryption_required: false,
        }
    }

    pub fn digests(mut self, names: &[&str]) -> Self {
        self.digests = owned(names);
        self
    }

    pub fn block_modes(mut self, names: &[&str]) -> Self {
        self.block_modes = owned(names);
        self
    }

    pub fn encryption_paddings(mut self, names: &[&str]) -> Self {
        self.encryption_paddings = owned(names);
        self
    }

    pub fn signature_paddings(mut self, names: &[&str]) -> Self {
        self.signature_paddings = owned(names);
        self
    }

    pub fn key_validity_start(mut self, start: DateTime<Utc>) -> Self {
        self.key_validity_start = Some(start);
        self
    }

    pub fn key_validity_for_origination_end(mut self, end: DateTime<Utc>) -> Self {
        self.key_validity_for_origination_end = Some(end);
        self
    }

    pub fn key_validity_for_consumption_end(mut self, end: DateTime<Utc>) -> Self {
        self.key_validity_for_consumption_end = Some(end);
        self
    }

    /// Sets both the origination and the consumption end
    pub fn key_validity_end(self, end: DateTime<Utc>) -> Self {
        self.key_validity_for_origination_end(end)
            .key_validity_for_consumption_end(end)
    }

    pub fn randomized_encryption_required(mut self, required: bool) -> Self {
        self.randomized_encryption_required = required;
        self
    }

    pub fn encryption_required(mut self, required: bool) -> Self {
        self.encryption_required = required;
        self
    }

    /// Validate every name and produce the protection parameters
    ///
    /// # Errors
    ///
    /// `InvalidParameter` naming the first unrecognized value.
    pub fn build(self) -> KeystoreResult<KeyProtection> {
        Ok(KeyProtection {
            purposes: self.purposes,
            digests: parse_all(self.digests, Digest::from_name)?,
            block_modes: parse_all(self.block_modes, BlockMode::from_name)?,
            encryption_paddings: parse_all(self.encryption_paddings, EncryptionPadding::from_name)?,
            signature_paddings: parse_all(self.signature_paddings, SignaturePadding::from_name)?,
            key_validity_start: self.key_validity_start,
            key_validity_for_origination_end: self.key_validity_for_origination_end,
            key_validity_for_consumption_end: self.key_validity_for_consumption_end,
            randomized_encryption_required: self.randomized_encryption_required,
            encryption_required: self.encryption_required,
        })
    }
}
