//! Structural validation of cloud provider credentials
//!
//! Every provider gets a validator that checks the fields of a credentials
//! Secret (and, where supported, a WorkloadIdentity provider config) against
//! a field registry and the provider's allow-list [`Pattern`]s. Only fields
//! that pass validation are returned to the caller.

mod alicloud;
mod aws;
mod azure;
mod gcp;
mod hcloud;
mod openstack;
mod stackit;

pub use alicloud::AliCloudValidator;
pub use aws::AwsValidator;
pub use azure::AzureValidator;
pub use gcp::{gcp_validation_context, default_gcp_allowed_patterns, GcpValidator, CLIENT_EMAIL_PLACEHOLDER};
pub use hcloud::HCloudValidator;
pub use openstack::{openstack_validation_context, OpenStackValidator};
pub use stackit::{default_stackit_allowed_patterns, stackit_validation_context, StackitValidator};

use crate::allowpattern::{parse_and_validate_endpoint_url, Pattern};
use crate::error::GctlError;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Flat credential fields, as decoded from a Secret or JSON document
pub type Fields = serde_json::Map<String, Value>;

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Validates a single field value
pub type FieldValidator = fn(&BaseValidator, &str, &Value, &Fields, bool) -> ValidationResult<()>;

/// Matches a value against one normalized pattern
pub type PatternMatcher = fn(&str, &Pattern, &Fields, bool) -> ValidationResult<()>;

/// Whether `GCTL_UNSAFE_DEBUG` allows secret values in error messages
pub fn unsafe_debug_enabled() -> bool {
    std::env::var("GCTL_UNSAFE_DEBUG")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "t" | "true"))
        .unwrap_or(false)
}

/// Credential validation failure
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    PatternMismatch(#[from] PatternMismatchError),

    #[error("{0}")]
    Other(String),
}

impl ValidationError {
    pub fn other(msg: impl Into<String>) -> Self {
        ValidationError::Other(msg.into())
    }

    pub fn is_pattern_mismatch(&self) -> bool {
        matches!(self, ValidationError::PatternMismatch(_))
    }
}

impl From<ValidationError> for GctlError {
    fn from(e: ValidationError) -> Self {
        GctlError::InvalidCredentials(e.to_string())
    }
}

/// A field failed validation; its value is only shown for non-sensitive fields
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub cause: Option<String>,
    pub actual_value: Option<String>,
    pub non_sensitive: bool,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>, non_sensitive: bool) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
            cause: None,
            actual_value: None,
            non_sensitive,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.actual_value = Some(value.to_string());
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    fn reveal(&self) -> bool {
        self.non_sensitive || unsafe_debug_enabled()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual_value {
            Some(value) if !value.is_empty() && self.reveal() => write!(
                f,
                "validation error in field {:?}: {} (value: {:?})",
                self.field, self.message, value
            )?,
            _ => write!(f, "validation error in field {:?}: {}", self.field, self.message)?,
        }
        if let Some(cause) = &self.cause {
            if self.reveal() {
                write!(f, ": {cause}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

/// A value did not match a pattern; validation moves on to the next pattern
#[derive(Debug, Clone)]
pub struct PatternMismatchError {
    pub field: String,
    pub message: String,
    pub actual_value: Option<String>,
    pub expected_value: Option<String>,
    pub non_sensitive: bool,
}

impl PatternMismatchError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        PatternMismatchError {
            field: field.to_string(),
            message: message.into(),
            actual_value: None,
            expected_value: None,
            non_sensitive: false,
        }
    }

    pub fn with_values(
        field: &str,
        message: impl Into<String>,
        actual: &str,
        expected: &str,
        non_sensitive: bool,
    ) -> Self {
        PatternMismatchError {
            field: field.to_string(),
            message: message.into(),
            actual_value: Some(actual.to_string()).filter(|s| !s.is_empty()),
            expected_value: Some(expected.to_string()).filter(|s| !s.is_empty()),
            non_sensitive,
        }
    }
}

impl fmt::Display for PatternMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reveal = self.non_sensitive || unsafe_debug_enabled();
        match (&self.actual_value, &self.expected_value) {
            (Some(actual), Some(expected)) if reveal => write!(
                f,
                "pattern mismatch in field {:?}: {} (actual: {:?}, expected: {:?})",
                self.field, self.message, actual, expected
            ),
            (Some(actual), None) if reveal => write!(
                f,
                "pattern mismatch in field {:?}: {} (actual: {:?})",
                self.field, self.message, actual
            ),
            _ => write!(f, "pattern mismatch in field {:?}: {}", self.field, self.message),
        }
    }
}

impl std::error::Error for PatternMismatchError {}

/// How unknown fields are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Unknown fields are rejected
    Strict,
    /// Unknown fields are ignored and dropped from the result
    Permissive,
}

/// Validation rule for one field of a registry
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub required: bool,
    pub validator: Option<FieldValidator>,
    pub non_sensitive: bool,
}

impl FieldRule {
    pub const fn required(validator: FieldValidator, non_sensitive: bool) -> Self {
        FieldRule {
            required: true,
            validator: Some(validator),
            non_sensitive,
        }
    }

    pub const fn optional(validator: FieldValidator, non_sensitive: bool) -> Self {
        FieldRule {
            required: false,
            validator: Some(validator),
            non_sensitive,
        }
    }
}

/// Ordered registry of field rules
pub type Registry<'a> = &'a [(&'a str, FieldRule)];

/// Validation entry points shared by all providers
pub trait CredentialValidator: Send + Sync {
    /// Validate the data of a credentials Secret
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields>;

    /// Validate the provider config of a WorkloadIdentity
    fn validate_workload_identity_config(&self, _provider_config: Option<&Value>) -> ValidationResult<Fields> {
        Err(ValidationError::other("workload identity is not supported for this provider"))
    }
}

/// Shared machinery: the allow-list and registry evaluation
#[derive(Debug, Clone, Default)]
pub struct BaseValidator {
    allowed_patterns: Vec<Pattern>,
}

impl BaseValidator {
    pub fn new(allowed_patterns: Vec<Pattern>) -> Self {
        BaseValidator { allowed_patterns }
    }

    pub fn allowed_patterns(&self) -> &[Pattern] {
        &self.allowed_patterns
    }

    /// Validate `fields` against `registry`, returning the validated subset
    pub fn validate_with_registry(
        &self,
        fields: &Fields,
        registry: Registry<'_>,
        mode: ValidationMode,
    ) -> ValidationResult<Fields> {
        if mode == ValidationMode::Strict {
            if let Some(field) = fields.keys().find(|k| !registry.iter().any(|(name, _)| *name == k.as_str())) {
                return Err(FieldError::new(field, "field is not allowed", false).into());
            }
        }

        let mut validated = Fields::new();
        for (field, rule) in registry {
            let Some(raw) = fields.get(*field) else {
                if rule.required {
                    return Err(FieldError::new(field, "required field is missing", rule.non_sensitive).into());
                }
                continue;
            };

            if rule.required && is_field_empty(raw) {
                return Err(FieldError::new(field, "required field cannot be empty", rule.non_sensitive).into());
            }

            if let Some(validator) = rule.validator {
                validator(self, field, raw, fields, rule.non_sensitive)?;
            }

            validated.insert(field.to_string(), raw.clone());
        }

        Ok(validated)
    }

    /// Strict validation of a nested object, discarding the result
    pub fn validate_nested_fields_strict(&self, fields: &Fields, registry: Registry<'_>) -> ValidationResult<()> {
        self.validate_with_registry(fields, registry, ValidationMode::Strict)
            .map(|_| ())
    }

    /// Check `value` against every pattern for `field`; the first match wins
    pub fn validate_field_pattern(
        &self,
        field: &str,
        value: &str,
        credentials: &Fields,
        matcher: PatternMatcher,
        non_sensitive: bool,
    ) -> ValidationResult<()> {
        let reveal = non_sensitive || unsafe_debug_enabled();

        for pattern in self.allowed_patterns.iter().filter(|p| p.field == field) {
            trace!(field, pattern = %pattern, "Pattern match attempt");

            let normalized = pattern.to_normalized().map_err(|e| {
                FieldError::new(field, "failed to normalize pattern", non_sensitive).with_cause(e)
            })?;

            match matcher(value, &normalized, credentials, non_sensitive) {
                Ok(()) => {
                    trace!(field, pattern = %pattern, "Pattern match succeeded");
                    return Ok(());
                }
                Err(err) if err.is_pattern_mismatch() => {
                    if reveal {
                        debug!(field, pattern = %pattern, value, reason = %err, "Pattern match failed");
                    } else {
                        debug!(field, pattern = %pattern, reason = %err, "Pattern match failed");
                    }
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        Err(PatternMismatchError::with_values(field, "does not match any allowed patterns", value, "", non_sensitive).into())
    }
}

/// Decode Secret data into string fields; non-UTF-8 values stay byte arrays
pub fn coerce_secret_data(data: &BTreeMap<String, Vec<u8>>) -> Fields {
    data.iter()
        .map(|(k, v)| {
            let value = match std::str::from_utf8(v) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => Value::Array(v.iter().map(|b| Value::from(*b)).collect()),
            };
            (k.clone(), value)
        })
        .collect()
}

fn is_field_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// ============================================================================
// Field helpers
// ============================================================================

pub fn assert_string<'a>(field: &str, value: &'a Value, non_sensitive: bool) -> ValidationResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| FieldError::new(field, "field value must be a string", non_sensitive).into())
}

/// String check that also rejects control and other non-printable characters
pub fn assert_printable_string<'a>(field: &str, value: &'a Value, non_sensitive: bool) -> ValidationResult<&'a str> {
    let s = assert_string(field, value, non_sensitive)?;
    if s.chars().any(|c| c.is_control() || is_bidi_control(c)) {
        return Err(FieldError::new(field, "field value contains non-printable characters", non_sensitive).into());
    }
    Ok(s)
}

pub fn validate_exact_length(field: &str, value: &str, len: usize, non_sensitive: bool) -> ValidationResult<()> {
    if value.len() != len {
        return Err(FieldError::new(
            field,
            format!("field value must be exactly {len} characters, got {}", value.len()),
            non_sensitive,
        )
        .with_value(value)
        .into());
    }
    Ok(())
}

pub fn validate_min_length(field: &str, value: &str, min: usize, non_sensitive: bool) -> ValidationResult<()> {
    if value.len() < min {
        return Err(FieldError::new(
            field,
            format!("field value must be at least {min} characters, got {}", value.len()),
            non_sensitive,
        )
        .with_value(value)
        .into());
    }
    Ok(())
}

pub fn validate_max_length(field: &str, value: &str, max: usize, non_sensitive: bool) -> ValidationResult<()> {
    if value.len() > max {
        return Err(FieldError::new(
            field,
            format!("field value must be at most {max} characters, got {}", value.len()),
            non_sensitive,
        )
        .with_value(value)
        .into());
    }
    Ok(())
}

/// Registry validator: string checked against regexValue patterns
pub fn string_matching_regex(
    v: &BaseValidator,
    field: &str,
    value: &Value,
    all: &Fields,
    non_sensitive: bool,
) -> ValidationResult<()> {
    let s = assert_string(field, value, non_sensitive)?;
    v.validate_field_pattern(field, s, all, match_regex_value, non_sensitive)
}

/// Registry validator: string checked against URI patterns
pub fn string_matching_uri(
    v: &BaseValidator,
    field: &str,
    value: &Value,
    all: &Fields,
    non_sensitive: bool,
) -> ValidationResult<()> {
    let s = assert_string(field, value, non_sensitive)?;
    v.validate_field_pattern(field, s, all, match_uri, non_sensitive)
}

pub fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

// ============================================================================
// Pattern matchers
// ============================================================================

/// Match a scalar against `regexValue`
pub fn match_regex_value(value: &str, pattern: &Pattern, _credentials: &Fields, non_sensitive: bool) -> ValidationResult<()> {
    let Some(regex) = &pattern.regex_value else {
        return Err(FieldError::new(&pattern.field, "pattern does not have regexValue set", non_sensitive).into());
    };

    let re = Regex::new(regex)
        .map_err(|e| FieldError::new(&pattern.field, "invalid regex pattern", non_sensitive).with_cause(e))?;

    if !re.is_match(value) {
        return Err(PatternMismatchError::with_values(
            &pattern.field,
            "does not match regex pattern",
            value,
            regex,
            non_sensitive,
        )
        .into());
    }
    Ok(())
}

/// Match a URI against scheme, host, port and path of a normalized pattern
pub fn match_uri(uri: &str, pattern: &Pattern, _credentials: &Fields, non_sensitive: bool) -> ValidationResult<()> {
    let field = pattern.field.as_str();

    let parsed = parse_and_validate_endpoint_url(uri, false)
        .map_err(|e| FieldError::new(field, "failed to validate URI", non_sensitive).with_cause(e))?;

    let expected_scheme = pattern.scheme.as_deref().filter(|s| !s.is_empty()).unwrap_or("https");
    if parsed.scheme() != expected_scheme {
        return Err(PatternMismatchError::with_values(
            field,
            "scheme does not match allowed scheme",
            parsed.scheme(),
            expected_scheme,
            non_sensitive,
        )
        .into());
    }

    let Some(host) = &pattern.host else {
        return Err(FieldError::new(field, "pattern does not specify an allowed host", non_sensitive).into());
    };
    let actual_host = parsed.host_str().unwrap_or_default();
    if actual_host != host {
        return Err(PatternMismatchError::with_values(
            field,
            "host does not match allowed host",
            actual_host,
            host,
            non_sensitive,
        )
        .into());
    }

    let actual_port = parsed.port().map(|p| p.to_string()).unwrap_or_default();
    match pattern.port {
        Some(port) if parsed.port_or_known_default().map(u32::from) != Some(port) => {
            return Err(PatternMismatchError::with_values(
                field,
                "port does not match allowed port",
                &actual_port,
                &port.to_string(),
                non_sensitive,
            )
            .into());
        }
        None if !actual_port.is_empty() => {
            return Err(PatternMismatchError::with_values(
                field,
                "port does not match allowed port",
                &actual_port,
                "(none)",
                non_sensitive,
            )
            .into());
        }
        _ => {}
    }

    let path = parsed.path();
    if let Some(expected) = &pattern.path {
        if path != expected {
            return Err(PatternMismatchError::with_values(
                field,
                "path does not match allowed path",
                path,
                expected,
                non_sensitive,
            )
            .into());
        }
    } else if let Some(regex_path) = &pattern.regex_path {
        let re = Regex::new(regex_path)
            .map_err(|e| FieldError::new(field, "invalid regex pattern", non_sensitive).with_cause(e))?;
        if !re.is_match(path) {
            return Err(PatternMismatchError::with_values(
                field,
                "path does not match regex pattern",
                path,
                regex_path,
                non_sensitive,
            )
            .into());
        }
    }

    Ok(())
}

// ============================================================================
// Key helpers
// ============================================================================

/// Decode a string holding exactly one PEM block
pub fn decode_single_pem(field: &str, value: &str, non_sensitive: bool) -> ValidationResult<pem::Pem> {
    if !value.starts_with("-----BEGIN ") {
        return Err(FieldError::new(field, "field value must start with a PEM BEGIN line", non_sensitive).into());
    }
    let block = pem::parse(value)
        .map_err(|e| FieldError::new(field, "field value must be a valid PEM block", non_sensitive).with_cause(e))?;
    let end_line = format!("-----END {}-----", block.tag());
    if !value.trim_end().ends_with(&end_line) {
        return Err(FieldError::new(
            field,
            "field value must contain exactly one PEM block (unexpected data after END line)",
            non_sensitive,
        )
        .into());
    }
    Ok(block)
}

/// Structural check of a PKCS#8 ("PRIVATE KEY") or PKCS#1 ("RSA PRIVATE KEY") document
pub fn check_private_key_der(field: &str, tag: &str, der: &[u8], non_sensitive: bool) -> ValidationResult<()> {
    use x509_parser::der_parser::ber::BerObjectContent;

    let cannot_parse = |cause: &str| FieldError::new(field, "field value cannot be parsed", non_sensitive).with_cause(cause);

    let (rest, obj) = x509_parser::der_parser::parse_der(der).map_err(|e| cannot_parse(&e.to_string()))?;
    if !rest.is_empty() {
        return Err(cannot_parse("trailing data after key").into());
    }
    let items = obj.as_sequence().map_err(|_| cannot_parse("key is not a DER sequence"))?;

    let is_int = |i: usize| matches!(items.get(i).map(|o| &o.content), Some(BerObjectContent::Integer(_)));

    let ok = match tag {
        // version, algorithm identifier, key octets
        "PRIVATE KEY" => {
            items.len() >= 3
                && is_int(0)
                && matches!(items[1].content, BerObjectContent::Sequence(_))
                && matches!(items[2].content, BerObjectContent::OctetString(_))
        }
        // version, modulus, exponents, primes and coefficients
        "RSA PRIVATE KEY" => items.len() >= 9 && (0..9).all(is_int),
        _ => return Err(FieldError::new(field, "unknown private key type", non_sensitive).into()),
    };

    if !ok {
        return Err(cannot_parse("unexpected key structure").into());
    }
    Ok(())
}

/// Build the validator for a provider type
pub fn validator_for(provider_type: &str, allowed_patterns: Vec<Pattern>) -> Option<Box<dyn CredentialValidator>> {
    let validator: Box<dyn CredentialValidator> = match provider_type {
        "aws" => Box::new(AwsValidator::new()),
        "azure" => Box::new(AzureValidator::new()),
        "gcp" => Box::new(GcpValidator::new(allowed_patterns)),
        "alicloud" => Box::new(AliCloudValidator::new()),
        "hcloud" => Box::new(HCloudValidator::new()),
        "openstack" => Box::new(OpenStackValidator::new(allowed_patterns)),
        "stackit" => Box::new(StackitValidator::new(allowed_patterns)),
        _ => return None,
    };
    Some(validator)
}
