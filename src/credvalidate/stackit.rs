//! STACKIT service accounts
//!
//! A STACKIT credentials Secret carries a `serviceaccount.json` key document
//! and a `project-id`. It may additionally hold OpenStack credentials, which
//! are validated on a best-effort basis and merged into the result.

use super::*;
use crate::allowpattern::ValidationContext;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

const UUID_REGEX: &str = r"^[0-9a-fA-F-]{36}$";

const SECRET_REGISTRY: &[(&str, FieldRule)] = &[
    ("serviceaccount.json", FieldRule::required(validate_service_account, false)),
    ("project-id", FieldRule::required(validate_project_id, true)),
];

const SERVICE_ACCOUNT_REGISTRY: &[(&str, FieldRule)] = &[
    ("id", FieldRule::optional(string_matching_regex, true)),
    ("publicKey", FieldRule::optional(validate_public_key, true)),
    ("createdAt", FieldRule::optional(validate_rfc3339_time, true)),
    ("validUntil", FieldRule::optional(validate_rfc3339_time, true)),
    ("keyType", FieldRule::optional(string_matching_regex, true)),
    ("keyOrigin", FieldRule::optional(string_matching_regex, true)),
    ("keyAlgorithm", FieldRule::optional(string_matching_regex, true)),
    ("active", FieldRule::optional(validate_bool, true)),
    ("credentials", FieldRule::required(validate_credentials, false)),
];

const CREDENTIALS_REGISTRY: &[(&str, FieldRule)] = &[
    ("kid", FieldRule::required(string_matching_regex, true)),
    ("iss", FieldRule::required(string_matching_regex, true)),
    ("sub", FieldRule::required(string_matching_regex, true)),
    ("aud", FieldRule::required(validate_audience, true)),
    ("privateKey", FieldRule::required(validate_private_key, true)),
];

/// Built-in patterns for STACKIT service account fields
pub fn default_stackit_allowed_patterns() -> Vec<Pattern> {
    vec![
        Pattern::regex_value("project-id", UUID_REGEX),
        Pattern::regex_value("id", UUID_REGEX),
        Pattern::regex_value("sub", UUID_REGEX),
        Pattern::regex_value("kid", UUID_REGEX),
        Pattern::regex_value("keyType", "^USER_MANAGED|SYSTEM_MANAGED$"),
        Pattern::regex_value("keyOrigin", "^USER_PROVIDED|GENERATED$"),
        Pattern::regex_value("keyAlgorithm", "^RSA_2048|RSA_4096$"),
        Pattern::regex_value("iss", r"^[\w\-.]+@([\w-]+\.)?sa\.stackit\.cloud$"),
    ]
}

pub fn stackit_validation_context() -> ValidationContext {
    ValidationContext {
        allowed_regex_fields: &[
            "project-id",
            "id",
            "sub",
            "kid",
            "keyType",
            "keyOrigin",
            "keyAlgorithm",
            "iss",
            "aud",
        ],
        strict_https: true,
        allowed_user_configurable_fields: &["aud"],
    }
}

pub struct StackitValidator {
    openstack: OpenStackValidator,
    base: BaseValidator,
}

impl StackitValidator {
    pub fn new(allowed_patterns: Vec<Pattern>) -> Self {
        StackitValidator {
            openstack: OpenStackValidator::new(Vec::new()),
            base: BaseValidator::new(allowed_patterns),
        }
    }
}

impl CredentialValidator for StackitValidator {
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields> {
        let fields = coerce_secret_data(data);
        let mut validated = self
            .base
            .validate_with_registry(&fields, SECRET_REGISTRY, ValidationMode::Permissive)?;

        // OpenStack credentials are optional alongside the service account
        match self.openstack.validate_secret(data) {
            Ok(openstack) => validated.extend(openstack),
            Err(e) => debug!(reason = %e, "No usable OpenStack credentials in STACKIT secret"),
        }

        Ok(validated)
    }
}

fn validate_project_id(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}

fn validate_service_account(v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    let document: Fields = serde_json::from_str(s)
        .map_err(|e| FieldError::new(field, format!("no valid json {e}"), ns))?;
    v.validate_nested_fields_strict(&document, SERVICE_ACCOUNT_REGISTRY)
}

fn validate_credentials(v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let credentials = value
        .as_object()
        .ok_or_else(|| FieldError::new(field, "field value must be an object", ns))?;
    v.validate_nested_fields_strict(credentials, CREDENTIALS_REGISTRY)
}

/// `aud` may match a regex pattern, a URI pattern, or be any https URL below stackit.cloud
fn validate_audience(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    if v.validate_field_pattern(field, s, all, match_regex_value, ns).is_ok()
        || v.validate_field_pattern(field, s, all, match_uri, ns).is_ok()
    {
        return Ok(());
    }

    let parsed = url::Url::parse(s)
        .map_err(|e| FieldError::new(field, "field cannot be parsed as url", ns).with_cause(e))?;
    if !parsed.host_str().unwrap_or_default().ends_with(".stackit.cloud") {
        return Err(FieldError::new(field, "field is not a valid url", ns).into());
    }
    if parsed.scheme() != "https" {
        return Err(FieldError::new(field, "field is using a url without https", ns).into());
    }
    Ok(())
}

fn validate_bool(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    if !value.is_boolean() {
        return Err(FieldError::new(field, "field value must be a bool", ns).into());
    }
    Ok(())
}

fn validate_rfc3339_time(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| FieldError::new(field, "field cannot be parsed as time", ns).with_cause(e))?;
    Ok(())
}

fn validate_public_key(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    let block = decode_single_pem(field, s, ns)?;

    let (_, spki) = SubjectPublicKeyInfo::from_der(block.contents())
        .map_err(|e| FieldError::new(field, "field value cannot be parsed", ns).with_cause(e))?;
    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => Ok(()),
        _ => Err(FieldError::new(field, "field value must be an RSA public key", ns).into()),
    }
}

fn validate_private_key(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    let block = decode_single_pem(field, s, ns)?;
    check_private_key_der(field, block.tag(), block.contents(), ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PRIVATE_KEY: &str = include_str!("testdata/rsa_pkcs8.pem");
    const PKCS1_PRIVATE_KEY: &str = include_str!("testdata/rsa_pkcs1.pem");
    const PUBLIC_KEY: &str = include_str!("testdata/rsa_public.pem");
    const ED25519_PUBLIC_KEY: &str = include_str!("testdata/ed25519_public.pem");

    const PROJECT_ID: &str = "0a1b2c3d-0000-1111-2222-333344445555";

    fn service_account() -> Value {
        json!({
            "id": "11111111-2222-3333-4444-555555555555",
            "publicKey": PUBLIC_KEY,
            "createdAt": "2025-01-01T00:00:00Z",
            "validUntil": "2026-01-01T00:00:00Z",
            "keyType": "USER_MANAGED",
            "keyOrigin": "GENERATED",
            "keyAlgorithm": "RSA_2048",
            "active": true,
            "credentials": {
                "kid": "11111111-2222-3333-4444-555555555555",
                "iss": "robot@sa.stackit.cloud",
                "sub": "66666666-7777-8888-9999-000000000000",
                "aud": "https://stackit-service-account-prod.apps.01.cf.eu01.stackit.cloud",
                "privateKey": PRIVATE_KEY,
            }
        })
    }

    fn secret(sa: &Value) -> BTreeMap<String, Vec<u8>> {
        let mut data = BTreeMap::new();
        data.insert("serviceaccount.json".to_string(), sa.to_string().into_bytes());
        data.insert("project-id".to_string(), PROJECT_ID.as_bytes().to_vec());
        data
    }

    fn validator() -> StackitValidator {
        StackitValidator::new(default_stackit_allowed_patterns())
    }

    #[test]
    fn test_valid_service_account() {
        let out = validator().validate_secret(&secret(&service_account())).unwrap();
        assert_eq!(out.get("project-id"), Some(&json!(PROJECT_ID)));
        assert!(out.contains_key("serviceaccount.json"));
    }

    #[test]
    fn test_pkcs1_private_key_accepted() {
        let mut sa = service_account();
        sa["credentials"]["privateKey"] = json!(PKCS1_PRIVATE_KEY);
        assert!(validator().validate_secret(&secret(&sa)).is_ok());
    }

    #[test]
    fn test_unknown_service_account_field() {
        let mut sa = service_account();
        sa["unexpected"] = json!("x");
        let err = validator().validate_secret(&secret(&sa)).unwrap_err();
        assert!(err.to_string().contains("field is not allowed"));
    }

    #[test]
    fn test_non_rsa_public_key() {
        let mut sa = service_account();
        sa["publicKey"] = json!(ED25519_PUBLIC_KEY);
        let err = validator().validate_secret(&secret(&sa)).unwrap_err();
        assert!(err.to_string().contains("must be an RSA public key"));
    }

    #[test]
    fn test_trailing_pem_data() {
        let mut sa = service_account();
        sa["credentials"]["privateKey"] = json!(format!("{PRIVATE_KEY}garbage"));
        assert!(validator().validate_secret(&secret(&sa)).is_err());
    }

    #[test]
    fn test_audience_outside_stackit() {
        let mut sa = service_account();
        sa["credentials"]["aud"] = json!("https://example.com");
        let err = validator().validate_secret(&secret(&sa)).unwrap_err();
        assert!(err.to_string().contains("not a valid url"));

        sa["credentials"]["aud"] = json!("http://foo.stackit.cloud");
        let err = validator().validate_secret(&secret(&sa)).unwrap_err();
        assert!(err.to_string().contains("without https"));
    }

    #[test]
    fn test_invalid_time() {
        let mut sa = service_account();
        sa["createdAt"] = json!("yesterday");
        assert!(validator().validate_secret(&secret(&sa)).is_err());
    }

    #[test]
    fn test_openstack_fields_merged() {
        let mut data = secret(&service_account());
        for (k, v) in [
            ("domainName", "default"),
            ("tenantName", "tenant"),
            ("username", "user"),
            ("password", "pass"),
        ] {
            data.insert(k.to_string(), v.as_bytes().to_vec());
        }
        let out = validator().validate_secret(&data).unwrap();
        assert_eq!(out.get("tenantName"), Some(&json!("tenant")));
    }
}
