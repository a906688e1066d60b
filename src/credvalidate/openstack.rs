//! OpenStack password and application credentials

use super::*;
use crate::allowpattern::ValidationContext;

const PASSWORD_REGISTRY: &[(&str, FieldRule)] = &[
    ("domainName", FieldRule::required(printable_max::<64>, true)),
    ("tenantName", FieldRule::required(printable_max::<64>, true)),
    ("username", FieldRule::required(printable_max::<255>, true)),
    ("password", FieldRule::required(printable_max::<4096>, false)),
];

// Either the ID or the name of the application credential must be set,
// checked after the registry pass.
const APP_CREDENTIAL_REGISTRY: &[(&str, FieldRule)] = &[
    ("domainName", FieldRule::optional(printable_max::<64>, true)),
    ("applicationCredentialID", FieldRule::optional(printable_max::<255>, true)),
    ("applicationCredentialName", FieldRule::optional(printable_max::<255>, true)),
    ("applicationCredentialSecret", FieldRule::required(printable_max::<4096>, false)),
];

const AUTH_URL_REGISTRY: &[(&str, FieldRule)] = &[("authURL", FieldRule::required(string_matching_uri, true))];

/// Pattern rules for OpenStack: only `authURL` is configurable, plain http allowed
pub fn openstack_validation_context() -> ValidationContext {
    ValidationContext {
        allowed_regex_fields: &[],
        strict_https: false,
        allowed_user_configurable_fields: &["authURL"],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMethod {
    Password,
    ApplicationCredential,
}

pub struct OpenStackValidator {
    base: BaseValidator,
}

impl OpenStackValidator {
    /// There are no built-in patterns; every auth URL must be allowed explicitly
    pub fn new(allowed_patterns: Vec<Pattern>) -> Self {
        OpenStackValidator {
            base: BaseValidator::new(allowed_patterns),
        }
    }

    /// Check a keystone URL against the `authURL` patterns
    pub fn validate_auth_url(&self, auth_url: &str) -> ValidationResult<()> {
        let mut fields = Fields::new();
        fields.insert("authURL".to_string(), Value::String(auth_url.to_string()));
        self.base.validate_nested_fields_strict(&fields, AUTH_URL_REGISTRY)
    }

    fn validate_app_credential_auth(&self, fields: &Fields) -> ValidationResult<Fields> {
        let validated = self
            .base
            .validate_with_registry(fields, APP_CREDENTIAL_REGISTRY, ValidationMode::Permissive)?;

        let id = string_value(fields, "applicationCredentialID")?;
        let name = string_value(fields, "applicationCredentialName")?;
        if id.is_empty() && name.is_empty() {
            return Err(ValidationError::other(
                "either 'applicationCredentialID' or 'applicationCredentialName' must be provided",
            ));
        }
        if !name.is_empty() && string_value(fields, "domainName")?.is_empty() {
            return Err(ValidationError::other(
                "'domainName' must be provided when using 'applicationCredentialName'",
            ));
        }

        Ok(validated)
    }
}

impl CredentialValidator for OpenStackValidator {
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields> {
        let fields = coerce_secret_data(data);
        match detect_auth_method(data)? {
            AuthMethod::Password => self
                .base
                .validate_with_registry(&fields, PASSWORD_REGISTRY, ValidationMode::Permissive),
            AuthMethod::ApplicationCredential => self.validate_app_credential_auth(&fields),
        }
    }
}

fn detect_auth_method(data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<AuthMethod> {
    let has = |key: &str| data.get(key).is_some_and(|v| !v.is_empty());
    match (has("password"), has("applicationCredentialSecret")) {
        (true, true) => Err(ValidationError::other(
            "cannot specify both 'password' and 'applicationCredentialSecret'",
        )),
        (true, false) => Ok(AuthMethod::Password),
        (false, true) => Ok(AuthMethod::ApplicationCredential),
        (false, false) => Err(ValidationError::other(
            "must either specify 'password' or 'applicationCredentialSecret'",
        )),
    }
}

fn string_value<'a>(fields: &'a Fields, field: &str) -> ValidationResult<&'a str> {
    match fields.get(field) {
        Some(v) => assert_string(field, v, true),
        None => Ok(""),
    }
}

fn printable_max<const MAX: usize>(
    _v: &BaseValidator,
    field: &str,
    value: &Value,
    _all: &Fields,
    ns: bool,
) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_max_length(field, s, MAX, ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_password_auth() {
        let data = secret(&[
            ("domainName", "default"),
            ("tenantName", "tenant"),
            ("username", "user"),
            ("password", "pass"),
        ]);
        let out = OpenStackValidator::new(vec![]).validate_secret(&data).unwrap();
        assert_eq!(out.get("username"), Some(&Value::String("user".into())));
    }

    #[test]
    fn test_password_auth_missing_tenant() {
        let data = secret(&[("domainName", "default"), ("username", "user"), ("password", "pass")]);
        let err = OpenStackValidator::new(vec![]).validate_secret(&data).unwrap_err();
        assert!(err.to_string().contains("tenantName"));
    }

    #[test]
    fn test_both_methods_rejected() {
        let data = secret(&[("password", "pass"), ("applicationCredentialSecret", "s")]);
        let err = OpenStackValidator::new(vec![]).validate_secret(&data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot specify both 'password' and 'applicationCredentialSecret'"
        );
    }

    #[test]
    fn test_empty_app_secret_falls_back_to_password() {
        let data = secret(&[
            ("domainName", "default"),
            ("tenantName", "tenant"),
            ("username", "user"),
            ("password", "pass"),
            ("applicationCredentialSecret", ""),
        ]);
        assert!(OpenStackValidator::new(vec![]).validate_secret(&data).is_ok());
    }

    #[test]
    fn test_neither_method() {
        let data = secret(&[("username", "user")]);
        let err = OpenStackValidator::new(vec![]).validate_secret(&data).unwrap_err();
        assert_eq!(
            err.to_string(),
            "must either specify 'password' or 'applicationCredentialSecret'"
        );
    }

    #[test]
    fn test_app_credential_name_needs_domain() {
        let data = secret(&[
            ("applicationCredentialName", "cred"),
            ("applicationCredentialSecret", "s3cr3t"),
        ]);
        let err = OpenStackValidator::new(vec![]).validate_secret(&data).unwrap_err();
        assert!(err.to_string().contains("'domainName' must be provided"));

        let data = secret(&[
            ("applicationCredentialID", "id"),
            ("applicationCredentialSecret", "s3cr3t"),
        ]);
        assert!(OpenStackValidator::new(vec![]).validate_secret(&data).is_ok());
    }

    #[test]
    fn test_auth_url_requires_pattern() {
        let v = OpenStackValidator::new(vec![]);
        assert!(v.validate_auth_url("https://keystone.example.com:5000/v3").is_err());

        let v = OpenStackValidator::new(vec![Pattern::uri("authURL", "https://keystone.example.com:5000/v3")]);
        assert!(v.validate_auth_url("https://keystone.example.com:5000/v3").is_ok());
        assert!(v.validate_auth_url("https://keystone.example.com/v3").is_err());
    }
}
