//! GCP service accounts and workload identity federation
//!
//! `serviceaccount.json` must contain exactly the keys of a Google service
//! account key file. URI-valued keys are matched against the allow-list;
//! `client_x509_cert_url` patterns may embed `{encoded_client_email}`, which is
//! substituted with the URL-encoded `client_email` of the same document.

use super::*;
use crate::allowpattern::ValidationContext;
use url::Url;

/// Placeholder expanded from the `client_email` sibling field
pub const CLIENT_EMAIL_PLACEHOLDER: &str = "{encoded_client_email}";

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

const SECRET_REGISTRY: &[(&str, FieldRule)] =
    &[("serviceaccount.json", FieldRule::required(validate_service_account_json, false))];

const SERVICE_ACCOUNT_REGISTRY: &[(&str, FieldRule)] = &[
    ("type", FieldRule::required(validate_service_account_type, true)),
    ("project_id", FieldRule::required(validate_project_id, true)),
    ("private_key_id", FieldRule::optional(string_matching_regex, true)),
    ("private_key", FieldRule::optional(validate_private_key, false)),
    ("client_email", FieldRule::optional(string_matching_regex, false)),
    ("client_id", FieldRule::optional(string_matching_regex, false)),
    ("auth_uri", FieldRule::optional(string_matching_uri, true)),
    ("token_uri", FieldRule::optional(string_matching_uri, true)),
    ("auth_provider_x509_cert_url", FieldRule::optional(string_matching_uri, true)),
    ("client_x509_cert_url", FieldRule::optional(validate_client_x509_cert_url, true)),
    ("universe_domain", FieldRule::optional(validate_universe_domain, true)),
];

const WORKLOAD_IDENTITY_REGISTRY: &[(&str, FieldRule)] = &[
    ("projectID", FieldRule::required(validate_project_id, true)),
    ("credentialsConfig", FieldRule::required(validate_credentials_config, true)),
];

const CREDENTIALS_CONFIG_REGISTRY: &[(&str, FieldRule)] = &[
    ("type", FieldRule::required(validate_external_account_type, true)),
    ("audience", FieldRule::required(validate_printable, true)),
    ("subject_token_type", FieldRule::required(validate_printable, true)),
    ("token_url", FieldRule::required(string_matching_uri, true)),
    ("service_account_impersonation_url", FieldRule::optional(string_matching_uri, true)),
    ("universe_domain", FieldRule::optional(validate_universe_domain, true)),
];

const PROJECT_ID_REGEX: &str = r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$";

/// Built-in GCP allow-list
pub fn default_gcp_allowed_patterns() -> Vec<Pattern> {
    vec![
        Pattern::regex_value("private_key_id", r"^[a-fA-F0-9]{40}$"),
        Pattern::regex_value("client_id", r"^[0-9]{15,25}$"),
        Pattern::regex_value(
            "client_email",
            r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.iam\.gserviceaccount\.com$",
        ),
        Pattern::regex_value("client_email", r"^[0-9]+-compute@developer\.gserviceaccount\.com$"),
        Pattern {
            field: "universe_domain".to_string(),
            host: Some("googleapis.com".to_string()),
            path: Some(String::new()),
            ..Default::default()
        },
        Pattern::uri("token_uri", "https://accounts.google.com/o/oauth2/token"),
        Pattern::uri("token_uri", "https://oauth2.googleapis.com/token"),
        Pattern::uri("auth_uri", "https://accounts.google.com/o/oauth2/auth"),
        Pattern::uri("auth_provider_x509_cert_url", "https://www.googleapis.com/oauth2/v1/certs"),
        Pattern {
            field: "client_x509_cert_url".to_string(),
            host: Some("www.googleapis.com".to_string()),
            path: Some(format!("/robot/v1/metadata/x509/{CLIENT_EMAIL_PLACEHOLDER}")),
            ..Default::default()
        },
        Pattern::uri("token_url", "https://sts.googleapis.com/v1/token"),
        Pattern::host_regex_path(
            "service_account_impersonation_url",
            "iamcredentials.googleapis.com",
            r"^/v1/projects/-/serviceAccounts/[^/:]+:generateAccessToken$",
        ),
    ]
}

pub fn gcp_validation_context() -> ValidationContext {
    ValidationContext {
        allowed_regex_fields: &["private_key_id", "client_id", "client_email"],
        strict_https: true,
        allowed_user_configurable_fields: &[
            "universe_domain",
            "token_uri",
            "auth_uri",
            "auth_provider_x509_cert_url",
            "client_x509_cert_url",
            "client_email",
            "token_url",
            "service_account_impersonation_url",
        ],
    }
}

pub struct GcpValidator {
    base: BaseValidator,
}

impl GcpValidator {
    pub fn new(allowed_patterns: Vec<Pattern>) -> Self {
        GcpValidator {
            base: BaseValidator::new(allowed_patterns),
        }
    }
}

impl CredentialValidator for GcpValidator {
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields> {
        let fields = coerce_secret_data(data);
        self.base
            .validate_with_registry(&fields, SECRET_REGISTRY, ValidationMode::Permissive)
    }

    fn validate_workload_identity_config(&self, provider_config: Option<&Value>) -> ValidationResult<Fields> {
        let fields = provider_config
            .and_then(Value::as_object)
            .ok_or_else(|| ValidationError::other("providerConfig is missing"))?;
        self.base
            .validate_with_registry(fields, WORKLOAD_IDENTITY_REGISTRY, ValidationMode::Permissive)
    }
}

fn validate_service_account_json(v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    let document: Fields = serde_json::from_str(s)
        .map_err(|e| ValidationError::other(format!("failed to unmarshal service account JSON: {e}")))?;
    v.validate_nested_fields_strict(&document, SERVICE_ACCOUNT_REGISTRY)
}

fn validate_credentials_config(v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let config = value
        .as_object()
        .ok_or_else(|| FieldError::new(field, "field value must be an object", ns))?;
    v.validate_nested_fields_strict(config, CREDENTIALS_CONFIG_REGISTRY)
}

fn validate_service_account_type(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    if s != "service_account" {
        return Err(FieldError::new(field, "type must be 'service_account'", ns)
            .with_value(s)
            .into());
    }
    Ok(())
}

fn validate_external_account_type(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    if s != "external_account" {
        return Err(FieldError::new(field, "type must be 'external_account'", ns)
            .with_value(s)
            .into());
    }
    Ok(())
}

fn validate_project_id(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    let re = Regex::new(PROJECT_ID_REGEX)
        .map_err(|e| FieldError::new(field, "invalid regex pattern", ns).with_cause(e))?;
    if !re.is_match(s) {
        return Err(FieldError::new(field, "field does not match the expected format", ns)
            .with_value(s)
            .into());
    }
    Ok(())
}

fn validate_printable(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    assert_printable_string(field, value, ns).map(|_| ())
}

fn validate_private_key(_v: &BaseValidator, field: &str, value: &Value, _all: &Fields, ns: bool) -> ValidationResult<()> {
    use x509_parser::der_parser::ber::BerObjectContent;

    let s = assert_string(field, value, ns)?;
    let block = decode_single_pem(field, s, ns)?;
    if block.tag() != "PRIVATE KEY" {
        return Err(FieldError::new(field, "field value must be a PKCS#8 PEM block (BEGIN PRIVATE KEY)", ns).into());
    }
    if block.headers().iter().next().is_some() {
        return Err(FieldError::new(field, "field value must not include PEM headers", ns).into());
    }
    check_private_key_der(field, block.tag(), block.contents(), ns)?;

    // PKCS#8 AlgorithmIdentifier must name rsaEncryption
    let is_rsa = x509_parser::der_parser::parse_der(block.contents())
        .ok()
        .and_then(|(_, obj)| obj.as_sequence().ok().and_then(|items| items.get(1).cloned()))
        .and_then(|alg| alg.as_sequence().ok().and_then(|a| a.first().cloned()))
        .is_some_and(|oid| match &oid.content {
            BerObjectContent::OID(oid) => oid.to_id_string() == RSA_ENCRYPTION_OID,
            _ => false,
        });
    if !is_rsa {
        return Err(FieldError::new(field, "field value must be an RSA private key", ns).into());
    }
    Ok(())
}

fn validate_client_x509_cert_url(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    v.validate_field_pattern(field, s, all, match_client_x509_cert_url, ns)
}

fn validate_universe_domain(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    v.validate_field_pattern(field, s, all, match_domain, ns)
}

/// A domain pattern is a bare host; URI parts are not allowed
fn match_domain(domain: &str, pattern: &Pattern, _credentials: &Fields, ns: bool) -> ValidationResult<()> {
    let field = pattern.field.as_str();
    if pattern.path.as_deref().is_some_and(|p| !p.is_empty()) || pattern.regex_path.is_some() || pattern.port.is_some() {
        return Err(FieldError::new(field, "domain patterns must not specify URI, path, or port", ns).into());
    }
    let host = match pattern.host.as_deref() {
        Some(h) if !h.is_empty() => h,
        _ => return Err(FieldError::new(field, "allowed domain (Host) must be set", ns).into()),
    };
    if domain != host {
        return Err(PatternMismatchError::with_values(field, "domain does not match allowed domain", domain, host, ns).into());
    }
    Ok(())
}

fn match_client_x509_cert_url(uri: &str, pattern: &Pattern, credentials: &Fields, ns: bool) -> ValidationResult<()> {
    let expanded = expand_placeholders(pattern, credentials)?;
    match_uri(uri, &expanded, credentials, ns)
}

/// Replace `{encoded_<field>}` tokens of a normalized pattern with the
/// URL-encoded value of the sibling field. The host must survive unchanged.
pub(crate) fn expand_placeholders(pattern: &Pattern, credentials: &Fields) -> ValidationResult<Pattern> {
    let field = pattern.field.as_str();
    let scheme = pattern.scheme.as_deref().filter(|s| !s.is_empty()).unwrap_or("https");
    let host = pattern.host.clone().unwrap_or_default();
    let path = pattern.path.clone().unwrap_or_default();
    let port = pattern.port.map(|p| format!(":{p}")).unwrap_or_default();

    let mut raw = format!("{scheme}://{host}{port}{path}");
    if !raw.contains("{encoded_") {
        return Ok(pattern.clone());
    }

    let placeholder_re = Regex::new(r"\{encoded_([A-Za-z0-9_]+)\}")
        .map_err(|e| FieldError::new(field, "invalid regex pattern", true).with_cause(e))?;
    let tokens: Vec<(String, String)> = placeholder_re
        .captures_iter(&raw)
        .map(|c| (c[0].to_string(), c[1].to_string()))
        .collect();

    for (token, sibling) in &tokens {
        if raw.matches(token.as_str()).count() > 1 {
            return Err(FieldError::new(
                field,
                format!("invalid pattern: multiple {token} placeholder occurrences"),
                true,
            )
            .into());
        }
        let Some(value) = credentials.get(sibling).and_then(Value::as_str) else {
            return Err(PatternMismatchError::new(field, format!("{sibling} required for pattern with {token}")).into());
        };
        raw = raw.replacen(token.as_str(), &urlencoding::encode(value), 1);
    }

    let parsed = Url::parse(&raw).map_err(|e| {
        FieldError::new(field, "invalid URI after placeholder replacement", true).with_cause(e)
    })?;
    let new_host = parsed.host_str().unwrap_or_default();
    if new_host != host {
        return Err(FieldError::new(
            field,
            format!("unexpected hostname change from {host} to {new_host} after placeholder replacement"),
            true,
        )
        .into());
    }

    let mut expanded = pattern.clone();
    expanded.path = Some(parsed.path().to_string());
    Ok(expanded)
}
