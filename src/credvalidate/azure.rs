//! Azure service principals

use super::*;

const GUID_PATTERN: &str = r"^[0-9A-Fa-f]{8}-([0-9A-Fa-f]{4}-){3}[0-9A-Fa-f]{12}$";
const CLIENT_SECRET_MIN_LEN: usize = 32;
const CLIENT_SECRET_MAX_LEN: usize = 44;

const SECRET_REGISTRY: &[(&str, FieldRule)] = &[
    ("subscriptionID", FieldRule::required(string_matching_regex, true)),
    ("tenantID", FieldRule::required(string_matching_regex, true)),
    ("clientID", FieldRule::required(string_matching_regex, true)),
    ("clientSecret", FieldRule::required(validate_client_secret, false)),
];

// Workload identity federation carries no client secret.
const WORKLOAD_IDENTITY_REGISTRY: &[(&str, FieldRule)] = &[
    ("subscriptionID", FieldRule::required(string_matching_regex, true)),
    ("tenantID", FieldRule::required(string_matching_regex, true)),
    ("clientID", FieldRule::required(string_matching_regex, true)),
];

pub struct AzureValidator {
    base: BaseValidator,
}

impl AzureValidator {
    pub fn new() -> Self {
        AzureValidator {
            base: BaseValidator::new(vec![
                Pattern::regex_value("subscriptionID", GUID_PATTERN),
                Pattern::regex_value("tenantID", GUID_PATTERN),
                Pattern::regex_value("clientID", GUID_PATTERN),
                Pattern::regex_value("clientSecret", r"^[A-Za-z0-9._:~+/=@?\[\]-]+$"),
            ]),
        }
    }
}

impl Default for AzureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialValidator for AzureValidator {
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

fn validate_client_secret(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    validate_min_length(field, s, CLIENT_SECRET_MIN_LEN, ns)?;
    validate_max_length(field, s, CLIENT_SECRET_MAX_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}
