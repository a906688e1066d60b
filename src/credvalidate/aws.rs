//! AWS access keys and workload identity role ARNs

use super::*;

const ACCESS_KEY_ID_LEN: usize = 20;
const SECRET_ACCESS_KEY_LEN: usize = 40;
const ROLE_ARN_MIN_LEN: usize = 20;
const ROLE_ARN_MAX_LEN: usize = 2048;

const SECRET_REGISTRY: &[(&str, FieldRule)] = &[
    ("accessKeyID", FieldRule::required(validate_access_key_id, true)),
    ("secretAccessKey", FieldRule::required(validate_secret_access_key, false)),
];

const WORKLOAD_IDENTITY_REGISTRY: &[(&str, FieldRule)] = &[("roleARN", FieldRule::required(validate_role_arn, true))];

pub struct AwsValidator {
    base: BaseValidator,
}

impl AwsValidator {
    pub fn new() -> Self {
        AwsValidator {
            base: BaseValidator::new(vec![
                Pattern::regex_value("accessKeyID", r"^(AKIA|ASIA)[A-Z0-9]{16}$"),
                Pattern::regex_value("secretAccessKey", r"^[A-Za-z0-9/+=]{40}$"),
                Pattern::regex_value(
                    "roleARN",
                    r"^arn:(?:aws|aws-us-gov|aws-cn|aws-iso|aws-iso-b):iam::\d{12}:role(?:/[\w+=,.@-]+)+$",
                ),
            ]),
        }
    }
}

impl Default for AwsValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialValidator for AwsValidator {
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

fn validate_access_key_id(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_exact_length(field, s, ACCESS_KEY_ID_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}

fn validate_secret_access_key(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_exact_length(field, s, SECRET_ACCESS_KEY_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}

fn validate_role_arn(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_string(field, value, ns)?;
    validate_min_length(field, s, ROLE_ARN_MIN_LEN, ns)?;
    validate_max_length(field, s, ROLE_ARN_MAX_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}
