//! Alibaba Cloud access keys

use super::*;

const ACCESS_KEY_ID_LEN: usize = 24;
const ACCESS_KEY_SECRET_LEN: usize = 30;

const SECRET_REGISTRY: &[(&str, FieldRule)] = &[
    ("accessKeyID", FieldRule::required(validate_access_key_id, true)),
    ("accessKeySecret", FieldRule::required(validate_access_key_secret, false)),
];

pub struct AliCloudValidator {
    base: BaseValidator,
}

impl AliCloudValidator {
    pub fn new() -> Self {
        AliCloudValidator {
            base: BaseValidator::new(vec![
                Pattern::regex_value("accessKeyID", r"^LTAI[A-Za-z0-9]{20}$"),
                Pattern::regex_value("accessKeySecret", r"^[A-Za-z0-9]{30}$"),
            ]),
        }
    }
}

impl Default for AliCloudValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialValidator for AliCloudValidator {
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields> {
        let fields = coerce_secret_data(data);
        self.base
            .validate_with_registry(&fields, SECRET_REGISTRY, ValidationMode::Permissive)
    }
}

fn validate_access_key_id(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_exact_length(field, s, ACCESS_KEY_ID_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}

fn validate_access_key_secret(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_exact_length(field, s, ACCESS_KEY_SECRET_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}
