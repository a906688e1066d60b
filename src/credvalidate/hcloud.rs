//! Hetzner Cloud API tokens

use super::*;

const TOKEN_LEN: usize = 64;

const SECRET_REGISTRY: &[(&str, FieldRule)] = &[("hcloudToken", FieldRule::required(validate_token, false))];

pub struct HCloudValidator {
    base: BaseValidator,
}

impl HCloudValidator {
    pub fn new() -> Self {
        HCloudValidator {
            base: BaseValidator::new(vec![Pattern::regex_value("hcloudToken", r"^[A-Za-z0-9]{64}$")]),
        }
    }
}

impl Default for HCloudValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialValidator for HCloudValidator {
    fn validate_secret(&self, data: &BTreeMap<String, Vec<u8>>) -> ValidationResult<Fields> {
        let fields = coerce_secret_data(data);
        self.base
            .validate_with_registry(&fields, SECRET_REGISTRY, ValidationMode::Permissive)
    }
}

fn validate_token(v: &BaseValidator, field: &str, value: &Value, all: &Fields, ns: bool) -> ValidationResult<()> {
    let s = assert_printable_string(field, value, ns)?;
    validate_exact_length(field, s, TOKEN_LEN, ns)?;
    v.validate_field_pattern(field, s, all, match_regex_value, ns)
}
