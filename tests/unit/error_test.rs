//! Tests for src/error/mod.rs - GctlError

use gardenctl::error::GctlError;

// ============================================================================
// GctlError Display tests
// ============================================================================

#[test]
fn test_garden_not_defined_display() {
    let err = GctlError::GardenNotDefined("dev".to_string());
    assert_eq!(err.to_string(), "garden \"dev\" is not defined in gardenctl configuration");
    assert_eq!(err.kind(), "GardenNotDefined");
}

#[test]
fn test_invalid_credentials_display() {
    let err = GctlError::InvalidCredentials("field token_uri does not match".to_string());
    assert!(err.to_string().starts_with("invalid credentials: "));
    assert_eq!(err.kind(), "InvalidCredentials");
}

#[test]
fn test_confirmation_required_is_policy_error() {
    let err = GctlError::ConfirmationRequired;
    assert_eq!(err.kind(), "ConfirmationRequired");
    assert_eq!(err.exit_code(), 2);
}

// ============================================================================
// Conversion tests
// ============================================================================

#[test]
fn test_from_io_error() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: GctlError = io.into();
    assert_eq!(err.kind(), "IOError");
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_from_serde_yaml_error() {
    let yaml_err = serde_yaml::from_str::<Vec<String>>("{").unwrap_err();
    let err: GctlError = yaml_err.into();
    assert_eq!(err.kind(), "SerializationError");
}

#[test]
fn test_not_found_helper() {
    let err = GctlError::not_found("project", "prod");
    assert!(err.is_not_found());
    assert!(!GctlError::Cancelled.is_not_found());
}
