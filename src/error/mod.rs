//! Error types for gardenctl

use thiserror::Error;

/// Main error type for gardenctl
#[derive(Debug, Error)]
pub enum GctlError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("no garden targeted")]
    NoGardenTargeted,

    #[error("no project targeted")]
    NoProjectTargeted,

    #[error("no seed targeted")]
    NoSeedTargeted,

    #[error("no shoot targeted")]
    NoShootTargeted,

    #[error("control plane not targeted")]
    NoControlPlaneTargeted,

    #[error("seed {0:?} is not a managed seed")]
    NotManagedSeed(String),

    #[error("{0}")]
    Ambiguous(String),

    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{0}")]
    NoMatch(String),

    #[error("garden {0:?} is not defined in gardenctl configuration")]
    GardenNotDefined(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    FieldNotUserConfigurable(String),

    #[error("invalid pattern: {0}")]
    PatternValidation(String),

    #[error("the access restrictions of the targeted shoot have not been confirmed")]
    ConfirmationRequired,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GctlError {
    /// Stable name of the error kind, printed on stderr
    pub fn kind(&self) -> &'static str {
        match self {
            GctlError::Kube(_) => "KubeError",
            GctlError::NoGardenTargeted => "NoGardenTargeted",
            GctlError::NoProjectTargeted => "NoProjectTargeted",
            GctlError::NoSeedTargeted => "NoSeedTargeted",
            GctlError::NoShootTargeted => "NoShootTargeted",
            GctlError::NoControlPlaneTargeted => "NoControlPlaneTargeted",
            GctlError::NotManagedSeed(_) => "NotManagedSeed",
            GctlError::Ambiguous(_) => "Ambiguous",
            GctlError::NotFound { .. } => "NotFound",
            GctlError::NoMatch(_) => "NoMatch",
            GctlError::GardenNotDefined(_) => "GardenNotDefined",
            GctlError::InvalidMetadata(_) => "InvalidMetadata",
            GctlError::MalformedToken(_) => "MalformedToken",
            GctlError::InvalidCredentials(_) => "InvalidCredentials",
            GctlError::FieldNotUserConfigurable(_) => "FieldNotUserConfigurable",
            GctlError::PatternValidation(_) => "PatternValidation",
            GctlError::ConfirmationRequired => "ConfirmationRequired",
            GctlError::Config(_) => "ConfigError",
            GctlError::Kubeconfig(_) => "KubeconfigError",
            GctlError::Template(_) => "TemplateError",
            GctlError::Io(_) => "IOError",
            GctlError::Serialization(_) => "SerializationError",
            GctlError::InvalidArgument(_) => "InvalidArgument",
            GctlError::Cancelled => "Cancelled",
        }
    }

    /// Process exit code: 2 for policy errors, 1 for everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            GctlError::ConfirmationRequired => 2,
            _ => 1,
        }
    }

    /// Whether the error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            GctlError::NotFound { .. } => true,
            GctlError::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        GctlError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl From<serde_json::Error> for GctlError {
    fn from(e: serde_json::Error) -> Self {
        GctlError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for GctlError {
    fn from(e: serde_yaml::Error) -> Self {
        GctlError::Serialization(e.to_string())
    }
}

impl From<minijinja::Error> for GctlError {
    fn from(e: minijinja::Error) -> Self {
        GctlError::Template(e.to_string())
    }
}

/// Result type alias for gardenctl
pub type Result<T> = std::result::Result<T, GctlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(GctlError::ConfirmationRequired.exit_code(), 2);
        assert_eq!(GctlError::NoShootTargeted.exit_code(), 1);
        assert_eq!(GctlError::Ambiguous("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_not_found_display() {
        let err = GctlError::not_found("shoot", "my-shoot");
        assert_eq!(err.to_string(), "shoot \"my-shoot\" not found");
        assert!(err.is_not_found());
        assert_eq!(err.kind(), "NotFound");
    }
}
