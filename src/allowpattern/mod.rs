//! Allow-list patterns for credential fields
//!
//! A [`Pattern`] restricts the value a credential field may take. URI-shaped
//! fields are matched by scheme, host, port and path (exact or regex), scalar
//! fields by `regexValue`. Patterns come from three sources which are merged
//! in order: built-in defaults, the configuration file and command-line flags.
//! Everything a user supplies is marked `is_user_provided` and must target a
//! field the provider's [`ValidationContext`] lets users configure.

use crate::error::GctlError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors produced while parsing or validating patterns
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("{0}")]
    NotUserConfigurable(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<PatternError> for GctlError {
    fn from(e: PatternError) -> Self {
        match e {
            PatternError::NotUserConfigurable(msg) => GctlError::FieldNotUserConfigurable(msg),
            PatternError::Invalid(msg) => GctlError::PatternValidation(msg),
        }
    }
}

type PatternResult<T> = std::result::Result<T, PatternError>;

/// Per-provider rules a pattern is validated against
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    /// Fields that may use `regexValue`
    pub allowed_regex_fields: &'static [&'static str],
    /// Only `https` is accepted when set; otherwise `http` is allowed too
    pub strict_https: bool,
    /// Fields users may supply patterns for; all others are locked
    pub allowed_user_configurable_fields: &'static [&'static str],
}

impl ValidationContext {
    fn is_user_configurable(&self, field: &str) -> bool {
        self.allowed_user_configurable_fields.contains(&field)
    }

    fn allows_regex(&self, field: &str) -> bool {
        self.allowed_regex_fields.contains(&field)
    }
}

/// A single allow-list entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawPattern")]
pub struct Pattern {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip)]
    pub is_user_provided: bool,
}

/// Wire shape of a pattern; anything deserialized is user provided
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPattern {
    #[serde(default)]
    field: String,
    host: Option<String>,
    port: Option<u32>,
    path: Option<String>,
    uri: Option<String>,
    regex_path: Option<String>,
    regex_value: Option<String>,
    scheme: Option<String>,
}

impl From<RawPattern> for Pattern {
    fn from(raw: RawPattern) -> Self {
        Pattern {
            field: raw.field,
            host: raw.host,
            port: raw.port,
            path: raw.path,
            uri: raw.uri.filter(|u| !u.is_empty()),
            regex_path: raw.regex_path,
            regex_value: raw.regex_value,
            scheme: raw.scheme,
            is_user_provided: true,
        }
    }
}

impl Pattern {
    /// Built-in pattern matching an exact URI
    pub fn uri(field: &str, uri: &str) -> Self {
        Pattern {
            field: field.to_string(),
            uri: Some(uri.to_string()),
            ..Default::default()
        }
    }

    /// Built-in pattern matching a host and a path regex
    pub fn host_regex_path(field: &str, host: &str, regex_path: &str) -> Self {
        Pattern {
            field: field.to_string(),
            host: Some(host.to_string()),
            regex_path: Some(regex_path.to_string()),
            ..Default::default()
        }
    }

    /// Built-in pattern matching a scalar value by regex
    pub fn regex_value(field: &str, regex: &str) -> Self {
        Pattern {
            field: field.to_string(),
            regex_value: Some(regex.to_string()),
            ..Default::default()
        }
    }

    /// Validate the pattern's shape against a provider context
    pub fn validate_with_context(&self, ctx: &ValidationContext) -> PatternResult<()> {
        let field = &self.field;
        if field.is_empty() {
            return Err(invalid("field is required"));
        }

        if self.is_user_provided {
            if ctx.allowed_user_configurable_fields.is_empty() {
                return Err(PatternError::NotUserConfigurable(format!(
                    "field {field} cannot be configured by users; no user-configurable fields are allowed for this provider"
                )));
            }
            if !ctx.is_user_configurable(field) {
                return Err(PatternError::NotUserConfigurable(format!(
                    "field {field} cannot be configured by users"
                )));
            }
        }

        if let Some(regex_value) = &self.regex_value {
            if ctx.allowed_regex_fields.is_empty() {
                return Err(invalid(format!("regexValue is not allowed for field {field}")));
            }
            if !ctx.allows_regex(field) {
                return Err(invalid(format!(
                    "regexValue is not allowed for field {field}, only allowed for: {}",
                    ctx.allowed_regex_fields.join(", ")
                )));
            }
            if self.uri.is_some()
                || self.host.is_some()
                || self.path.is_some()
                || self.regex_path.is_some()
                || self.port.is_some()
            {
                return Err(invalid(format!(
                    "regexValue cannot be used together with uri, host, path, regexPath, or port for field {field}"
                )));
            }
            if regex_value.is_empty() {
                return Err(invalid(format!("regexValue must not be empty for field {field}")));
            }
            Regex::new(regex_value).map_err(|e| {
                invalid(format!("invalid regexValue pattern for field {field}: {e}"))
            })?;
            return Ok(());
        }

        if let Some(uri) = &self.uri {
            if self.host.is_some() || self.path.is_some() || self.regex_path.is_some() || self.port.is_some() {
                return Err(invalid(format!(
                    "uri cannot be used together with host, path, regexPath, or port for field {field}"
                )));
            }
            parse_and_validate_endpoint_url(uri, ctx.strict_https)
                .map_err(|e| invalid(format!("invalid value for field {field}: {e}")))?;
            return Ok(());
        }

        let host = match self.host.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(invalid(format!(
                    "host is required when uri is not provided for field {field}"
                )))
            }
        };

        let scheme = self.scheme.as_deref().filter(|s| !s.is_empty()).unwrap_or("https");
        validate_scheme_host_port(scheme, host, self.port, ctx.strict_https)
            .map_err(|e| invalid(format!("invalid value for field {field}: {e}")))?;

        match (&self.path, &self.regex_path) {
            (None, None) => Err(invalid(format!(
                "either uri must be provided, or at least one of path or regexPath must be set for field {field}"
            ))),
            (Some(_), Some(_)) => Err(invalid(format!(
                "path and regexPath are mutually exclusive for field {field}"
            ))),
            (None, Some(regex_path)) => {
                if regex_path.is_empty() {
                    return Err(invalid(format!("regexPath must not be empty for field {field}")));
                }
                Regex::new(regex_path)
                    .map_err(|e| invalid(format!("invalid regex pattern for field {field}: {e}")))?;
                Ok(())
            }
            (Some(_), None) => Ok(()),
        }
    }

    /// Expand the `uri` shorthand into scheme, host, port and path
    pub fn to_normalized(&self) -> PatternResult<Pattern> {
        let mut normalized = self.clone();
        if let Some(uri) = &self.uri {
            let parsed = Url::parse(uri).map_err(|e| {
                invalid(format!("failed to parse URI for field {}: {e}", self.field))
            })?;
            normalized.scheme = Some(parsed.scheme().to_string());
            normalized.host = Some(parsed.host_str().unwrap_or_default().to_string());
            normalized.port = parsed.port().map(u32::from);
            normalized.path = Some(parsed.path().to_string());
            normalized.uri = None;
        }
        Ok(normalized)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(v) = &self.regex_value {
            parts.push(format!("regexValue:{v}"));
        }
        if let Some(v) = &self.uri {
            parts.push(format!("uri:{v}"));
        }
        if let Some(v) = &self.scheme {
            parts.push(format!("scheme:{v}"));
        }
        if let Some(v) = &self.host {
            parts.push(format!("host:{v}"));
        }
        if let Some(v) = self.port {
            parts.push(format!("port:{v}"));
        }
        if let Some(v) = &self.path {
            parts.push(format!("path:{v}"));
        }
        if let Some(v) = &self.regex_path {
            parts.push(format!("regexPath:{v}"));
        }

        if parts.is_empty() {
            write!(f, "unknown")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

/// Parse command-line patterns: JSON objects and `field=uri` shorthands
pub fn parse_allowed_patterns(
    ctx: &ValidationContext,
    json_patterns: &[String],
    uri_patterns: &[String],
) -> PatternResult<Vec<Pattern>> {
    let mut patterns = Vec::with_capacity(json_patterns.len() + uri_patterns.len());

    for raw in json_patterns {
        let pattern: Pattern = serde_json::from_str(raw)
            .map_err(|e| invalid(format!("could not parse JSON pattern {raw}: {e}")))?;
        pattern.validate_with_context(ctx).map_err(|e| match e {
            PatternError::NotUserConfigurable(msg) => PatternError::NotUserConfigurable(msg),
            PatternError::Invalid(msg) => {
                invalid(format!("validation failed for JSON pattern {raw}: {msg}"))
            }
        })?;
        patterns.push(pattern);
    }

    for raw in uri_patterns {
        let (field, uri) = raw
            .split_once('=')
            .ok_or_else(|| invalid(format!("invalid URI pattern: {raw}")))?;
        let pattern = Pattern {
            field: field.to_string(),
            uri: Some(uri.to_string()),
            is_user_provided: true,
            ..Default::default()
        };
        pattern.validate_with_context(ctx).map_err(|e| match e {
            PatternError::NotUserConfigurable(msg) => PatternError::NotUserConfigurable(msg),
            PatternError::Invalid(msg) => invalid(format!("invalid URI pattern {raw}: {msg}")),
        })?;
        patterns.push(pattern);
    }

    Ok(patterns)
}

/// Parse an endpoint URL, rejecting userinfo, query and fragment
pub fn parse_and_validate_endpoint_url(raw: &str, strict_https: bool) -> PatternResult<Url> {
    let parsed = Url::parse(raw).map_err(|_| invalid("invalid URI"))?;

    validate_scheme_host_port(
        parsed.scheme(),
        parsed.host_str().unwrap_or_default(),
        parsed.port().map(u32::from),
        strict_https,
    )?;

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(invalid("must not contain userinfo"));
    }
    if parsed.query().is_some() {
        return Err(invalid("must not contain query parameters"));
    }
    if parsed.fragment().is_some() {
        return Err(invalid("must not contain fragments"));
    }

    Ok(parsed)
}

fn validate_scheme_host_port(
    scheme: &str,
    host: &str,
    port: Option<u32>,
    strict_https: bool,
) -> PatternResult<()> {
    let allowed: &[&str] = if strict_https { &["https"] } else { &["https", "http"] };

    if !allowed.contains(&scheme) {
        return Err(invalid(format!(
            "scheme must be one of {{{}}}, got {scheme:?}",
            allowed.join(", ")
        )));
    }
    if host.is_empty() {
        return Err(invalid("hostname is required"));
    }
    if let Some(port) = port {
        if !(1..=65535).contains(&port) {
            return Err(invalid("port must be between 1 and 65535"));
        }
    }

    Ok(())
}

fn invalid(msg: impl Into<String>) -> PatternError {
    PatternError::Invalid(msg.into())
}
