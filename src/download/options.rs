//! Download configuration and override composition.
//!
//! [`DownloadOptions`] is always complete. Callers describe what they want
//! changed with an [`OptionsOverride`], whose every field (and every field of
//! its nested branches) is optional, and compose it onto the defaults with
//! [`DownloadOptions::compose`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::archive::DecompressOptions;

/// Default cap on followed redirects.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// How the response body is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Raw bytes, untouched.
    #[default]
    #[serde(alias = "buffer")]
    Bytes,
    /// Decoded with the configured [`TextEncoding`] and re-encoded as UTF-8.
    Text,
}

/// Character encoding used when [`ResponseType::Text`] is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "iso-8859-1", alias = "binary")]
    Latin1,
}

/// Options for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    pub response_type: ResponseType,
    pub encoding: TextEncoding,
    /// Reject invalid TLS certificates. Only disable for trusted hosts.
    pub verify_tls: bool,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Replaces the crate's default User-Agent when set.
    pub user_agent: Option<String>,
    pub max_redirects: usize,
    /// No connect timeout is applied unless set.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Bytes,
            encoding: TextEncoding::Utf8,
            verify_tls: true,
            headers: BTreeMap::new(),
            user_agent: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            connect_timeout_secs: None,
        }
    }
}

/// Complete configuration for one download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    pub transport: TransportOptions,
    pub decompress: DecompressOptions,
    /// Output filename relative to the output directory. Skips filename
    /// resolution entirely when set.
    pub filename: Option<String>,
    /// Unpack the payload when it is a recognized archive.
    pub extract: bool,
}

impl DownloadOptions {
    /// Defaults with `overrides` applied.
    #[must_use]
    pub fn compose(overrides: &OptionsOverride) -> Self {
        Self::default().merged(overrides)
    }

    /// Returns a copy of `self` with every field present in `overrides`
    /// replaced. Nested branches merge field by field and headers merge key
    /// by key; `self` is left untouched.
    #[must_use]
    pub fn merged(&self, overrides: &OptionsOverride) -> Self {
        let mut merged = self.clone();

        if let Some(transport) = &overrides.transport {
            transport.apply(&mut merged.transport);
        }
        if let Some(decompress) = &overrides.decompress {
            decompress.apply(&mut merged.decompress);
        }
        if let Some(filename) = &overrides.filename {
            merged.filename = Some(filename.clone());
        }
        if let Some(extract) = overrides.extract {
            merged.extract = extract;
        }

        merged
    }

    #[must_use]
    pub fn extract(mut self, extract: bool) -> Self {
        self.extract = extract;
        self
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn decompress(mut self, decompress: DecompressOptions) -> Self {
        self.decompress = decompress;
        self
    }

    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.transport.response_type = response_type;
        self
    }

    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.transport.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.headers.insert(name.into(), value.into());
        self
    }
}

/// Error for an override document that cannot be read at all.
///
/// Individual fields with the wrong type never produce this; they are
/// ignored with a warning.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("malformed options document: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    #[error("options document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Partial [`DownloadOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptionsOverride {
    #[serde(deserialize_with = "lenient")]
    pub transport: Option<TransportOverride>,
    #[serde(deserialize_with = "lenient")]
    pub decompress: Option<DecompressOverride>,
    #[serde(deserialize_with = "lenient")]
    pub filename: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub extract: Option<bool>,
}

/// Partial [`TransportOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportOverride {
    #[serde(deserialize_with = "lenient")]
    pub response_type: Option<ResponseType>,
    #[serde(deserialize_with = "lenient")]
    pub encoding: Option<TextEncoding>,
    #[serde(deserialize_with = "lenient")]
    pub verify_tls: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(deserialize_with = "lenient")]
    pub user_agent: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_redirects: Option<usize>,
    #[serde(deserialize_with = "lenient")]
    pub connect_timeout_secs: Option<u64>,
}

/// Partial [`DecompressOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecompressOverride {
    #[serde(deserialize_with = "lenient")]
    pub strip: Option<usize>,
    #[serde(deserialize_with = "lenient")]
    pub preserve_mode: Option<bool>,
}

impl OptionsOverride {
    /// Parses an override document.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] when `json` is not valid JSON or is not an
    /// object.
    pub fn from_json_str(json: &str) -> Result<Self, OptionsError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|source| OptionsError::Malformed { source })?;
        Self::from_json_value(value)
    }

    /// Builds an override from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::NotAnObject`] unless `value` is an object
    /// (`null` is accepted as an empty override).
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, OptionsError> {
        let found = match &value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(_) => None,
            serde_json::Value::Bool(_) => Some("a boolean"),
            serde_json::Value::Number(_) => Some("a number"),
            serde_json::Value::String(_) => Some("a string"),
            serde_json::Value::Array(_) => Some("an array"),
        };
        if let Some(found) = found {
            return Err(OptionsError::NotAnObject { found });
        }
        serde_json::from_value(value).map_err(|source| OptionsError::Malformed { source })
    }
}

impl TransportOverride {
    fn apply(&self, target: &mut TransportOptions) {
        if let Some(response_type) = self.response_type {
            target.response_type = response_type;
        }
        if let Some(encoding) = self.encoding {
            target.encoding = encoding;
        }
        if let Some(verify_tls) = self.verify_tls {
            target.verify_tls = verify_tls;
        }
        if let Some(headers) = &self.headers {
            target
                .headers
                .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(user_agent) = &self.user_agent {
            target.user_agent = Some(user_agent.clone());
        }
        if let Some(max_redirects) = self.max_redirects {
            target.max_redirects = max_redirects;
        }
        if let Some(secs) = self.connect_timeout_secs {
            target.connect_timeout_secs = Some(secs);
        }
    }
}

impl DecompressOverride {
    fn apply(&self, target: &mut DecompressOptions) {
        if let Some(strip) = self.strip {
            target.strip = strip;
        }
        if let Some(preserve_mode) = self.preserve_mode {
            target.preserve_mode = preserve_mode;
        }
    }
}

/// Deserializes an optional field, treating a value of the wrong shape as
/// absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(error) => {
            warn!(
                error = %error,
                expected = std::any::type_name::<T>(),
                "ignoring option override with unexpected type"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DownloadOptions::default();
        assert_eq!(options.transport.response_type, ResponseType::Bytes);
        assert_eq!(options.transport.encoding, TextEncoding::Utf8);
        assert!(options.transport.verify_tls);
        assert!(options.transport.headers.is_empty());
        assert_eq!(options.transport.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(options.decompress, DecompressOptions::default());
        assert!(options.filename.is_none());
        assert!(!options.extract);
    }

    #[test]
    fn test_compose_empty_override_yields_defaults() {
        let options = DownloadOptions::compose(&OptionsOverride::default());
        assert_eq!(options, DownloadOptions::default());
    }

    #[test]
    fn test_nested_override_keeps_sibling_branches() {
        let overrides =
            OptionsOverride::from_json_str(r#"{"transport": {"response_type": "text"}}"#).unwrap();
        let options = DownloadOptions::compose(&overrides);

        assert_eq!(options.transport.response_type, ResponseType::Text);
        assert!(options.transport.verify_tls);
        assert_eq!(options.decompress, DecompressOptions::default());
    }

    #[test]
    fn test_override_replaces_individual_fields() {
        let overrides = OptionsOverride::from_json_str(
            r#"{"decompress": {"strip": 1}, "extract": true, "filename": "out.bin"}"#,
        )
        .unwrap();
        let options = DownloadOptions::compose(&overrides);

        assert_eq!(options.decompress.strip, 1);
        assert!(options.decompress.preserve_mode);
        assert!(options.extract);
        assert_eq!(options.filename.as_deref(), Some("out.bin"));
    }

    #[test]
    fn test_headers_merge_key_by_key() {
        let base = DownloadOptions::default()
            .header("accept", "*/*")
            .header("x-token", "old");
        let overrides = OptionsOverride::from_json_str(
            r#"{"transport": {"headers": {"x-token": "new", "x-extra": "1"}}}"#,
        )
        .unwrap();

        let merged = base.merged(&overrides);
        assert_eq!(merged.transport.headers.get("accept").unwrap(), "*/*");
        assert_eq!(merged.transport.headers.get("x-token").unwrap(), "new");
        assert_eq!(merged.transport.headers.get("x-extra").unwrap(), "1");
        assert_eq!(base.transport.headers.get("x-token").unwrap(), "old");
    }

    #[test]
    fn test_wrong_typed_field_is_ignored() {
        let overrides = OptionsOverride::from_json_str(
            r#"{"extract": "yes", "transport": {"verify_tls": 0, "max_redirects": 3}}"#,
        )
        .unwrap();
        assert_eq!(overrides.extract, None);

        let options = DownloadOptions::compose(&overrides);
        assert!(!options.extract);
        assert!(options.transport.verify_tls);
        assert_eq!(options.transport.max_redirects, 3);
    }

    #[test]
    fn test_wrong_typed_branch_is_ignored() {
        let overrides =
            OptionsOverride::from_json_str(r#"{"decompress": 5, "extract": true}"#).unwrap();
        assert!(overrides.decompress.is_none());
        assert_eq!(overrides.extract, Some(true));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let overrides = OptionsOverride::from_json_str(r#"{"retries": 3}"#).unwrap();
        assert_eq!(overrides, OptionsOverride::default());
    }

    #[test]
    fn test_response_type_aliases() {
        let overrides = OptionsOverride::from_json_str(
            r#"{"transport": {"response_type": "buffer", "encoding": "iso-8859-1"}}"#,
        )
        .unwrap();
        let transport = overrides.transport.unwrap();
        assert_eq!(transport.response_type, Some(ResponseType::Bytes));
        assert_eq!(transport.encoding, Some(TextEncoding::Latin1));
    }

    #[test]
    fn test_malformed_document_is_error() {
        let result = OptionsOverride::from_json_str("{not json");
        assert!(matches!(result, Err(OptionsError::Malformed { .. })));
    }

    #[test]
    fn test_non_object_document_is_error() {
        let result = OptionsOverride::from_json_str("[1, 2]");
        assert!(matches!(
            result,
            Err(OptionsError::NotAnObject { found: "an array" })
        ));
        assert_eq!(
            OptionsOverride::from_json_str("null").unwrap(),
            OptionsOverride::default()
        );
    }

    #[test]
    fn test_compose_does_not_leak_between_calls() {
        let overrides = OptionsOverride {
            extract: Some(true),
            ..OptionsOverride::default()
        };
        let first = DownloadOptions::compose(&overrides);
        let second = DownloadOptions::compose(&OptionsOverride::default());
        assert!(first.extract);
        assert!(!second.extract);
    }
}
