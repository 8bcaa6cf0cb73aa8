//! Filename resolution and sanitization for saved downloads.
//!
//! A [`FilenameResolver`] walks an ordered list of [`FilenameStrategy`]s and
//! takes the first name offered. The default chain prefers the
//! `Content-Disposition` header, then the last URL path segment (with an
//! extension sniffed from the body or derived from `Content-Type` when the
//! segment has none), then `download`. Whatever wins is passed through
//! [`sanitize_filename`].

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::client::ResponseMetadata;
use super::error::DownloadError;
use super::sniff;

/// Name used when nothing better is available.
pub const FALLBACK_FILENAME: &str = "download";

/// Longest sanitized filename, in characters.
const MAX_FILENAME_CHARS: usize = 100;

/// Device names Windows refuses as file stems.
const WINDOWS_RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Inputs available to filename strategies.
#[derive(Debug, Clone)]
pub struct FilenameContext<'a> {
    /// The URL as requested (not the post-redirect URL).
    pub url: Option<Url>,
    pub content_disposition: Option<&'a str>,
    pub content_type: Option<&'a str>,
    /// The fully materialized body, for signature sniffing.
    pub body: &'a [u8],
}

impl<'a> FilenameContext<'a> {
    #[must_use]
    pub fn from_response(metadata: &'a ResponseMetadata, body: &'a [u8]) -> Self {
        Self {
            url: Url::parse(&metadata.request_url).ok(),
            content_disposition: metadata.content_disposition(),
            content_type: metadata.content_type(),
            body,
        }
    }
}

/// One step in the filename chain. Returning `None` defers to the next step.
pub trait FilenameStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn resolve(&self, context: &FilenameContext<'_>) -> Option<String>;
}

/// Uses the `filename*` or `filename` parameter of `Content-Disposition`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentDispositionStrategy;

impl FilenameStrategy for ContentDispositionStrategy {
    fn name(&self) -> &'static str {
        "content-disposition"
    }

    fn resolve(&self, context: &FilenameContext<'_>) -> Option<String> {
        context
            .content_disposition
            .and_then(parse_content_disposition)
    }
}

/// Uses the last path segment of the request URL, adding an extension when
/// the segment has none.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlPathStrategy;

impl FilenameStrategy for UrlPathStrategy {
    fn name(&self) -> &'static str {
        "url-path"
    }

    fn resolve(&self, context: &FilenameContext<'_>) -> Option<String> {
        let segment = last_path_segment(context.url.as_ref()?)?;
        Some(with_inferred_extension(segment, context))
    }
}

/// Ordered chain of strategies with a guaranteed fallback.
pub struct FilenameResolver {
    strategies: Vec<Box<dyn FilenameStrategy>>,
}

impl std::fmt::Debug for FilenameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("FilenameResolver")
            .field("strategies", &names)
            .finish()
    }
}

impl Default for FilenameResolver {
    fn default() -> Self {
        Self::empty()
            .with_strategy(ContentDispositionStrategy)
            .with_strategy(UrlPathStrategy)
    }
}

impl FilenameResolver {
    /// A resolver with no strategies; it always yields the fallback.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy to the end of the chain.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl FilenameStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Runs the chain. Never fails and never returns an empty name.
    #[must_use]
    pub fn resolve(&self, context: &FilenameContext<'_>) -> String {
        for strategy in &self.strategies {
            if let Some(candidate) = strategy.resolve(context)
                && !candidate.trim().is_empty()
            {
                let filename = sanitize_filename(&candidate);
                debug!(strategy = strategy.name(), %filename, "filename resolved");
                return filename;
            }
        }

        let filename = sanitize_filename(&with_inferred_extension(
            FALLBACK_FILENAME.to_string(),
            context,
        ));
        debug!(strategy = "fallback", %filename, "filename resolved");
        filename
    }
}

/// Resolves a filename for a response with the default chain.
#[must_use]
pub fn resolve_filename(metadata: &ResponseMetadata, body: &[u8]) -> String {
    FilenameResolver::default().resolve(&FilenameContext::from_response(metadata, body))
}

/// Last non-empty path segment, so `/releases/v1.2/` yields `v1.2`.
fn last_path_segment(url: &Url) -> Option<String> {
    let last = url.path_segments()?.rev().find(|segment| !segment.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), Cow::into_owned);
    Some(decoded)
}

/// Appends `.ext` to `base` when it has no extension and one can be inferred
/// from the body signature or, failing that, an unambiguous `Content-Type`.
fn with_inferred_extension(base: String, context: &FilenameContext<'_>) -> String {
    if Path::new(&base).extension().is_some() {
        return base;
    }

    let extension = sniff::classify(context.body)
        .map(|kind| kind.extension)
        .or_else(|| context.content_type.and_then(sniff::extension_for_mime));

    match extension {
        Some(extension) => format!("{base}.{extension}"),
        None => base,
    }
}

/// Parses a `Content-Disposition` header value and returns its filename.
///
/// Handles:
/// - `attachment; filename="example.pdf"` (backslash escapes honoured)
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example%20file.pdf` (RFC 5987)
///
/// `filename*` wins when both forms are present.
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for parameter in split_parameters(header) {
        let Some((name, value)) = parameter.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        match name.as_str() {
            "filename*" => {
                if let Some(decoded) = decode_extended_value(unquote(value).as_ref())
                    && !decoded.is_empty()
                {
                    return Some(decoded);
                }
            }
            "filename" => {
                let unquoted = unquote(value);
                if !unquoted.is_empty() {
                    plain = Some(unquoted.into_owned());
                }
            }
            _ => {}
        }
    }

    plain
}

/// Splits header parameters on `;`, ignoring separators inside quotes.
fn split_parameters(header: &str) -> Vec<&str> {
    let mut parameters = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (index, ch) in header.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parameters.push(header[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    parameters.push(header[start..].trim());
    parameters
}

/// Strips surrounding quotes and resolves `\"` and `\\` escapes.
fn unquote(value: &str) -> Cow<'_, str> {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return Cow::Borrowed(value);
    };
    if !inner.contains('\\') {
        return Cow::Borrowed(inner);
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(next) = chars.next()
        {
            out.push(next);
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

/// Decodes an RFC 5987 `charset'language'value` string.
fn decode_extended_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?.to_ascii_lowercase();
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    match charset.as_str() {
        "utf-8" | "" => Some(String::from_utf8_lossy(&bytes).into_owned()),
        "iso-8859-1" | "latin1" => Some(bytes.iter().copied().map(char::from).collect()),
        _ => None,
    }
}

/// Sanitizes a filename for filesystem safety.
///
/// Characters that are invalid on common filesystems (`/ \ : * ? " < > |`)
/// and control characters become `_`. Dot-only names are rewritten, Windows
/// device names get a `_` suffix, and names longer than 100 characters are
/// truncated with the extension kept.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    let sanitized = if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    };

    truncate_keeping_extension(&escape_reserved(sanitized))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

fn escape_reserved(name: String) -> String {
    let stem_end = name.find('.').unwrap_or(name.len());
    let stem = &name[..stem_end];
    if WINDOWS_RESERVED
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
    {
        format!("{stem}_{}", &name[stem_end..])
    } else {
        name
    }
}

fn truncate_keeping_extension(name: &str) -> String {
    if name.chars().count() <= MAX_FILENAME_CHARS {
        return name.to_string();
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().count() < MAX_FILENAME_CHARS / 2);

    match extension {
        Some(extension) => {
            let keep = MAX_FILENAME_CHARS - extension.chars().count() - 1;
            let stem: String = name.chars().take(keep).collect();
            format!("{stem}.{extension}")
        }
        None => name.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}

/// Checks a caller-supplied filename and returns it as a relative path.
///
/// Subdirectories are allowed; absolute paths and `..` are not, so the
/// result always lands inside the output directory.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidFilename`] when the name is empty or
/// would escape the output directory.
pub fn validate_explicit_filename(name: &str) -> Result<PathBuf, DownloadError> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DownloadError::invalid_filename(name));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(DownloadError::invalid_filename(name));
    }
    Ok(relative)
}
