//! Default User-Agent for download requests.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/download-unpack";

/// Default User-Agent, identifying the tool and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("download-unpack/{version} (+{PROJECT_UA_URL})")
}
