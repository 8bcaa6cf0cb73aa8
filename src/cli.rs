//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use download_unpack::{DownloadOptions, OptionsError, OptionsOverride, ResponseType};

/// Download a single resource and optionally unpack it.
///
/// Without --output the body is written to stdout. With --output it is saved
/// under the directory using the server-provided or URL-derived filename,
/// or unpacked there when --extract is given and the body is an archive.
#[derive(Parser, Debug)]
#[command(name = "download-unpack")]
#[command(author, version, about)]
pub struct Args {
    /// URL to download (http or https)
    pub url: String,

    /// Directory to save or unpack into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Unpack the body when it is a zip, tar, gzip, bzip2, xz, or zstd archive
    #[arg(short = 'x', long)]
    pub extract: bool,

    /// Save under this name (relative to --output) instead of resolving one
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Remove this many leading path components from archive members
    #[arg(long, value_name = "N")]
    pub strip: Option<usize>,

    /// Decode the body as text and re-encode it as UTF-8
    #[arg(long)]
    pub text: bool,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Extra request header, e.g. -H 'Authorization: Bearer x' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Option overrides as a JSON document; flags take precedence
    #[arg(long, value_name = "JSON")]
    pub options: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Composes the `--options` document with the individual flags.
    pub fn download_options(&self) -> Result<DownloadOptions, OptionsError> {
        let overrides = match &self.options {
            Some(json) => OptionsOverride::from_json_str(json)?,
            None => OptionsOverride::default(),
        };
        let mut options = DownloadOptions::compose(&overrides);

        if self.extract {
            options = options.extract(true);
        }
        if let Some(filename) = &self.filename {
            options = options.filename(filename.clone());
        }
        if let Some(strip) = self.strip {
            let decompress = options.decompress.clone().strip(strip);
            options = options.decompress(decompress);
        }
        if self.text {
            options = options.response_type(ResponseType::Text);
        }
        if self.insecure {
            options = options.verify_tls(false);
        }
        for (name, value) in &self.headers {
            options = options.header(name.clone(), value.clone());
        }

        Ok(options)
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'NAME: VALUE', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/file.zip";

    #[test]
    fn test_cli_url_only_parses_successfully() {
        let args = Args::try_parse_from(["download-unpack", URL]).unwrap();
        assert_eq!(args.url, URL);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.output.is_none());
        assert!(!args.extract);
    }

    #[test]
    fn test_cli_missing_url_rejected() {
        let result = Args::try_parse_from(["download-unpack"]);
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["download-unpack", "-v", URL]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["download-unpack", "-vv", URL]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["download-unpack", "--quiet", URL]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["download-unpack", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["download-unpack", "--invalid-flag", URL]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_flags_map_to_options() {
        let args = Args::try_parse_from([
            "download-unpack",
            URL,
            "-o",
            "out",
            "-x",
            "--strip",
            "1",
            "--filename",
            "pkg/archive.zip",
            "--text",
            "-k",
            "-H",
            "Authorization: Bearer abc",
        ])
        .unwrap();
        let options = args.download_options().unwrap();

        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert!(options.extract);
        assert_eq!(options.decompress.strip, 1);
        assert!(options.decompress.preserve_mode);
        assert_eq!(options.filename.as_deref(), Some("pkg/archive.zip"));
        assert_eq!(options.transport.response_type, ResponseType::Text);
        assert!(!options.transport.verify_tls);
        assert_eq!(
            options.transport.headers.get("Authorization").unwrap(),
            "Bearer abc"
        );
    }

    #[test]
    fn test_cli_flags_override_options_document() {
        let args = Args::try_parse_from([
            "download-unpack",
            URL,
            "--options",
            r#"{"decompress": {"strip": 2, "preserve_mode": false}, "extract": false}"#,
            "--strip",
            "1",
        ])
        .unwrap();
        let options = args.download_options().unwrap();

        assert_eq!(options.decompress.strip, 1);
        assert!(!options.decompress.preserve_mode);
        assert!(!options.extract);
    }

    #[test]
    fn test_cli_malformed_options_document() {
        let args =
            Args::try_parse_from(["download-unpack", URL, "--options", "{oops"]).unwrap();
        assert!(matches!(
            args.download_options(),
            Err(OptionsError::Malformed { .. })
        ));
    }

    #[test]
    fn test_cli_header_without_colon_rejected() {
        let result = Args::try_parse_from(["download-unpack", URL, "-H", "no-colon"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
