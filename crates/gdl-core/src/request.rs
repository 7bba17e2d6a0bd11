//! Admission validation for enqueue requests.
//!
//! A request that fails validation is rejected synchronously and no job row
//! is ever created. Extra arguments are matched against a flag whitelist so
//! a web or CLI client can never smuggle arbitrary switches (or shell
//! metacharacters) into the worker command line.

use thiserror::Error;

/// Flags a client may pass through to the worker.
const ALLOWED_ARGS: &[&str] = &[
    "--ep-from",
    "--ep-to",
    "--season",
    "--download-type",
    "--server",
    "--no-subtitles",
    "--quality",
    "--sub-lang",
    "--dub-lang",
    "--format",
];

const DANGEROUS_CHARS: &[char] = &[
    ';', '|', '&', '`', '$', '(', ')', '<', '>', '\n', '\r', '\\',
];

/// Why an enqueue request was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("URL contains invalid control characters")]
    ControlCharsInUrl,
    #[error("profile name can only contain alphanumeric characters, dashes, and underscores")]
    BadProfile,
    #[error("extra arguments contain shell metacharacters")]
    ShellMetacharacters,
    #[error("argument '{0}' must start with '--'")]
    NotAFlag(String),
    #[error("argument '{0}' not in allowed list")]
    UnknownFlag(String),
}

/// A validated enqueue request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub url: String,
    pub profile: Option<String>,
    pub extra_args: Option<String>,
}

impl JobRequest {
    /// Validate raw client input. Empty optional fields collapse to `None`.
    pub fn new(
        url: &str,
        profile: Option<&str>,
        extra_args: Option<&str>,
    ) -> Result<Self, RequestError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RequestError::EmptyUrl);
        }
        if url.chars().any(|c| (c as u32) < 32 || c as u32 == 127) {
            return Err(RequestError::ControlCharsInUrl);
        }

        let profile = profile.map(str::trim).filter(|p| !p.is_empty());
        if let Some(p) = profile {
            if !p.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(RequestError::BadProfile);
            }
        }

        let extra_args = extra_args.map(str::trim).filter(|a| !a.is_empty());
        if let Some(args) = extra_args {
            validate_extra_args(args)?;
        }

        Ok(Self {
            url: url.to_string(),
            profile: profile.map(str::to_string),
            extra_args: extra_args.map(str::to_string),
        })
    }
}

/// Parse and validate an extra-argument string against the whitelist.
/// Returns the split argument vector for the worker command line.
pub fn validate_extra_args(extra_args: &str) -> Result<Vec<String>, RequestError> {
    if extra_args.contains(DANGEROUS_CHARS) {
        return Err(RequestError::ShellMetacharacters);
    }

    let parts: Vec<&str> = extra_args.split_whitespace().collect();
    let mut validated = Vec::new();
    let mut i = 0;
    while i < parts.len() {
        let arg = parts[i];
        if !arg.starts_with("--") {
            return Err(RequestError::NotAFlag(arg.to_string()));
        }

        // Base name before any "=value".
        let base = arg.split('=').next().unwrap_or(arg);
        if !ALLOWED_ARGS.contains(&base) {
            return Err(RequestError::UnknownFlag(base.to_string()));
        }

        validated.push(arg.to_string());

        // Bare flag followed by a non-flag token: that token is its value.
        if !arg.contains('=') && i + 1 < parts.len() && !parts[i + 1].starts_with('-') {
            validated.push(parts[i + 1].to_string());
            i += 1;
        }

        i += 1;
    }

    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_request() {
        let req = JobRequest::new("https://example.com/watch/1", None, None).unwrap();
        assert_eq!(req.url, "https://example.com/watch/1");
        assert!(req.profile.is_none());
        assert!(req.extra_args.is_none());
    }

    #[test]
    fn rejects_empty_and_control_urls() {
        assert!(matches!(
            JobRequest::new("  ", None, None),
            Err(RequestError::EmptyUrl)
        ));
        assert!(matches!(
            JobRequest::new("https://a\x07b", None, None),
            Err(RequestError::ControlCharsInUrl)
        ));
    }

    #[test]
    fn profile_charset_enforced() {
        assert!(JobRequest::new("https://a", Some("my_profile-2"), None).is_ok());
        assert!(matches!(
            JobRequest::new("https://a", Some("bad profile"), None),
            Err(RequestError::BadProfile)
        ));
    }

    #[test]
    fn whitelisted_flags_pass_with_values() {
        let args = validate_extra_args("--ep-from 1 --ep-to 12 --no-subtitles").unwrap();
        assert_eq!(args, vec!["--ep-from", "1", "--ep-to", "12", "--no-subtitles"]);
    }

    #[test]
    fn equals_form_passes() {
        let args = validate_extra_args("--season=2 --quality=1080").unwrap();
        assert_eq!(args, vec!["--season=2", "--quality=1080"]);
    }

    #[test]
    fn unknown_flag_rejected() {
        assert_eq!(
            validate_extra_args("--exec rm"),
            Err(RequestError::UnknownFlag("--exec".to_string()))
        );
    }

    #[test]
    fn metacharacters_rejected() {
        assert_eq!(
            validate_extra_args("--season 1; rm -rf /"),
            Err(RequestError::ShellMetacharacters)
        );
        assert_eq!(
            validate_extra_args("--server $(whoami)"),
            Err(RequestError::ShellMetacharacters)
        );
    }

    #[test]
    fn bare_value_rejected() {
        assert_eq!(
            validate_extra_args("oops --season 1"),
            Err(RequestError::NotAFlag("oops".to_string()))
        );
    }
}
