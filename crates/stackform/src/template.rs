//! Template source resolution.

use convergence::ConvergeError;
use url::Url;

/// Where the template comes from. Exactly one of inline body or remote URL,
/// enforced by construction so an outgoing request can never carry both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Inline template body, read fully before any provider call is made.
    Body(String),
    /// HTTPS location handed to the provider untouched.
    Url(String),
}

/// Whether the string is an absolute https:// URL.
pub fn is_https_url(s: &str) -> bool {
    Url::parse(s).map(|u| u.scheme() == "https").unwrap_or(false)
}

impl TemplateSource {
    /// Resolve CLI input into a template source.
    ///
    /// HTTPS locations pass through to the provider. Anything else is
    /// treated as a local path and read to completion — success or error —
    /// here, strictly before any network call happens.
    pub fn resolve(input: &str) -> Result<Self, ConvergeError> {
        if is_https_url(input) {
            return Ok(Self::Url(input.to_string()));
        }
        let body =
            std::fs::read_to_string(input).map_err(|source| ConvergeError::TemplateRead {
                path: input.to_string(),
                source,
            })?;
        Ok(Self::Body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_https_url_is_detected() {
        assert!(is_https_url("https://bucket.s3.amazonaws.com/template.yaml"));
    }

    #[test]
    fn test_plain_host_and_http_are_not_https_urls() {
        assert!(!is_https_url("blah.com"));
        assert!(!is_https_url("http://blah.com"));
        assert!(!is_https_url(""));
    }

    #[test]
    fn test_https_input_passes_through_unread() {
        let source = TemplateSource::resolve("https://example.com/t.yaml").unwrap();
        assert_eq!(
            source,
            TemplateSource::Url("https://example.com/t.yaml".to_string())
        );
    }

    #[test]
    fn test_local_path_is_read_fully() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Resources: {{}}").unwrap();

        let source = TemplateSource::resolve(file.path().to_str().unwrap()).unwrap();
        assert_eq!(source, TemplateSource::Body("Resources: {}".to_string()));
    }

    #[test]
    fn test_missing_file_is_an_error_before_any_network_call() {
        let err = TemplateSource::resolve("/nonexistent/template.yaml").unwrap_err();
        assert!(matches!(err, ConvergeError::TemplateRead { .. }), "{err}");
    }
}
