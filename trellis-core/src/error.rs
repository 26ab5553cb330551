//! Error types for trellis-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading a theme working directory or the user configuration.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A block schema or `theme.json` that is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `~/.trellis/config.yaml` exists but is not valid YAML.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The theme working directory does not exist.
    #[error("theme directory not found at {path}")]
    ThemeNotFound { path: PathBuf },

    /// No site id from `--site`, `TRELLIS_SITE`, or the config file.
    #[error("no site id for theme '{theme}'; pass --site, set TRELLIS_SITE, or add it under `sites` in the config")]
    MissingSite { theme: String },

    /// API URL or token is not configured.
    #[error("missing {what}; set it in ~/.trellis/config.yaml or via {env}")]
    MissingCredentials {
        what: &'static str,
        env: &'static str,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors surfaced by a remote state client.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service answered with a non-2xx status.
    #[error("remote API error (HTTP {status}): {message}{}", code_suffix(.code))]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The request never produced an HTTP response.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The configured API URL cannot serve as a base for route paths.
    #[error("invalid API URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RemoteError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Api {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default()
}

/// Convenience constructor for [`ThemeError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ThemeError {
    ThemeError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_includes_code_when_present() {
        let err = RemoteError::Api {
            status: 409,
            message: "name already taken".into(),
            code: Some("DUPLICATE_NAME".into()),
        };
        assert_eq!(
            err.to_string(),
            "remote API error (HTTP 409): name already taken [DUPLICATE_NAME]"
        );
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn api_error_message_without_code() {
        let err = RemoteError::api(500, "boom");
        assert_eq!(err.to_string(), "remote API error (HTTP 500): boom");
    }
}
