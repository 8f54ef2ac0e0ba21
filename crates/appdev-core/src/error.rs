//! Error taxonomy shared by every appdev operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Local certificate bundle is missing or unusable.
    #[error("{0}")]
    Cert(String),

    /// The operator answered "no" to a confirmation that gates the action.
    #[error("{0}")]
    Declined(String),

    /// Remote-shell connection to the server failed.
    #[error("{0}")]
    ServerConnection(String),

    /// Transport-level request failure other than SSL.
    #[error("{0}")]
    ServerRequest(String),

    /// Server identity could not be verified. Triggers trust refresh.
    #[error("{0}")]
    Ssl(String),

    /// API response indicates an unsuccessful operation.
    #[error("{message}")]
    Api {
        message: String,
        http_status: u16,
        api_code: i64,
    },

    /// The requested action is not supported by the server version.
    #[error("{0}")]
    UnsupportedVersion(String),

    #[error("{0}")]
    ServerConfig(String),

    #[error("{0}")]
    Workspace(String),

    #[error("{0}")]
    Manifest(String),

    #[error("{0}")]
    Container(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Interactive input could not be read.
    #[error("{0}")]
    Prompt(String),
}

impl Error {
    pub fn api(message: impl Into<String>, http_status: u16, api_code: i64) -> Self {
        Error::Api {
            message: message.into(),
            http_status,
            api_code,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_ssl(&self) -> bool {
        matches!(self, Error::Ssl(_))
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Error::Declined(_))
    }

    /// Application-level code carried by an API error, 0 for anything else.
    pub fn api_code(&self) -> i64 {
        match self {
            Error::Api { api_code, .. } => *api_code,
            _ => 0,
        }
    }
}

/// Removes OS error decorations such as `[Errno 2] ` and ` (os error 2)`.
pub fn strip_errno_prefix(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("[Errno ") {
        let after = &rest[start + "[Errno ".len()..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && after[digits..].starts_with(']') {
            out.push_str(&rest[..start]);
            rest = after[digits + 1..].trim_start_matches(' ');
        } else {
            out.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
        }
    }
    out.push_str(rest);

    strip_os_error_suffixes(&out)
}

fn strip_os_error_suffixes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(" (os error ") {
        let after = &rest[start + " (os error ".len()..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && after[digits..].starts_with(')') {
            out.push_str(&rest[..start]);
            rest = &after[digits + 1..];
        } else {
            out.push_str(&rest[..start + 1]);
            rest = &rest[start + 1..];
        }
    }
    out.push_str(rest);
    out
}
