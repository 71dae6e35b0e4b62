//! Startup script resolution and encoding.
//!
//! The script comes from exactly one of three sources: an inline value, a
//! script file, or an HTML page that is embedded into a generated nginx
//! bootstrap script. With no source the bootstrap serves a built-in page.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::paths::{expand_tilde, read_to_string_ambient};

const DEFAULT_PAGE: &str = "<!DOCTYPE html>
<html>
<head><title>stratus</title></head>
<body><h1>Hello from stratus</h1><p>This web server was provisioned through the cloud API.</p></body>
</html>
";

/// Errors raised while resolving the startup script.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum UserDataError {
    /// Raised when more than one source is provided.
    #[error("user data can come from only one of: inline script, script file, web page file")]
    ConflictingSources,
    /// Raised when an inline script is empty or only whitespace.
    #[error("user data must not be empty")]
    InlineEmpty,
    /// Raised when a file path is empty or only whitespace.
    #[error("user data file path must not be empty")]
    FilePathEmpty,
    /// Raised when a file resolves to empty or only whitespace.
    #[error("file `{path}` must not be empty")]
    FileEmpty {
        /// Expanded path of the empty file.
        path: String,
    },
    /// Raised when reading a file source fails.
    #[error("failed to read `{path}`: {message}")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Candidate script sources, at most one of which may be set.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserDataSources<'a> {
    /// Script text.
    pub inline: Option<&'a str>,
    /// Path to a script file.
    pub file: Option<&'a str>,
    /// Path to an HTML page served by the generated bootstrap script.
    pub web_page_file: Option<&'a str>,
}

/// Resolves the startup script from `sources`.
///
/// Inline and file scripts are returned as written. A web page file, or no
/// source at all, yields the nginx bootstrap script.
///
/// # Errors
///
/// Returns [`UserDataError`] when more than one source is set, a source is
/// empty, or a file cannot be read.
pub fn resolve_user_data(sources: UserDataSources<'_>) -> Result<String, UserDataError> {
    let provided = [sources.inline, sources.file, sources.web_page_file]
        .iter()
        .filter(|source| source.is_some())
        .count();
    if provided > 1 {
        return Err(UserDataError::ConflictingSources);
    }

    if let Some(script) = sources.inline {
        if script.trim().is_empty() {
            return Err(UserDataError::InlineEmpty);
        }
        return Ok(script.to_owned());
    }

    if let Some(path) = sources.file {
        return read_source(path);
    }

    if let Some(path) = sources.web_page_file {
        let page = read_source(path)?;
        return Ok(bootstrap_script(&page));
    }

    Ok(bootstrap_script(DEFAULT_PAGE))
}

/// Builds a script that installs nginx and serves `page` as the index.
#[must_use]
pub fn bootstrap_script(page: &str) -> String {
    let encoded_page = STANDARD.encode(page.as_bytes());
    format!(
        "#!/bin/bash
exec > >(tee /var/log/user-data.log|logger -t user-data -s 2>/dev/console) 2>&1
export DEBIAN_FRONTEND=noninteractive
apt-get update
apt-get install -y nginx
echo \"{encoded_page}\" | base64 -d > /var/www/html/index.html
systemctl enable nginx
systemctl restart nginx
"
    )
}

/// Base64-encodes a script for the instance creation request.
#[must_use]
pub fn encode_user_data(script: &str) -> String {
    STANDARD.encode(script.as_bytes())
}

fn read_source(path: &str) -> Result<String, UserDataError> {
    if path.trim().is_empty() {
        return Err(UserDataError::FilePathEmpty);
    }
    let expanded = expand_tilde(path);
    let content =
        read_to_string_ambient(&expanded).map_err(|message| UserDataError::FileRead {
            path: expanded.clone(),
            message,
        })?;
    if content.trim().is_empty() {
        return Err(UserDataError::FileEmpty { path: expanded });
    }
    Ok(content)
}
