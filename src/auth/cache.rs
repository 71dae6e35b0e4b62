//! JSON file cache for issued tokens.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{AuthError, AuthToken};

#[derive(Debug, Deserialize, Serialize)]
struct CachedToken {
    tenant_id: String,
    token: AuthToken,
}

/// Token cache stored as a single JSON document.
#[derive(Clone, Debug)]
pub struct TokenCache {
    path: Utf8PathBuf,
}

impl TokenCache {
    /// Creates a cache backed by `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache file location.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the cached token for `tenant_id`.
    ///
    /// Missing, unreadable, or corrupt caches and tokens cached for another
    /// tenant all yield `None`.
    #[must_use]
    pub fn load(&self, tenant_id: &str) -> Option<AuthToken> {
        let contents = match self.read() {
            Ok(contents) => contents?,
            Err(err) => {
                warn!(error = %err, "ignoring unreadable token cache");
                return None;
            }
        };
        match serde_json::from_str::<CachedToken>(&contents) {
            Ok(cached) if cached.tenant_id == tenant_id => Some(cached.token),
            Ok(_) => None,
            Err(err) => {
                warn!(path = %self.path, error = %err, "ignoring corrupt token cache");
                None
            }
        }
    }

    /// Writes `token` to the cache, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cache`] when the file cannot be written.
    pub fn store(&self, tenant_id: &str, token: &AuthToken) -> Result<(), AuthError> {
        let cached = CachedToken {
            tenant_id: tenant_id.to_owned(),
            token: token.clone(),
        };
        let rendered =
            serde_json::to_string_pretty(&cached).map_err(|err| self.error(&err.to_string()))?;
        let (parent, file_name) = self.split()?;
        Dir::create_ambient_dir_all(parent, ambient_authority())
            .map_err(|err| self.error(&err.to_string()))?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| self.error(&err.to_string()))?;
        dir.write(file_name, rendered)
            .map_err(|err| self.error(&err.to_string()))
    }

    fn read(&self) -> Result<Option<String>, AuthError> {
        let (parent, file_name) = self.split()?;
        let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.error(&err.to_string())),
        };
        match dir.read_to_string(file_name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.error(&err.to_string())),
        }
    }

    fn split(&self) -> Result<(&Utf8Path, &str), AuthError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| self.error("cache path is missing a filename"))?;
        Ok((parent, file_name))
    }

    fn error(&self, message: &str) -> AuthError {
        AuthError::Cache {
            path: self.path.to_string(),
            message: message.to_owned(),
        }
    }
}
