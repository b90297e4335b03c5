/// Durable holder of the access credential
///
/// The token store is the single source of truth for "am I logged in".
/// Nothing else in the client caches that answer; callers ask the store.
///
/// Two implementations are provided:
///
/// - `MemoryTokenStore`: process-local, lost on exit (tests, one-shot tools)
/// - `FileTokenStore`: JSON file on disk, survives restarts
///
/// # File format
///
/// ```json
/// { "access_token": "eyJ...", "refresh_token": null }
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_client::token_store::{Credential, FileTokenStore, TokenStore};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileTokenStore::open("/tmp/taskboard/credentials.json");
/// store.set(Credential::new("token-value"))?;
/// assert!(store.get().is_some());
/// store.clear()?;
/// # Ok(())
/// # }
/// ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, ClientResult};

/// Access credential issued at login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token
    pub access_token: String,

    /// Optional refresh token (stored, not used by this client)
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Authorization header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Storage contract for the current credential
///
/// Implementations do no validation and no network I/O. `get` must be cheap;
/// it is called before every request.
pub trait TokenStore: Send + Sync {
    /// Current credential, if any
    fn get(&self) -> Option<Credential>;

    /// Replaces the stored credential
    fn set(&self, credential: Credential) -> ClientResult<()>;

    /// Removes the stored credential
    ///
    /// After this returns (even with an error) `get` returns `None`.
    fn clear(&self) -> ClientResult<()>;
}

/// In-memory token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a credential
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    fn set(&self, credential: Credential) -> ClientResult<()> {
        *self.credential.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.credential.write() = None;
        Ok(())
    }
}

/// File-backed token store
///
/// The credential is loaded once at open and mirrored in memory, so `get`
/// never touches the disk and `clear` takes effect locally even if the
/// file cannot be removed.
pub struct FileTokenStore {
    path: PathBuf,
    credential: RwLock<Option<Credential>>,
}

impl FileTokenStore {
    /// Opens the store at `path`
    ///
    /// A missing file means "not logged in". An unreadable or corrupt file
    /// is treated the same way and logged.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let credential = load(&path);

        Self {
            path,
            credential: RwLock::new(credential),
        }
    }

    /// Location of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, credential: &Credential) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }

        let json = serde_json::to_vec_pretty(credential)
            .map_err(|e| ClientError::Storage(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(storage_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(storage_error)?;
        }

        fs::rename(&tmp, &self.path).map_err(storage_error)?;
        Ok(())
    }
}

impl fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .field("has_credential", &self.credential.read().is_some())
            .finish()
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    fn set(&self, credential: Credential) -> ClientResult<()> {
        *self.credential.write() = Some(credential.clone());
        self.persist(&credential)
    }

    fn clear(&self) -> ClientResult<()> {
        *self.credential.write() = None;

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn load(path: &Path) -> Option<Credential> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read credential file");
            return None;
        }
    };

    match serde_json::from_slice::<Credential>(&bytes) {
        Ok(credential) if !credential.access_token.is_empty() => Some(credential),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt credential file");
            None
        }
    }
}

fn storage_error(err: std::io::Error) -> ClientError {
    ClientError::Storage(err.to_string())
}
