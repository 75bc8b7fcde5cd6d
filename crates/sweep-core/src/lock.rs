use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Name of the single-flight lock guarding `sweep cleanup`.
pub const CLEANUP_OPERATION: &str = "cleanup";

/// Advisory lock errors for named operation locks.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    InvalidOperation(String),
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::InvalidOperation(_) => ErrorCode::InternalUnexpected,
            Self::IoError(_) => ErrorCode::LockIoFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => {
                write!(
                    f,
                    "{}: another run holds {} (waited {:?})",
                    self.code().code(),
                    path.display(),
                    waited
                )
            }
            Self::InvalidOperation(name) => write!(
                f,
                "{}: invalid lock name '{name}': use lowercase letters, digits, '-' or '_'",
                self.code().code()
            ),
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

/// Path of the lock file for `operation` under `locks_dir`.
///
/// # Errors
///
/// Returns [`LockError::InvalidOperation`] if the name is empty or contains
/// anything other than `[a-z0-9_-]`.
pub fn lock_path(locks_dir: &Path, operation: &str) -> Result<PathBuf, LockError> {
    let valid = !operation.is_empty()
        && operation
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if !valid {
        return Err(LockError::InvalidOperation(operation.to_string()));
    }
    Ok(locks_dir.join(format!("{operation}.lock")))
}

/// RAII guard for a named single-flight operation.
///
/// Holding the guard means no other process, and no other handle in this
/// process, holds the same lock file. Release happens on drop.
#[derive(Debug)]
pub struct OperationLock {
    file: File,
    path: PathBuf,
}

impl OperationLock {
    /// Acquire the exclusive lock at `path`, polling until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another holder keeps the lock for the
    /// whole wait, or [`LockError::IoError`] if the lock file cannot be opened.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                tracing::debug!(lock = %path.display(), "acquired operation lock");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Acquire the lock for a named operation under `locks_dir`.
    ///
    /// # Errors
    ///
    /// See [`lock_path`] and [`OperationLock::acquire`].
    pub fn for_operation(
        locks_dir: &Path,
        operation: &str,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        Self::acquire(&lock_path(locks_dir, operation)?, timeout)
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        drop(self);
    }

    /// Return the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
