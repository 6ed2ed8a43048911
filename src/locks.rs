use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

use crate::events::now_utc_rfc3339;

/// A held lock older than this is assumed abandoned. Flushes hold the lock
/// for milliseconds.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("shared log lock busy: {}", .0.display())]
    Busy(PathBuf),
    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive writer lock held as a `create_new` file that records the owning
/// pid and acquisition time, and is removed on drop. A lock left behind by a
/// dead process, or older than [`STALE_AFTER`], is broken.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    _file: File,
}

impl FileLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let start = Instant::now();
        loop {
            match try_acquire(path)? {
                Some(guard) => return Ok(guard),
                None if start.elapsed() >= timeout => {
                    return Err(LockError::Busy(path.to_path_buf()));
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    pub fn try_acquire(path: &Path) -> Result<Option<Self>, LockError> {
        try_acquire(path)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_acquire(path: &Path) -> Result<Option<FileLock>, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match create_lock_file(path) {
        Ok(lock) => Ok(Some(lock)),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            if !is_stale(path) {
                return Ok(None);
            }
            tracing::warn!(path = %path.display(), "breaking stale shared log lock");
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            match create_lock_file(path) {
                Ok(lock) => Ok(Some(lock)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn create_lock_file(path: &Path) -> std::io::Result<FileLock> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())?;
    writeln!(file, "{}", now_utc_rfc3339())?;
    Ok(FileLock {
        path: path.to_path_buf(),
        _file: file,
    })
}

fn is_stale(path: &Path) -> bool {
    let age = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());
    if age.is_some_and(|age| age > STALE_AFTER) {
        return true;
    }
    // A lock being written right now has no pid yet; treat it as live.
    let owner = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| raw.lines().next().and_then(|pid| pid.trim().parse::<u32>().ok()));
    owner.is_some_and(|pid| !process_alive(pid))
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    pid == std::process::id() || Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
