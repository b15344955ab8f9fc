//! Lock tokens guarding store files across processes.
//!
//! A store `queries.csv` is guarded by a sibling token `queries.csv.lock`.
//! Ownership is the token's existence: it is created with create-if-absent
//! semantics (`O_CREAT | O_EXCL`), so two concurrent creators can never both
//! succeed. The token holds the owner's PID for humans; the protocol never
//! reads it back.
//!
//! [`StoreLock`] is an RAII guard: the token is removed when the guard is
//! dropped, so every exit path of a mutating operation releases it.

use crate::config::ConfigDefaults;
use crate::error::{Result, StoreError};
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

/// Retry budget and staleness rule for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Total creation attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Tokens older than this are treated as abandoned. `None` never reclaims.
    pub stale_after: Option<Duration>,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            attempts: ConfigDefaults::LOCK_ATTEMPTS,
            retry_delay: Duration::from_millis(ConfigDefaults::LOCK_RETRY_DELAY_MS),
            stale_after: None,
        }
    }
}

/// Path of the lock token guarding `store`: the store path with `.lock` appended.
pub fn lock_path_for(store: &Path) -> PathBuf {
    let mut name = OsString::from(store.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Held lock on one store file. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
    released: bool,
}

impl StoreLock {
    /// Acquire the lock guarding `store`, retrying per `policy`.
    ///
    /// Returns [`StoreError::Contention`] once the attempt budget is spent.
    /// Any other I/O failure while creating the token is returned immediately.
    pub fn acquire(store: &Path, policy: &LockPolicy) -> Result<Self> {
        let lock_path = lock_path_for(store);
        let attempts = policy.attempts.max(1);

        for attempt in 1..=attempts {
            if Self::try_create(&lock_path)?
                || (Self::reclaim_if_stale(&lock_path, policy.stale_after)?
                    && Self::try_create(&lock_path)?)
            {
                log::debug!("acquired {} (attempt {})", lock_path.display(), attempt);
                return Ok(Self {
                    lock_path,
                    released: false,
                });
            }
            if attempt < attempts {
                thread::sleep(policy.retry_delay);
            }
        }

        Err(StoreError::Contention {
            lock_path,
            attempts,
        })
    }

    /// Path of the token this guard owns.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock now. A token that is already gone is not an error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_token(&self.lock_path)?;
        log::debug!("released {}", self.lock_path.display());
        Ok(())
    }

    /// Create the token. `Ok(false)` means another holder owns it.
    fn try_create(lock_path: &Path) -> io::Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e),
        };

        if let Err(e) = write!(file, "{}", std::process::id()) {
            drop(file);
            let _ = fs::remove_file(lock_path);
            return Err(e);
        }
        Ok(true)
    }

    /// Remove an abandoned token. Returns true when the slot is free again.
    ///
    /// The token is first renamed to a private name so that only one
    /// reclaimer wins, then re-checked: if a fresh holder slipped in between
    /// the check and the rename, its token is linked back into place.
    fn reclaim_if_stale(lock_path: &Path, stale_after: Option<Duration>) -> io::Result<bool> {
        let Some(threshold) = stale_after else {
            return Ok(false);
        };
        if !is_stale(lock_path, threshold) {
            return Ok(false);
        }

        let mut quarantine = OsString::from(lock_path.as_os_str());
        quarantine.push(format!(".stale-{}", std::process::id()));
        let quarantine = PathBuf::from(quarantine);

        match fs::rename(lock_path, &quarantine) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        }

        if !is_stale(&quarantine, threshold) {
            restore_token(&quarantine, lock_path);
            remove_token(&quarantine)?;
            return Ok(false);
        }

        log::warn!(
            "removing stale lock {} (older than {}s)",
            lock_path.display(),
            threshold.as_secs()
        );
        remove_token(&quarantine)?;
        Ok(true)
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_token(&self.lock_path) {
            log::warn!("failed to release {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Link a quarantined token back to `lock_path`. On failure its holder no
/// longer has a visible token, so another process may take the lock too.
fn restore_token(quarantine: &Path, lock_path: &Path) -> bool {
    match fs::hard_link(quarantine, lock_path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "could not restore live lock {} ({}); its holder is no longer exclusive",
                lock_path.display(),
                e
            );
            false
        }
    }
}

fn remove_token(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Age of a token, from its modification time.
fn token_age(lock_path: &Path) -> Option<Duration> {
    let modified = fs::metadata(lock_path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

/// True if the token exists and is older than `threshold`.
pub fn is_stale(lock_path: &Path, threshold: Duration) -> bool {
    token_age(lock_path).is_some_and(|age| age > threshold)
}

/// Observed state of a store's lock token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    Held { age: Duration, stale: bool },
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Unlocked => f.write_str("unlocked"),
            LockStatus::Held { age, stale: false } => write!(f, "held ({}s)", age.as_secs()),
            LockStatus::Held { age, stale: true } => {
                write!(f, "held ({}s) [stale]", age.as_secs())
            }
        }
    }
}

/// Inspect the lock guarding `store` without touching it.
///
/// `stale` is only ever reported when `stale_after` is configured.
pub fn lock_status(store: &Path, stale_after: Option<Duration>) -> LockStatus {
    match token_age(&lock_path_for(store)) {
        None => LockStatus::Unlocked,
        Some(age) => LockStatus::Held {
            age,
            stale: stale_after.is_some_and(|threshold| age > threshold),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    fn fast_policy(attempts: u32) -> LockPolicy {
        LockPolicy {
            attempts,
            retry_delay: Duration::from_millis(5),
            stale_after: None,
        }
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/queries.csv")),
            PathBuf::from("/data/queries.csv.lock")
        );
    }

    #[test]
    fn test_acquire_creates_token_with_pid() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");

        let lock = StoreLock::acquire(&store, &fast_policy(1)).unwrap();

        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn test_token_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let lock_path = lock_path_for(&store);

        {
            let _lock = StoreLock::acquire(&store, &fast_policy(1)).unwrap();
            assert!(lock_path.exists());
        }

        assert!(!lock_path.exists());
    }

    #[test]
    fn test_release_is_idempotent_when_token_vanished() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");

        let lock = StoreLock::acquire(&store, &fast_policy(1)).unwrap();
        fs::remove_file(lock.path()).unwrap();

        assert!(lock.release().is_ok());
    }

    #[test]
    fn test_contention_after_budget() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");

        let _held = StoreLock::acquire(&store, &fast_policy(1)).unwrap();
        let err = StoreLock::acquire(&store, &fast_policy(3)).unwrap_err();

        assert!(err.is_contention());
        match err {
            StoreError::Contention { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_waits_for_holder_to_release() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let store_clone = store.clone();

        let held = Arc::new(AtomicBool::new(false));
        let held_clone = Arc::clone(&held);

        let handle = thread::spawn(move || {
            let _lock = StoreLock::acquire(&store_clone, &fast_policy(1)).unwrap();
            held_clone.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(60));
        });

        while !held.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(2));
        }

        let policy = LockPolicy {
            attempts: 100,
            retry_delay: Duration::from_millis(10),
            stale_after: None,
        };
        let lock = StoreLock::acquire(&store, &policy);
        handle.join().unwrap();
        assert!(lock.is_ok());
    }

    #[test]
    fn test_old_token_not_reclaimed_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let lock_path = lock_path_for(&store);
        fs::write(&lock_path, "99999").unwrap();
        backdate(&lock_path, Duration::from_secs(3600));

        let err = StoreLock::acquire(&store, &fast_policy(2)).unwrap_err();
        assert!(err.is_contention());
        assert!(lock_path.exists());
    }

    #[test]
    fn test_stale_token_reclaimed_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let lock_path = lock_path_for(&store);
        fs::write(&lock_path, "99999").unwrap();
        backdate(&lock_path, Duration::from_secs(3600));

        let policy = LockPolicy {
            stale_after: Some(Duration::from_secs(60)),
            ..fast_policy(1)
        };
        let lock = StoreLock::acquire(&store, &policy).unwrap();

        let content = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn test_fresh_token_not_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let lock_path = lock_path_for(&store);
        fs::write(&lock_path, "99999").unwrap();

        let policy = LockPolicy {
            stale_after: Some(Duration::from_secs(60)),
            ..fast_policy(2)
        };
        assert!(StoreLock::acquire(&store, &policy).unwrap_err().is_contention());
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "99999");
    }

    #[test]
    fn test_restore_token() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("queries.csv.lock");
        let quarantine = temp_dir.path().join("queries.csv.lock.stale-1");
        fs::write(&quarantine, "111").unwrap();

        assert!(restore_token(&quarantine, &lock_path));
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "111");

        // a newer holder already owns the slot; its token must survive
        fs::write(&lock_path, "222").unwrap();
        assert!(!restore_token(&quarantine, &lock_path));
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "222");
    }

    #[test]
    fn test_lock_status() {
        let temp_dir = TempDir::new().unwrap();
        let store = temp_dir.path().join("queries.csv");
        let lock_path = lock_path_for(&store);

        assert_eq!(lock_status(&store, None), LockStatus::Unlocked);

        fs::write(&lock_path, "1").unwrap();
        assert!(matches!(
            lock_status(&store, Some(Duration::from_secs(60))),
            LockStatus::Held { stale: false, .. }
        ));

        backdate(&lock_path, Duration::from_secs(120));
        assert!(matches!(
            lock_status(&store, Some(Duration::from_secs(60))),
            LockStatus::Held { stale: true, .. }
        ));
        assert!(matches!(
            lock_status(&store, None),
            LockStatus::Held { stale: false, .. }
        ));
    }
}
