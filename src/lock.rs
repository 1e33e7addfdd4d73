//! Cross-process install locks
//!
//! One lock per canonical download URL, living as a file in the cache root.
//! Two backends share the same interface:
//!
//! | Backend | Mechanism | Owner death |
//! |---------|-----------|-------------|
//! | `kernel` | `flock` on the lock file (Unix) | released by the kernel |
//! | `pidfile` | lock file holding the owner pid | detected by polling the pid |
//!
//! Waiting has no timeout. A waiter blocks until it gets the lock or finds
//! the recorded owner dead.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};
use url::Url;

use crate::artifact::StorageAccount;
use crate::error::{ArtifactError, ArtifactResult};
use crate::process;

/// Delay between acquisition attempts
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often a waiter checks whether the owner is still alive
const OWNER_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Mechanism backing install locks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Kernel-managed advisory lock, released automatically on process death.
    /// Falls back to `PidFile` where unavailable.
    Kernel,
    /// Sentinel file with the owner's pid and liveness polling
    PidFile,
}

impl Default for LockBackend {
    fn default() -> Self {
        if cfg!(unix) {
            Self::Kernel
        } else {
            Self::PidFile
        }
    }
}

impl fmt::Display for LockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel => write!(f, "kernel"),
            Self::PidFile => write!(f, "pidfile"),
        }
    }
}

/// A named, not yet acquired install lock
#[derive(Debug, Clone)]
pub struct InstallLock {
    path: PathBuf,
    name: String,
    backend: LockBackend,
    poll_interval: Duration,
    check_interval: Duration,
}

impl InstallLock {
    /// The lock guarding installs of `url`, stored in `lock_dir`
    pub fn for_url(lock_dir: &Path, url: &Url, backend: LockBackend) -> Self {
        let name = canonical_url(url);
        Self {
            path: lock_dir.join(lock_file_name(&name)),
            name,
            backend,
            poll_interval: POLL_INTERVAL,
            check_interval: OWNER_CHECK_INTERVAL,
        }
    }

    /// Override the polling and owner check intervals
    pub fn with_intervals(mut self, poll: Duration, owner_check: Duration) -> Self {
        self.poll_interval = poll;
        self.check_interval = owner_check;
        self
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonical URL the lock is named after
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the lock is held by this caller.
    ///
    /// The returned guard releases the lock when dropped, on every exit path.
    pub async fn acquire(&self) -> ArtifactResult<InstallLockGuard> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ArtifactError::io(format!("creating lock directory {}", parent.display()), e)
            })?;
        }

        let started = Instant::now();
        let mut last_check: Option<Instant> = None;
        let mut announced = false;

        loop {
            if let Some(held) = self.try_acquire()? {
                if announced {
                    info!(
                        "Acquired lock for {} after {:.1}s",
                        self.name,
                        started.elapsed().as_secs_f64()
                    );
                } else {
                    debug!("Acquired lock for {}", self.name);
                }
                return Ok(InstallLockGuard {
                    path: self.path.clone(),
                    held: Some(held),
                });
            }

            if !announced {
                info!("Waiting for another install of {}", self.name);
                announced = true;
            }

            if self.uses_pid_file() && last_check.is_none_or(|t| t.elapsed() >= self.check_interval) {
                last_check = Some(Instant::now());
                if self.remove_if_orphaned()? {
                    continue;
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn uses_pid_file(&self) -> bool {
        self.backend == LockBackend::PidFile || !cfg!(unix)
    }

    fn try_acquire(&self) -> ArtifactResult<Option<Held>> {
        let result = if self.uses_pid_file() {
            try_create_pid_file(&self.path)
        } else {
            try_flock(&self.path)
        };
        result.map_err(|e| ArtifactError::io(format!("acquiring lock {}", self.path.display()), e))
    }

    /// Remove the lock file when its owner is gone. Returns whether it was removed.
    fn remove_if_orphaned(&self) -> ArtifactResult<bool> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => {
                return Err(ArtifactError::io(
                    format!("reading lock {}", self.path.display()),
                    e,
                ))
            }
        };

        let orphaned = match OwnerRecord::parse(&content) {
            Some(owner) => match process::is_alive(owner.pid) {
                Some(alive) => {
                    if alive {
                        debug!("Lock {} held by live process {}", self.name, owner.pid);
                    }
                    !alive
                }
                None => {
                    warn!(
                        "{}",
                        ArtifactError::LockOrphanRecoveryFailure {
                            path: self.path.clone(),
                            pid: owner.pid,
                        }
                    );
                    false
                }
            },
            // An owner record is written before the lock becomes visible;
            // an unreadable one that stays around is debris
            None => self.is_older_than(self.check_interval),
        };
        if !orphaned {
            return Ok(false);
        }

        warn!("Removing orphaned lock {} ({})", self.path.display(), self.name);
        remove_if_unchanged(&self.path, &content)
            .map_err(|e| ArtifactError::io(format!("removing lock {}", self.path.display()), e))?;
        Ok(true)
    }

    fn is_older_than(&self, age: Duration) -> bool {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|elapsed| elapsed >= age)
    }
}

/// Held install lock; released on drop
#[derive(Debug)]
pub struct InstallLockGuard {
    path: PathBuf,
    held: Option<Held>,
}

#[derive(Debug)]
enum Held {
    #[cfg_attr(not(unix), allow(dead_code))]
    Kernel(File),
    PidFile { record: String },
}

impl InstallLockGuard {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        match self.held.take() {
            #[cfg(unix)]
            Some(Held::Kernel(file)) => {
                use std::os::unix::io::AsRawFd;
                // Unlink while still locked; waiters re-check the inode
                if let Err(e) = fs::remove_file(&self.path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to remove lock {}: {}", self.path.display(), e);
                    }
                }
                unsafe {
                    libc::flock(file.as_raw_fd(), libc::LOCK_UN);
                }
                debug!("Released lock {}", self.path.display());
            }
            #[cfg(not(unix))]
            Some(Held::Kernel(_)) => {}
            Some(Held::PidFile { record }) => {
                if let Err(e) = remove_if_unchanged(&self.path, &record) {
                    warn!("Failed to remove lock {}: {}", self.path.display(), e);
                } else {
                    debug!("Released lock {}", self.path.display());
                }
            }
            None => {}
        }
    }
}

impl Drop for InstallLockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Owner of a lock file.
///
/// Records are written as pid, creation time and a random token, one per
/// line. Only the pid is read back; the other two lines make every record
/// distinct so a releaser never deletes a successor's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OwnerRecord {
    pid: u32,
}

impl OwnerRecord {
    fn render_current() -> String {
        format!(
            "{}\n{}\n{}\n",
            std::process::id(),
            Utc::now().to_rfc3339(),
            uuid::Uuid::new_v4().simple()
        )
    }

    fn parse(content: &str) -> Option<Self> {
        let pid = content.lines().next()?.trim().parse().ok()?;
        Some(Self { pid })
    }
}

/// Canonical form of a download URL: scheme, host and path, lower-cased,
/// without query or fragment. CDN hosts map to the account's blob host.
pub fn canonical_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = match StorageAccount::from_host(host) {
        Some(account) => account.host(false),
        None => host.to_string(),
    };
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!("{}://{}{}{}", url.scheme(), host, port, url.path()).to_lowercase()
}

/// Lock file name for a canonical URL
pub fn lock_file_name(canonical: &str) -> String {
    format!("dl-{}.lock", hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Create the lock file with its owner record in one step.
///
/// The record goes to a private file first and is hard-linked into place,
/// so the lock never exists without an owner.
fn try_create_pid_file(path: &Path) -> io::Result<Option<Held>> {
    let record = OwnerRecord::render_current();
    let staged = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    fs::write(&staged, &record)?;

    let linked = match fs::hard_link(&staged, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => create_new_with(path, &record),
        Err(e) => Err(e),
    };
    let _ = fs::remove_file(&staged);

    Ok(linked?.then_some(Held::PidFile { record }))
}

fn create_new_with(path: &Path, record: &str) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(record.as_bytes())?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn try_flock(path: &Path) -> io::Result<Option<Held>> {
    use std::os::unix::io::AsRawFd;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Ok(None);
        }
        return Err(err);
    }

    // The holder may have unlinked the file before unlocking it; a lock on
    // an unlinked inode excludes nobody
    if !is_same_file(&file, path)? {
        return Ok(None);
    }

    // Informational only; the kernel lock is what excludes others
    file.set_len(0)?;
    file.write_all(OwnerRecord::render_current().as_bytes())?;
    Ok(Some(Held::Kernel(file)))
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let opened = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(opened.dev() == current.dev() && opened.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn try_flock(path: &Path) -> io::Result<Option<Held>> {
    try_create_pid_file(path)
}

/// Delete `path` if it still holds `expected`
fn remove_if_unchanged(path: &Path, expected: &str) -> io::Result<()> {
    match fs::read_to_string(path) {
        Ok(current) if current == expected => match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn fast(lock: InstallLock) -> InstallLock {
        lock.with_intervals(Duration::from_millis(10), Duration::from_millis(50))
    }

    #[test]
    fn canonical_url_strips_query_and_unwraps_cdn() {
        let direct = url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1?sv=2020&sig=x");
        let cdn = url("https://bcartifacts-exdbf9fwegejdqak.b02.azurefd.net/onprem/24.0.1.1/W1#frag");
        assert_eq!(
            canonical_url(&direct),
            "https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"
        );
        assert_eq!(canonical_url(&direct), canonical_url(&cdn));
    }

    #[test]
    fn lock_names_differ_per_url() {
        let a = canonical_url(&url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"));
        let b = canonical_url(&url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w_1"));
        let c = canonical_url(&url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1_w1"));
        assert_ne!(lock_file_name(&a), lock_file_name(&b));
        assert_ne!(lock_file_name(&b), lock_file_name(&c));
        assert!(lock_file_name(&a).starts_with("dl-"));
    }

    #[test]
    fn owner_record_parse() {
        let record = OwnerRecord::render_current();
        assert_eq!(
            OwnerRecord::parse(&record),
            Some(OwnerRecord { pid: std::process::id() })
        );
        assert_eq!(OwnerRecord::parse(""), None);
        assert_eq!(OwnerRecord::parse("abc\n"), None);
    }

    async fn exclusive_under_contention(backend: LockBackend) {
        let temp = TempDir::new().unwrap();
        let lock = fast(InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            backend,
        ));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let lock = lock.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let guard = lock.acquire().await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                drop(guard);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pid_file_lock_is_exclusive() {
        exclusive_under_contention(LockBackend::PidFile).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn kernel_lock_is_exclusive() {
        exclusive_under_contention(LockBackend::Kernel).await;
    }

    #[tokio::test]
    async fn pid_file_removed_on_release() {
        let temp = TempDir::new().unwrap();
        let lock = InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            LockBackend::PidFile,
        );

        let guard = lock.acquire().await.unwrap();
        assert!(lock.path().exists());
        guard.release();
        assert!(!lock.path().exists());

        // Nothing but the lock itself may be left behind
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kernel_lock_file_removed_on_release() {
        let temp = TempDir::new().unwrap();
        let lock = fast(InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            LockBackend::Kernel,
        ));

        let guard = lock.acquire().await.unwrap();
        assert!(lock.path().exists());
        drop(guard);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

        let again = lock.acquire().await.unwrap();
        assert!(again.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn unlinked_lock_file_is_not_the_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dl-test.lock");
        let file = OpenOptions::new().write(true).create_new(true).open(&path).unwrap();
        assert!(is_same_file(&file, &path).unwrap());

        fs::remove_file(&path).unwrap();
        assert!(!is_same_file(&file, &path).unwrap());

        fs::write(&path, "").unwrap();
        assert!(!is_same_file(&file, &path).unwrap());
    }

    #[tokio::test]
    async fn orphaned_pid_file_is_recovered() {
        let temp = TempDir::new().unwrap();
        let lock = fast(InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            LockBackend::PidFile,
        ));
        fs::write(lock.path(), "999999999\n2020-01-01T00:00:00+00:00\nstale\n").unwrap();

        let guard = tokio::time::timeout(Duration::from_secs(5), lock.acquire())
            .await
            .expect("orphaned lock must not block")
            .unwrap();
        let content = fs::read_to_string(guard.path()).unwrap();
        assert_eq!(
            OwnerRecord::parse(&content).unwrap().pid,
            std::process::id()
        );
    }

    #[tokio::test]
    async fn live_owner_keeps_lock() {
        let temp = TempDir::new().unwrap();
        let lock = fast(InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            LockBackend::PidFile,
        ));
        let held = lock.acquire().await.unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(300), lock.acquire()).await;
        assert!(waited.is_err(), "second acquire must wait while owner lives");
        assert!(lock.path().exists());
        drop(held);
    }

    #[tokio::test]
    async fn guard_released_when_future_dropped() {
        let temp = TempDir::new().unwrap();
        let lock = fast(InstallLock::for_url(
            temp.path(),
            &url("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1"),
            LockBackend::default(),
        ));

        let holder = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.acquire().await.unwrap();
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        holder.abort();
        let _ = holder.await;

        tokio::time::timeout(Duration::from_secs(5), lock.acquire())
            .await
            .expect("lock must be free after the holder was cancelled")
            .unwrap();
    }
}
