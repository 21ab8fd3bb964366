//! cache::file
//!
//! Load/flush lifecycle of a repository's persisted branch cache.
//!
//! # Architecture
//!
//! A [`RepoCacheFile`] is the session for one processing pass over one
//! repository. It holds an OS-level exclusive lock on `<path>.lock` for its
//! whole lifetime, so two passes over the same repository cannot interleave.
//!
//! # Invariants
//!
//! - Persisted content is discarded when its repository or fingerprint
//!   differs from the current one.
//! - Writes are atomic: a temp file is written and renamed into place.
//! - Every exit path either persists or discards. Dropping the session
//!   persists, except while panicking.
//!
//! # Example
//!
//! ```ignore
//! let mut session = RepoCacheFile::load(&path, "acme/widgets", Some(fingerprint))?;
//! set_branch_new_commit(session.cache_mut(), &git, &branch, &base, &sha)?;
//! session.flush()?;
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::types::RepoCache;
use super::CacheError;
use crate::core::types::Fingerprint;

/// An open, locked branch-cache session.
#[derive(Debug)]
pub struct RepoCacheFile {
    path: PathBuf,
    lock: Option<File>,
    cache: RepoCache,
    finished: bool,
}

impl RepoCacheFile {
    /// Open the cache at `path` for `repository`.
    ///
    /// A missing file yields an empty cache. So does a file written for a
    /// different repository or fingerprint.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Locked`] if another pass holds the lock
    /// - [`CacheError::Parse`] / [`CacheError::DuplicateBranch`] for corrupt content
    pub fn load(
        path: &Path,
        repository: &str,
        fingerprint: Option<Fingerprint>,
    ) -> Result<Self, CacheError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        }

        let lock = acquire_lock(path)?;

        let cache = match fs::read_to_string(path) {
            Ok(contents) => {
                let persisted = RepoCache::from_json(&contents)?;
                if persisted.repository != repository {
                    debug!(
                        persisted = %persisted.repository,
                        current = repository,
                        "cache belongs to another repository, starting empty"
                    );
                    RepoCache::new(repository, fingerprint)
                } else if persisted.fingerprint != fingerprint {
                    debug!(repository, "repository fingerprint changed, starting empty");
                    RepoCache::new(repository, fingerprint)
                } else {
                    persisted
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                RepoCache::new(repository, fingerprint)
            }
            Err(e) => return Err(CacheError::io(path, e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            lock: Some(lock),
            cache,
            finished: false,
        })
    }

    /// Open the cache at `path` keeping whatever identity it was written with.
    ///
    /// For maintenance tooling that has no provider fingerprint at hand. A
    /// missing file yields an empty cache for `repository`.
    pub fn open(path: &Path, repository: &str) -> Result<Self, CacheError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        }

        let lock = acquire_lock(path)?;

        let cache = match fs::read_to_string(path) {
            Ok(contents) => RepoCache::from_json(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RepoCache::new(repository, None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        Ok(Self {
            path: path.to_path_buf(),
            lock: Some(lock),
            cache,
            finished: false,
        })
    }

    /// Location of the persisted cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache(&self) -> &RepoCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RepoCache {
        &mut self.cache
    }

    /// Persist and release the lock.
    pub fn flush(mut self) -> Result<(), CacheError> {
        self.finished = true;
        self.persist()
    }

    /// Release the lock without persisting.
    pub fn discard(mut self) {
        debug!(path = %self.path.display(), "discarding branch cache changes");
        self.finished = true;
    }

    /// Remove the persisted cache file, if any.
    pub fn remove(path: &Path) -> Result<bool, CacheError> {
        if !path.parent().is_some_and(Path::exists) {
            return Ok(false);
        }
        let _lock = acquire_lock(path)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    fn persist(&mut self) -> Result<(), CacheError> {
        self.cache.touch();
        let json = self.cache.to_json()?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(|e| CacheError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CacheError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            revision = self.cache.revision,
            branches = self.cache.len(),
            "persisted branch cache"
        );
        Ok(())
    }
}

impl Drop for RepoCacheFile {
    fn drop(&mut self) {
        if !self.finished {
            if std::thread::panicking() {
                warn!(path = %self.path.display(), "discarding branch cache after panic");
            } else if let Err(e) = self.persist() {
                warn!(path = %self.path.display(), error = %e, "failed to persist branch cache");
            }
        }
        if let Some(lock) = self.lock.take() {
            let _ = lock.unlock();
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_lock(path: &Path) -> Result<File, CacheError> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| CacheError::io(&lock_path, e))?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            Err(CacheError::Locked { path: lock_path })
        }
        Err(e) => Err(CacheError::io(&lock_path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::BranchCache;
    use crate::core::types::{BranchName, CommitSha};
    use tempfile::TempDir;

    fn record(branch: &str) -> BranchCache {
        BranchCache::fresh(
            BranchName::new(branch).unwrap(),
            BranchName::new("main").unwrap(),
            CommitSha::new("abc").unwrap(),
            Some(CommitSha::new("def").unwrap()),
        )
    }

    fn fp(id: &str) -> Option<Fingerprint> {
        Some(Fingerprint::for_repository("https://api.github.com", id))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache/repository.json");
        let session = RepoCacheFile::load(&path, "acme/widgets", fp("1")).unwrap();
        assert!(session.cache().is_empty());
        session.discard();
        assert!(!path.exists());
    }

    #[test]
    fn flush_then_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");

        let mut session = RepoCacheFile::load(&path, "acme/widgets", fp("1")).unwrap();
        session.cache_mut().upsert(record("depbot/a"));
        session.flush().unwrap();

        let session = RepoCacheFile::load(&path, "acme/widgets", fp("1")).unwrap();
        assert_eq!(session.cache().len(), 1);
        assert_eq!(session.cache().revision, 1);
        assert!(session.cache().last_modified.is_some());
        session.discard();
    }

    #[test]
    fn fingerprint_change_discards_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");

        let mut session = RepoCacheFile::load(&path, "acme/widgets", fp("1")).unwrap();
        session.cache_mut().upsert(record("depbot/a"));
        session.flush().unwrap();

        let session = RepoCacheFile::load(&path, "acme/widgets", fp("2")).unwrap();
        assert!(session.cache().is_empty());
        assert_eq!(session.cache().fingerprint, fp("2"));
        session.discard();
    }

    #[test]
    fn repository_change_discards_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");

        let mut session = RepoCacheFile::load(&path, "acme/widgets", None).unwrap();
        session.cache_mut().upsert(record("depbot/a"));
        session.flush().unwrap();

        let session = RepoCacheFile::load(&path, "acme/gadgets", None).unwrap();
        assert!(session.cache().is_empty());
        session.discard();
    }

    #[test]
    fn open_keeps_persisted_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");

        let mut session = RepoCacheFile::load(&path, "acme/widgets", fp("1")).unwrap();
        session.cache_mut().upsert(record("depbot/a"));
        session.flush().unwrap();

        let session = RepoCacheFile::open(&path, "somewhere-else").unwrap();
        assert_eq!(session.cache().repository, "acme/widgets");
        assert_eq!(session.cache().fingerprint, fp("1"));
        assert_eq!(session.cache().len(), 1);
        session.discard();
    }

    #[test]
    fn drop_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");
        {
            let mut session = RepoCacheFile::load(&path, "acme/widgets", None).unwrap();
            session.cache_mut().upsert(record("depbot/a"));
        }
        assert!(path.exists());
    }

    #[test]
    fn discard_does_not_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");
        let mut session = RepoCacheFile::load(&path, "acme/widgets", None).unwrap();
        session.cache_mut().upsert(record("depbot/a"));
        session.discard();
        assert!(!path.exists());
    }

    #[test]
    fn second_session_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");
        let first = RepoCacheFile::load(&path, "acme/widgets", None).unwrap();
        let second = RepoCacheFile::load(&path, "acme/widgets", None);
        assert!(matches!(second, Err(CacheError::Locked { .. })));
        first.discard();
        assert!(RepoCacheFile::load(&path, "acme/widgets", None).is_ok());
    }

    #[test]
    fn remove_deletes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.json");
        RepoCacheFile::load(&path, "acme/widgets", None)
            .unwrap()
            .flush()
            .unwrap();
        assert!(RepoCacheFile::remove(&path).unwrap());
        assert!(!RepoCacheFile::remove(&path).unwrap());
    }
}
