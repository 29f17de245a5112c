//! Traversal of a bundle, feeding every regular file through the
//! classifier, header parser and architecture policy.
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::args::ArchitectureTarget;
use crate::error::{Error, Result};
use crate::header::{self, ParsedHeader};
use crate::policy::{self, Verdict};
use crate::report::Report;
use crate::sniff::{Classification, Classifier};

/// Files already processed during one scan.
///
/// Keyed by canonical path. On Unix the device and inode are tracked too so
/// that hard links to one file are only checked once.
#[derive(Debug, Default)]
pub struct VisitedSet {
    paths: HashSet<PathBuf>,
    #[cfg(unix)]
    inodes: HashSet<(u64, u64)>,
}

impl VisitedSet {
    /// Records `canonical`, returning `false` if it was already seen.
    pub fn insert(&mut self, canonical: &Path, info: &Metadata) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if info.is_file() && !self.inodes.insert((info.dev(), info.ino())) {
                return false;
            }
        }
        #[cfg(not(unix))]
        let _ = info;
        self.paths.insert(canonical.to_path_buf())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// State shared by every branch of one traversal.
pub struct Scanner<'a> {
    target: ArchitectureTarget,
    classifier: &'a dyn Classifier,
    visited: Mutex<VisitedSet>,
    checked: AtomicUsize,
}

impl<'a> Scanner<'a> {
    pub fn new(target: ArchitectureTarget, classifier: &'a dyn Classifier) -> Self {
        Scanner {
            target,
            classifier,
            visited: Mutex::new(VisitedSet::default()),
            checked: AtomicUsize::new(0),
        }
    }

    /// Walks `root` and returns the invalid binaries in traversal order.
    ///
    /// The tree is enumerated first. Candidate files are then checked in
    /// parallel and the results are only combined once every check has
    /// finished.
    pub fn run(self, root: &Path) -> Result<Report> {
        let root = fs::canonicalize(root).map_err(|e| Error::io(root, e))?;
        let files = self.collect_files(&root)?;
        let visited = self
            .visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        log::debug!("Visited {} paths under {}", visited, root.display());

        let invalid_files = files
            .par_iter()
            .map(|path| self.check_file(path))
            .collect::<Result<Vec<Option<PathBuf>>>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Report {
            target: self.target,
            checked: self.checked.into_inner(),
            invalid_files,
        })
    }

    fn mark_visited(&self, canonical: &Path, info: &Metadata) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(canonical, info)
    }

    /// Canonical paths of every regular file under `root`, in walk order.
    ///
    /// Symlinks are never followed. A directory or file reached a second
    /// time (bind mount, hard link) is skipped.
    fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = vec![];
        let mut entries = WalkDir::new(root).into_iter();
        while let Some(entry) = entries.next() {
            let entry = entry?;
            let path = entry.path();
            log::trace!("Visiting {}", path.display());
            if entry.file_type().is_symlink() {
                log::debug!("Skipping symlink {}", path.display());
                continue;
            }

            let canonical = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
            let info = fs::metadata(&canonical).map_err(|e| Error::io(&canonical, e))?;
            if !self.mark_visited(&canonical, &info) {
                log::debug!("Already visited {}", canonical.display());
                if info.is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            }
            if info.is_file() {
                files.push(canonical);
            }
        }
        Ok(files)
    }

    /// Returns `path` if it is a Mach-O binary built for the wrong
    /// architecture.
    fn check_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        if self.classifier.classify(path)? != Classification::NativeExecutable {
            return Ok(None);
        }
        log::info!("Verifying architecture of {}", path.display());
        self.checked.fetch_add(1, Ordering::Relaxed);

        let header = header::read_header(path)?;
        if header == ParsedHeader::Unrecognized {
            log::warn!("Could not decode Mach-O header of {}", path.display());
        } else {
            log::debug!("{}: {}", path.display(), header);
        }
        match policy::evaluate(&header, self.target) {
            Verdict::Ok => Ok(None),
            Verdict::Invalid => Ok(Some(path.to_path_buf())),
        }
    }
}

/// Scans `root` for binaries that do not match `target`.
pub fn scan(root: &Path, target: ArchitectureTarget, classifier: &dyn Classifier) -> Result<Report> {
    Scanner::new(target, classifier).run(root)
}
