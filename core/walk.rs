use crate::config::RunConfig;
use log;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// A regular file discovered under the source root, not yet filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub attrs: FileAttrs,
}

/// Platform-specific metadata bits captured at walk time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttrs {
    /// Any execute permission bit is set (Unix only).
    pub executable_bit: bool,
    /// `FILE_ATTRIBUTE_HIDDEN` is set (Windows only).
    pub hidden_attribute: bool,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            modified: None,
            attrs: FileAttrs::default(),
        }
    }

    pub fn from_metadata(path: PathBuf, meta: &fs::Metadata) -> Self {
        Self {
            path,
            size: meta.len(),
            modified: meta.modified().ok(),
            attrs: attrs_from_metadata(meta),
        }
    }

    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or(Cow::Borrowed(""))
    }
}

#[cfg(unix)]
fn attrs_from_metadata(meta: &fs::Metadata) -> FileAttrs {
    use std::os::unix::fs::PermissionsExt;
    FileAttrs {
        executable_bit: meta.permissions().mode() & 0o111 != 0,
        hidden_attribute: false,
    }
}

#[cfg(windows)]
fn attrs_from_metadata(meta: &fs::Metadata) -> FileAttrs {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    FileAttrs {
        executable_bit: false,
        hidden_attribute: meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0,
    }
}

#[cfg(not(any(unix, windows)))]
fn attrs_from_metadata(_meta: &fs::Metadata) -> FileAttrs {
    FileAttrs::default()
}

/// One observation made while traversing the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// A regular file with readable metadata.
    File(Candidate),
    /// An entry whose metadata could not be read.
    Unreadable { path: PathBuf, error: String },
    /// A directory that could not be listed.
    UnreadableDir { path: PathBuf, error: String },
    /// A FIFO, socket or device node. Never opened.
    Special(PathBuf),
    /// A directory whose name is excluded; its subtree is not descended.
    PrunedDir(PathBuf),
    /// A file living somewhere beneath a pruned directory.
    PrunedFile(PathBuf),
    /// A symbolic link. Never followed.
    Symlink(PathBuf),
    /// The path registered with [`TreeWalker::ignoring`].
    Ignored(PathBuf),
}

pub struct TreeWalker {
    root: PathBuf,
    exclude_folders: BTreeSet<String>,
    ignored: Vec<PathBuf>,
}

impl TreeWalker {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            root: config.source_root.clone(),
            exclude_folders: config.exclude_folders.clone(),
            ignored: Vec::new(),
        }
    }

    /// Reports each of `paths` as [`WalkEvent::Ignored`] instead of as a file.
    pub fn ignoring(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignored.extend(paths);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a fresh traversal. Entries are visited in file-name order, so two
    /// walks over an unchanged tree yield identical event sequences.
    pub fn walk(&self) -> Walk<'_> {
        log::debug!("Walking source directory: {}", self.root.display());
        Walk {
            walker: self,
            inner: sorted_walk(&self.root),
            pruned: None,
        }
    }

    fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_folders.contains(name)
    }
}

fn sorted_walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
}

pub struct Walk<'a> {
    walker: &'a TreeWalker,
    inner: walkdir::IntoIter,
    pruned: Option<walkdir::IntoIter>,
}

impl Walk<'_> {
    fn next_pruned(&mut self) -> Option<WalkEvent> {
        let pruned = self.pruned.as_mut()?;
        loop {
            match pruned.next() {
                Some(Ok(entry)) => {
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    return Some(WalkEvent::PrunedFile(entry.into_path()));
                }
                Some(Err(e)) => {
                    log::warn!("Error listing excluded directory: {}", e);
                }
                None => {
                    self.pruned = None;
                    return None;
                }
            }
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if let Some(event) = self.next_pruned() {
            return Some(event);
        }
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let Some(path) = e.path().map(Path::to_path_buf) else {
                        log::warn!("Error walking directory: {}", e);
                        continue;
                    };
                    log::warn!("Error walking '{}': {}", path.display(), e);
                    let error = e.to_string();
                    if fs::symlink_metadata(&path).is_ok_and(|m| m.is_dir()) {
                        return Some(WalkEvent::UnreadableDir { path, error });
                    }
                    return Some(WalkEvent::Unreadable { path, error });
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                log::trace!("Not following symlink: {}", entry.path().display());
                return Some(WalkEvent::Symlink(entry.into_path()));
            }
            if file_type.is_dir() {
                let excluded = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.walker.is_excluded_dir(name));
                if excluded {
                    log::debug!("Pruning excluded directory: {}", entry.path().display());
                    self.inner.skip_current_dir();
                    self.pruned = Some(sorted_walk(entry.path()));
                    return Some(WalkEvent::PrunedDir(entry.into_path()));
                }
                continue;
            }
            if !file_type.is_file() {
                log::debug!("Not a regular file: {}", entry.path().display());
                return Some(WalkEvent::Special(entry.into_path()));
            }
            if self.walker.ignored.iter().any(|p| p == entry.path()) {
                return Some(WalkEvent::Ignored(entry.into_path()));
            }

            return Some(match entry.metadata() {
                Ok(meta) => WalkEvent::File(Candidate::from_metadata(entry.into_path(), &meta)),
                Err(e) => {
                    log::warn!("Could not read metadata of {}: {}", entry.path().display(), e);
                    WalkEvent::Unreadable {
                        path: entry.into_path(),
                        error: e.to_string(),
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FuseConfig;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join(".git/objects/ab")).unwrap();
        fs::create_dir_all(root.join("docs/.git")).unwrap();
        fs::write(root.join("a.py"), "print(1)\n").unwrap();
        fs::write(root.join("src/lib.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/nested/deep.rs"), "// deep\n").unwrap();
        fs::write(root.join(".git/HEAD"), "ref: main\n").unwrap();
        fs::write(root.join(".git/objects/ab/cdef"), "blob").unwrap();
        fs::write(root.join("docs/.git/config"), "x").unwrap();
        dir
    }

    fn walker_for(dir: &TempDir) -> TreeWalker {
        TreeWalker::new(&FuseConfig::for_source(dir.path()).resolve().unwrap())
    }

    fn relative(walker: &TreeWalker, path: &Path) -> String {
        path.strip_prefix(walker.root())
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn excluded_directories_are_pruned_but_surfaced() {
        let dir = tree();
        let walker = walker_for(&dir);
        let mut files = Vec::new();
        let mut pruned_dirs = Vec::new();
        let mut pruned_files = Vec::new();
        for event in walker.walk() {
            match event {
                WalkEvent::File(c) => files.push(relative(&walker, &c.path)),
                WalkEvent::PrunedDir(p) => pruned_dirs.push(relative(&walker, &p)),
                WalkEvent::PrunedFile(p) => pruned_files.push(relative(&walker, &p)),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(files, vec!["a.py", "src/lib.rs", "src/nested/deep.rs"]);
        assert_eq!(pruned_dirs, vec![".git", "docs/.git"]);
        assert_eq!(
            pruned_files,
            vec![".git/HEAD", ".git/objects/ab/cdef", "docs/.git/config"]
        );
    }

    #[test]
    fn walk_is_restartable_and_stable() {
        let dir = tree();
        let walker = walker_for(&dir);
        let first: Vec<WalkEvent> = walker.walk().collect();
        let second: Vec<WalkEvent> = walker.walk().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn candidates_carry_size() {
        let dir = tree();
        let walker = walker_for(&dir);
        let candidate = walker
            .walk()
            .find_map(|e| match e {
                WalkEvent::File(c) if c.file_name() == "a.py" => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(candidate.size, 9);
        assert!(candidate.modified.is_some());
    }

    #[test]
    fn ignored_path_is_reported_separately() {
        let dir = tree();
        let target = dir.path().canonicalize().unwrap().join("a.py");
        let walker = walker_for(&dir).ignoring([target.clone()]);
        let events: Vec<WalkEvent> = walker.walk().collect();
        assert!(events.contains(&WalkEvent::Ignored(target)));
        assert!(!events.iter().any(|e| matches!(e, WalkEvent::File(c) if c.file_name() == "a.py")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("link")).unwrap();
        let walker = walker_for(&dir);
        let events: Vec<WalkEvent> = walker.walk().collect();
        let symlinks: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                WalkEvent::Symlink(p) => Some(relative(&walker, p)),
                _ => None,
            })
            .collect();
        assert_eq!(symlinks, vec!["link"]);
        assert!(!events.iter().any(|e| matches!(e, WalkEvent::File(c) if c.path.starts_with(walker.root().join("link")))));
    }

    #[cfg(unix)]
    #[test]
    fn fifos_are_reported_not_yielded_as_files() {
        let dir = tree();
        let fifo = dir.path().join("pipe.py");
        let made = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !made.is_ok_and(|s| s.success()) {
            return;
        }
        let walker = walker_for(&dir);
        let events: Vec<WalkEvent> = walker.walk().collect();
        assert!(events.iter().any(|e| matches!(e, WalkEvent::Special(p) if p.ends_with("pipe.py"))));
        assert!(!events.iter().any(|e| matches!(e, WalkEvent::File(c) if c.file_name() == "pipe.py")));
    }

    #[cfg(unix)]
    #[test]
    fn unlistable_directory_is_reported_as_a_directory() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tree();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("inner.rs"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Running with privileges that ignore permission bits.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let walker = walker_for(&dir);
        let events: Vec<WalkEvent> = walker.walk().collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let unreadable: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                WalkEvent::UnreadableDir { path, .. } => Some(relative(&walker, path)),
                _ => None,
            })
            .collect();
        assert_eq!(unreadable, vec!["locked"]);
        assert!(!events.iter().any(|e| matches!(e, WalkEvent::Unreadable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_captured() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tree();
        let script = dir.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let walker = walker_for(&dir);
        let attrs: Vec<(String, bool)> = walker
            .walk()
            .filter_map(|e| match e {
                WalkEvent::File(c) => Some((c.file_name().into_owned(), c.attrs.executable_bit)),
                _ => None,
            })
            .collect();
        assert!(attrs.contains(&("run.sh".to_string(), true)));
        assert!(attrs.contains(&("a.py".to_string(), false)));
    }
}
