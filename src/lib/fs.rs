//! File-tree helpers used by the template initializer and job output directories.

use std::{
    fs::{self, File, FileTimes},
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::lib::errors::InitError;

/// What happened to a single template file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyAction {
    /// Destination did not exist.
    Copied,
    /// Destination existed and `force` was set.
    Overwritten,
    /// Destination existed and was left untouched.
    Skipped,
}

impl CopyAction {
    /// Progress label printed by `hpinit`.
    pub const fn label(&self) -> &'static str {
        match self {
            CopyAction::Copied => "Copying",
            CopyAction::Overwritten => "Overwriting",
            CopyAction::Skipped => "Skipping existing file",
        }
    }
}

/// Result summary for `mirror_tree`.
///
/// Paths are relative to the destination root, `/`-separated, in visit order.
/// `copied` includes overwritten files; `overwritten` lists that subset again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: Vec<String>,
    pub overwritten: Vec<String>,
    pub skipped: Vec<String>,
}

impl CopyReport {
    /// True when the source tree contained no files at all.
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty() && self.skipped.is_empty()
    }
}

/// Mirror `source` into `destination` depth-first.
///
/// Existing destination files are skipped unless `force` is set. `on_event` is
/// invoked once per file as the action happens. `cancel` is polled before each
/// entry and aborts the walk with `InitError::Interrupted`.
pub fn mirror_tree(
    source: &Path,
    destination: &Path,
    force: bool,
    cancel: &AtomicBool,
    mut on_event: impl FnMut(CopyAction, &str),
) -> Result<CopyReport, InitError> {
    let mut mirror = Mirror {
        root: destination,
        force,
        cancel,
        report: CopyReport::default(),
        on_event: &mut on_event,
    };
    mirror.walk(source, destination)?;
    Ok(mirror.report)
}

struct Mirror<'a> {
    root: &'a Path,
    force: bool,
    cancel: &'a AtomicBool,
    report: CopyReport,
    on_event: &'a mut dyn FnMut(CopyAction, &str),
}

impl Mirror<'_> {
    fn walk(&mut self, src_dir: &Path, dst_dir: &Path) -> Result<(), InitError> {
        for src_item in sorted_entries(src_dir)? {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(InitError::Interrupted);
            }
            let Some(name) = src_item.file_name() else {
                continue;
            };
            let dst_item = dst_dir.join(name);

            if src_item.is_file() {
                self.copy_one(&src_item, &dst_item)?;
            } else if src_item.is_dir() {
                ensure_dir(&dst_item)?;
                self.walk(&src_item, &dst_item)?;
            }
        }
        Ok(())
    }

    fn copy_one(&mut self, src_item: &Path, dst_item: &Path) -> Result<(), InitError> {
        let relative = relative_display(self.root, dst_item);
        let existed = dst_item.exists();

        if existed && !self.force {
            (self.on_event)(CopyAction::Skipped, &relative);
            self.report.skipped.push(relative);
            return Ok(());
        }

        if let Some(parent) = dst_item.parent() {
            ensure_dir(parent)?;
        }
        copy_file_with_metadata(src_item, dst_item).map_err(|source| InitError::Copy {
            from: src_item.to_path_buf(),
            to: dst_item.to_path_buf(),
            source,
        })?;

        let action = if existed {
            CopyAction::Overwritten
        } else {
            CopyAction::Copied
        };
        (self.on_event)(action, &relative);
        if action == CopyAction::Overwritten {
            self.report.overwritten.push(relative.clone());
        }
        self.report.copied.push(relative);
        Ok(())
    }
}

/// Create a directory and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<(), InitError> {
    fs::create_dir_all(path).map_err(|source| InitError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy file bytes and permissions, then carry over access/modification times.
pub fn copy_file_with_metadata(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let metadata = fs::metadata(from)?;
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    // Read-only copies cannot be reopened for writing; a read handle is enough on unix.
    let file = File::options()
        .write(true)
        .open(to)
        .or_else(|_| File::open(to))?;
    file.set_times(times)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, InitError> {
    let read_err = |source| InitError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        entries.push(entry.map_err(read_err)?.path());
    }
    entries.sort();
    Ok(entries)
}

fn relative_display(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
