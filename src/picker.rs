/// Switch-File browser — the state machine behind the file picker dialog.
///
/// States: `Browsing(dir)` → `Chosen(path)` | `Cancelled`.
/// Selecting `..` moves to the parent and re-lists, selecting a directory
/// descends into it, selecting a file ends the walk with its absolute path.
use std::path::{Path, PathBuf};

pub const PARENT_ENTRY: &str = "..";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Parent,
    Dir,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    /// Label as shown in the dialog; directories carry a trailing slash.
    pub fn label(&self) -> String {
        match self.kind {
            EntryKind::Dir => format!("{}/", self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseState {
    Browsing(PathBuf),
    Chosen(PathBuf),
    Cancelled,
}

pub struct FileBrowser {
    dir: PathBuf,
    entries: Vec<Entry>,
    pub selected: usize,
}

impl FileBrowser {
    /// Start browsing at `dir`, which is made absolute.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        let dir = absolute(dir)?;
        let entries = list_entries(&dir)?;
        Ok(Self { dir, entries, selected: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    /// Activate the highlighted entry.
    pub fn confirm(&mut self) -> std::io::Result<BrowseState> {
        match self.entries.get(self.selected).cloned() {
            Some(entry) => self.select(&entry.name),
            None => Ok(BrowseState::Browsing(self.dir.clone())),
        }
    }

    /// Activate the entry called `name` in the current listing.
    ///
    /// A listing failure for the new directory keeps the browser where it was.
    pub fn select(&mut self, name: &str) -> std::io::Result<BrowseState> {
        if name == PARENT_ENTRY {
            let parent = self.dir.parent().map(Path::to_path_buf).unwrap_or_else(|| self.dir.clone());
            self.change_dir(parent)?;
            return Ok(BrowseState::Browsing(self.dir.clone()));
        }

        let target = self.dir.join(name);
        if target.is_dir() {
            self.change_dir(target)?;
            Ok(BrowseState::Browsing(self.dir.clone()))
        } else if target.is_file() {
            Ok(BrowseState::Chosen(target))
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} no longer exists", target.display()),
            ))
        }
    }

    pub fn cancel(&self) -> BrowseState {
        BrowseState::Cancelled
    }

    fn change_dir(&mut self, dir: PathBuf) -> std::io::Result<()> {
        let entries = list_entries(&dir)?;
        tracing::debug!(dir = %dir.display(), entries = entries.len(), "file picker listing");
        self.dir = dir;
        self.entries = entries;
        self.selected = 0;
        Ok(())
    }
}

/// `..` first, then directories, then files, each group sorted by name.
fn list_entries(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();

    let mut out = Vec::with_capacity(dirs.len() + files.len() + 1);
    out.push(Entry { name: PARENT_ENTRY.to_string(), kind: EntryKind::Parent });
    out.extend(dirs.into_iter().map(|name| Entry { name, kind: EntryKind::Dir }));
    out.extend(files.into_iter().map(|name| Entry { name, kind: EntryKind::File }));
    Ok(out)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
