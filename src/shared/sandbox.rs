use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("path escapes the data root: {0}")]
    Escape(String),
    #[error("unsupported path component in: {0}")]
    BadComponent(String),
}

/// Conventional absolute spelling of the data root in task text.
const DATA_ALIAS: &str = "/data";

/// Confines every file operation to a single root directory.
///
/// Containment is checked component-wise after lexical normalization, so a
/// sibling directory sharing a string prefix with the root (`/data-other` for
/// a root of `/data`) is rejected - the prefix-only check this replaces would
/// have admitted it.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_lexically(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to an absolute path under the root.
    ///
    /// Absolute candidates must already live under the root, except for the
    /// well-known `/data/...` spelling tasks use, which is re-anchored at the
    /// configured root. Relative candidates are anchored at the root. `..`
    /// segments are resolved lexically and may never climb above the root.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, SandboxError> {
        let candidate = Path::new(raw);

        let full = if candidate.is_absolute() {
            let normalized = normalize_lexically(candidate);
            match normalized.strip_prefix(DATA_ALIAS) {
                Ok(rest) if !normalized.starts_with(&self.root) => self.root.join(rest),
                _ => normalized,
            }
        } else {
            let mut full = self.root.clone();
            for component in candidate.components() {
                match component {
                    Component::Normal(seg) => full.push(seg),
                    Component::CurDir => {}
                    Component::ParentDir => {
                        if full == self.root || !full.pop() {
                            return Err(SandboxError::Escape(raw.to_string()));
                        }
                    }
                    Component::RootDir | Component::Prefix(_) => {
                        return Err(SandboxError::BadComponent(raw.to_string()));
                    }
                }
            }
            full
        };

        if !full.starts_with(&self.root) {
            return Err(SandboxError::Escape(raw.to_string()));
        }

        Ok(full)
    }
}

/// Resolve `.` and `..` without touching the filesystem. `..` at the
/// filesystem root is dropped, matching how the OS resolves it.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => out.push(component.as_os_str()),
            Component::Normal(seg) => out.push(seg),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}
