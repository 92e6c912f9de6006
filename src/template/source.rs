//! Where template text comes from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage;

/// Loads template text by relative name.
///
/// `None` means "no such template"; the engine renders a missing include as
/// the empty string.
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Option<String>;
}

/// Templates stored as files under a views directory.
///
/// Names are resolved relative to the directory. Absolute names and names
/// with `..` components never load.
#[derive(Clone, Debug)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for Directory {
    fn load(&self, name: &str) -> Option<String> {
        let Some(path) = storage::resolve(&self.root, name) else {
            debug!(name, "template name escapes the views directory");
            return None;
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "template not loaded");
                None
            }
        }
    }
}

/// In-memory templates, keyed by name.
impl TemplateSource for HashMap<String, String> {
    fn load(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
