//! Residue codes already reserved by the Rosetta chemical database.

use darcflow_common::{DarcError, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::code::LigandCode;
use crate::editing::io_string;

/// Relative location of the residue type sets inside a database.
pub const RESIDUE_TYPE_SETS: &str = "chemical/residue_type_sets";
pub const MANIFEST: &str = "residue_types.txt";

/// Codes that a newly generated ligand must not use.
#[derive(Debug, Clone, Default)]
pub struct DisallowedSet {
    names: HashSet<String>,
}

impl DisallowedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan every residue type set manifest under `database` and collect the
    /// `IO_STRING` of each listed `.params` file.
    pub fn from_database(database: &Path) -> Result<Self> {
        let sets_dir = database.join(RESIDUE_TYPE_SETS);
        if !sets_dir.is_dir() {
            return Err(DarcError::MissingInput(sets_dir));
        }

        let mut set = Self::new();
        let mut entries: Vec<_> = fs::read_dir(&sets_dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            let set_dir = entry.path();
            let manifest = set_dir.join(MANIFEST);
            if !manifest.exists() {
                debug!("No {} in {}, skipping", MANIFEST, set_dir.display());
                continue;
            }

            let before = set.len();
            for line in fs::read_to_string(&manifest)?.lines() {
                if let Some(name) = manifest_entry_name(line, &set_dir)? {
                    set.insert(name);
                }
            }
            debug!("{}: {} reserved codes", name.to_string_lossy(), set.len() - before);
        }

        info!("Collected {} reserved residue codes from {}", set.len(), database.display());
        Ok(set)
    }

    /// Add one code per line from a user exclusion list.
    pub fn extend_from_exclusion_file(&mut self, path: &Path) -> Result<usize> {
        DarcError::require(path)?;
        let before = self.len();
        for line in fs::read_to_string(path)?.lines() {
            let code = line.trim_end();
            if !code.is_empty() {
                self.insert(code.to_string());
            }
        }
        Ok(self.len() - before)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, code: &LigandCode) -> bool {
        self.names.contains(code.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Extend<LigandCode> for DisallowedSet {
    fn extend<T: IntoIterator<Item = LigandCode>>(&mut self, iter: T) {
        self.names.extend(iter.into_iter().map(String::from));
    }
}

/// The `IO_STRING` of the params file named on one manifest line, if any.
///
/// Blank lines, `#` comments and entries that are not `.params` files
/// contribute nothing; neither do listed files that do not exist.
fn manifest_entry_name(line: &str, set_dir: &Path) -> Result<Option<String>> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') || !entry.ends_with(".params") {
        return Ok(None);
    }
    let params = set_dir.join(entry);
    if !params.exists() {
        return Ok(None);
    }
    io_string(&params)
}
