//! Batch conversion of molfiles into Rosetta residue parameters.
//!
//! Every molecule gets its own directory under `params/`, named after the
//! molfile, holding the params file, the merged conformer library and the
//! tool log. The script writes its output into the working directory under
//! the residue code it was given, so two runs must never share a code.

use darcflow_common::{DarcError, DarcflowConfig, Result};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::code::{CodeEnumerator, LigandCode};
use crate::database::DisallowedSet;
use crate::editing::{append_rotamers_directive, io_string};

pub const LOG_FILE: &str = "log.txt";

/// Where the parameterization script lives and where it runs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// `molfile_to_params.py` or a compatible program.
    pub script: PathBuf,
    /// Runs the script through this interpreter when set.
    pub interpreter: Option<PathBuf>,
    /// Directory the script runs in and writes its output to.
    pub work_dir: PathBuf,
    pub output_dir_name: String,
}

impl BatchOptions {
    pub fn from_config(config: &DarcflowConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            script: config.rosetta.params_scripts_dir().join("molfile_to_params.py"),
            interpreter: config.rosetta.python.clone(),
            work_dir: work_dir.into(),
            output_dir_name: config.params.output_dir_name.clone(),
        }
    }

    pub fn output_root(&self) -> PathBuf {
        self.work_dir.join(&self.output_dir_name)
    }
}

/// A molecule that was parameterized successfully.
#[derive(Debug, Clone, Serialize)]
pub struct LigandRecord {
    pub source: PathBuf,
    pub base_name: String,
    pub code: LigandCode,
    pub params_file: PathBuf,
    pub conformers_file: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedLigand {
    pub source: PathBuf,
    pub base_name: String,
    /// `None` when the molecule failed before a code was drawn.
    pub code: Option<LigandCode>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<LigandRecord>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedLigand>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = (&str, LigandCode)> {
        self.processed.iter().map(|r| (r.base_name.as_str(), r.code))
    }
}

/// File name of `path` up to its first `.`.
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    match name.split_once('.') {
        Some((base, _)) => base.to_string(),
        None => name,
    }
}

/// Newline-separated list of molfiles; blank lines are ignored.
pub fn read_molfile_list(path: &Path) -> Result<Vec<PathBuf>> {
    DarcError::require(path)?;
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Drives the parameterization script over a list of molfiles.
pub struct BatchParameterizer {
    options: BatchOptions,
    disallowed: DisallowedSet,
    codes: CodeEnumerator,
}

impl BatchParameterizer {
    pub fn new(options: BatchOptions, disallowed: DisallowedSet) -> Result<Self> {
        if !options.script.exists() {
            return Err(DarcError::Config(format!(
                "parameterization script not found: {}",
                options.script.display()
            )));
        }
        Ok(Self {
            options,
            disallowed,
            codes: CodeEnumerator::new(),
        })
    }

    /// Codes drawn so far in this run.
    pub fn codes_consumed(&self) -> usize {
        self.codes.consumed()
    }

    pub async fn run(&mut self, molfiles: &[PathBuf]) -> Result<BatchReport> {
        let root = self.options.output_root();
        fs::create_dir_all(&root)?;

        let reserved = existing_codes(&root)?;
        if !reserved.is_empty() {
            debug!("{} codes already used under {}", reserved.len(), root.display());
        }
        for code in reserved {
            self.disallowed.insert(code);
        }

        let mut report = BatchReport::default();
        for molfile in molfiles {
            let base = base_name(molfile);
            let ligand_dir = root.join(&base);

            if has_params(&ligand_dir)? {
                info!("{} already parameterized, skipping", base);
                report.skipped.push(base);
                continue;
            }

            let source = match self.resolve(molfile) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Cannot read {}: {}", molfile.display(), e);
                    report.failed.push(FailedLigand {
                        source: molfile.clone(),
                        base_name: base,
                        code: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let code = self.codes.next_allowed(&self.disallowed)?;
            fs::create_dir_all(&ligand_dir)?;

            match self.parameterize(&source, &base, code, &ligand_dir).await {
                Ok(record) => {
                    info!("{} -> {}", base, code);
                    report.processed.push(record);
                }
                Err(e @ DarcError::ExternalToolFailure { .. }) => {
                    warn!("Parameterization of {} as {} failed: {}", base, code, e);
                    self.remove_stray_files(code)?;
                    report.failed.push(FailedLigand {
                        source,
                        base_name: base,
                        code: Some(code),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Batch finished: {} processed, {} skipped, {} failed",
            report.processed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn resolve(&self, molfile: &Path) -> Result<PathBuf> {
        let path = if molfile.is_relative() {
            self.options.work_dir.join(molfile)
        } else {
            molfile.to_path_buf()
        };
        DarcError::require(&path)?;
        Ok(path.canonicalize()?)
    }

    async fn parameterize(
        &self,
        source: &Path,
        base: &str,
        code: LigandCode,
        ligand_dir: &Path,
    ) -> Result<LigandRecord> {
        let work_dir = &self.options.work_dir;
        let log_file = ligand_dir.join(LOG_FILE);
        let log = OpenOptions::new().create(true).append(true).open(&log_file)?;
        let log_err = log.try_clone()?;

        let mut cmd = match &self.options.interpreter {
            Some(python) => {
                let mut cmd = Command::new(python);
                cmd.arg(&self.options.script);
                cmd
            }
            None => Command::new(&self.options.script),
        };
        debug!("Running {} -n {} {}", self.options.script.display(), code, source.display());

        let status = cmd
            .arg("-n")
            .arg(code.as_str())
            .arg(source)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .await?;

        if !status.success() {
            return Err(DarcError::ExternalToolFailure {
                program: self.options.script.display().to_string(),
                status: status.to_string(),
                stderr: format!("see {}", log_file.display()),
            });
        }

        let params_name = format!("{code}.params");
        let generated = work_dir.join(&params_name);
        if !generated.exists() {
            return Err(DarcError::ExternalToolFailure {
                program: self.options.script.display().to_string(),
                status: status.to_string(),
                stderr: format!("{params_name} was not written"),
            });
        }

        let conformers_name = format!("{code}_conformers.pdb");
        let conformers_file = ligand_dir.join(&conformers_name);
        let fragments = conformer_fragments(work_dir, code)?;
        if fragments.is_empty() {
            warn!("No conformers written for {}", base);
        }
        let mut merged = File::create(&conformers_file)?;
        for fragment in &fragments {
            merged.write_all(&fs::read(fragment)?)?;
            fs::remove_file(fragment)?;
        }

        append_rotamers_directive(&generated, &conformers_name)?;
        let params_file = ligand_dir.join(&params_name);
        fs::rename(&generated, &params_file)?;

        Ok(LigandRecord {
            source: source.to_path_buf(),
            base_name: base.to_string(),
            code,
            params_file,
            conformers_file,
            log_file,
        })
    }

    /// Removes what the script may have written for `code` before failing:
    /// `<code>.params` and `<code>_*.pdb`. Nothing else in the working
    /// directory is touched.
    fn remove_stray_files(&self, code: LigandCode) -> Result<()> {
        let work_dir = &self.options.work_dir;
        let mut stray = conformer_fragments(work_dir, code)?;
        let params = work_dir.join(format!("{code}.params"));
        if params.is_file() {
            stray.push(params);
        }
        for path in stray {
            debug!("Removing {}", path.display());
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// `<code>_*.pdb` files in `dir`, sorted by name.
fn conformer_fragments(dir: &Path, code: LigandCode) -> Result<Vec<PathBuf>> {
    let prefix = format!("{code}_");
    let mut fragments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.ends_with(".pdb") && entry.path().is_file() {
            fragments.push(entry.path());
        }
    }
    fragments.sort();
    Ok(fragments)
}

fn has_params(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for entry in fs::read_dir(dir)? {
        if entry?.path().extension().is_some_and(|ext| ext == "params") {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Residue names of every `params/*/*.params` file.
fn existing_codes(root: &Path) -> Result<Vec<String>> {
    let mut codes = Vec::new();
    for dir in fs::read_dir(root)? {
        let dir = dir?.path();
        if !dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension() != Some(OsStr::new("params")) {
                continue;
            }
            let name = match io_string(&path)? {
                Some(name) => name,
                None => base_name(&path),
            };
            codes.push(name);
        }
    }
    Ok(codes)
}
