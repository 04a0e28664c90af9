//! Locations of the Rosetta programs inside an installation.

use darcflow_common::RosettaConfig;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosettaProgram {
    Score,
    MakeRayFiles,
    Darc,
    MolfileToParams,
    BatchMolfileToParams,
}

impl RosettaProgram {
    pub const ALL: [RosettaProgram; 5] = [
        RosettaProgram::Score,
        RosettaProgram::MakeRayFiles,
        RosettaProgram::Darc,
        RosettaProgram::MolfileToParams,
        RosettaProgram::BatchMolfileToParams,
    ];

    /// Python scripts live with the params tools, not the compiled binaries.
    pub fn is_script(self) -> bool {
        matches!(self, Self::MolfileToParams | Self::BatchMolfileToParams)
    }

    /// Whether an OpenCL build of this program exists.
    pub fn has_gpu_build(self) -> bool {
        matches!(self, Self::MakeRayFiles | Self::Darc)
    }

    fn stem(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::MakeRayFiles => "make_ray_files",
            Self::Darc => "DARC",
            Self::MolfileToParams => "molfile_to_params.py",
            Self::BatchMolfileToParams => "batch_molfile_to_params.py",
        }
    }

    /// File name of the program for a build suffix such as
    /// `static.linuxgccrelease`.
    pub fn file_name(self, suffix: &str) -> String {
        if self.is_script() {
            self.stem().to_string()
        } else {
            format!("{}.{}", self.stem(), suffix)
        }
    }
}

impl fmt::Display for RosettaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Resolved directories of one Rosetta installation.
#[derive(Debug, Clone)]
pub struct RosettaPaths {
    pub binaries: PathBuf,
    pub database: PathBuf,
    pub params_scripts: PathBuf,
    pub build_suffix: String,
    pub gpu_build_suffix: String,
}

impl RosettaPaths {
    pub fn from_config(config: &RosettaConfig) -> Self {
        Self {
            binaries: config.binaries_dir(),
            database: config.database_dir(),
            params_scripts: config.params_scripts_dir(),
            build_suffix: config.build_suffix.clone(),
            gpu_build_suffix: config.gpu_build_suffix.clone(),
        }
    }

    /// Full path of `program`. The GPU build is picked only when asked for
    /// and one exists.
    pub fn program(&self, program: RosettaProgram, gpu: bool) -> PathBuf {
        if program.is_script() {
            return self.params_scripts.join(program.file_name(&self.build_suffix));
        }
        let suffix = if gpu && program.has_gpu_build() {
            &self.gpu_build_suffix
        } else {
            &self.build_suffix
        };
        self.binaries.join(program.file_name(suffix))
    }

    pub fn database(&self) -> &Path {
        &self.database
    }

    /// Programs that are not present on disk.
    pub fn missing_programs(&self, gpu: bool) -> Vec<PathBuf> {
        RosettaProgram::ALL
            .iter()
            .map(|p| self.program(*p, gpu))
            .filter(|path| !path.exists())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> RosettaPaths {
        let config = RosettaConfig {
            home: PathBuf::from("/opt/rosetta"),
            ..RosettaConfig::default()
        };
        RosettaPaths::from_config(&config)
    }

    #[test]
    fn test_program_paths() {
        let paths = paths();
        assert_eq!(
            paths.program(RosettaProgram::Score, false),
            PathBuf::from("/opt/rosetta/main/source/bin/score.static.linuxgccrelease")
        );
        assert_eq!(
            paths.program(RosettaProgram::Darc, true),
            PathBuf::from("/opt/rosetta/main/source/bin/DARC.opencl.linuxgccrelease")
        );
        assert_eq!(
            paths.program(RosettaProgram::MakeRayFiles, false),
            PathBuf::from("/opt/rosetta/main/source/bin/make_ray_files.static.linuxgccrelease")
        );
        assert_eq!(
            paths.program(RosettaProgram::MolfileToParams, true),
            PathBuf::from("/opt/rosetta/main/source/scripts/python/public/molfile_to_params.py")
        );
        assert_eq!(paths.database(), Path::new("/opt/rosetta/main/database"));
    }

    #[test]
    fn test_score_has_no_gpu_build() {
        let paths = paths();
        assert_eq!(
            paths.program(RosettaProgram::Score, true),
            paths.program(RosettaProgram::Score, false)
        );
    }

    #[test]
    fn test_missing_programs() {
        assert_eq!(paths().missing_programs(false).len(), RosettaProgram::ALL.len());
    }
}
