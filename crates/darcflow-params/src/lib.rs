//! darcflow-params - Batch ligand parameterization.
//!
//! Each molecule in a batch is assigned a three-character residue code that
//! is not already taken by the Rosetta chemical database, an exclusion list,
//! or an earlier batch in the same output directory.

pub mod batch;
pub mod code;
pub mod database;
pub mod editing;

pub use batch::{
    base_name, read_molfile_list, BatchOptions, BatchParameterizer, BatchReport, FailedLigand,
    LigandRecord,
};
pub use code::{CodeEnumerator, LigandCode, CODE_SPACE};
pub use database::DisallowedSet;
pub use editing::{append_rotamers_directive, io_string, rename_params_file, rename_pdb_residues};

pub type Result<T> = darcflow_common::Result<T>;
