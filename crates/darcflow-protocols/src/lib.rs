//! darcflow-protocols - The external program steps of the docking workflow.
//!
//! Each step assembles the command line of one wrapped program, runs it in
//! a working directory and collects the files it writes:
//! 1. Target preparation (Rosetta `score`)
//! 2. Electrostatic grids (AutoGrid)
//! 3. Pocket rays (`make_ray_files`)
//! 4. Docking (`DARC`)
//! 5. Format conversion (OpenBabel)
//! 6. Ligand preparation (OpenBabel, then batch parameterization)

pub mod autogrid;
pub mod convert;
pub mod darc;
pub mod ligands;
pub mod program;
pub mod rays;
pub mod runner;
pub mod scorefile;
pub mod target;

pub use autogrid::{generate_grid, GridBox};
pub use convert::{convert_molecule, obabel_args, MoleculeFormat};
pub use darc::{dock_ligand, find_ray_file, ligand_output_files, DarcArgs, DockRequest, DockingResult};
pub use ligands::{
    charge_args, conformer_args, prepare_and_parameterize, prepare_ligands, sdf_args, ChargeMethod,
    ConformerSearch, LigandPrepOptions, LigandPreparation, LigandRunReport, PreparedLigand, Protonation,
};
pub use program::{RosettaPaths, RosettaProgram};
pub use rays::{generate_rays, parse_residue_list, ray_output_names, RayArgs, RayRequest};
pub use runner::{Invocation, ToolOutput, ToolRunner};
pub use scorefile::ScoreTable;
pub use target::{keep_pdb_records, prepare_target, CleanOptions, ScoreArgs};

pub type Result<T> = darcflow_common::Result<T>;
