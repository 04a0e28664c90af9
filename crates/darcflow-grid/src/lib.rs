//! darcflow-grid - Volumetric scalar grids for electrostatics-aware docking.
//!
//! AutoGrid writes its electrostatic potential as an `.e.map` file: a short
//! keyword header followed by one value per line. The ray and DARC programs
//! read the same samples as an AGD ASCII grid with a five-line header. This
//! crate converts between the two and writes the AutoGrid parameter file
//! that produces the map in the first place.

pub mod agd;
pub mod emap;
pub mod gpf;
pub mod grid;

pub use agd::{agd_path_for, convert_emap_to_agd, read_agd, ConversionSummary, ConvertOptions};
pub use emap::{read_emap, EmapHeader};
pub use gpf::{receptor_atom_types, write_gpf, GpfSpec};
pub use grid::{GridGeometry, ScalarGrid};

pub type Result<T> = darcflow_common::Result<T>;
