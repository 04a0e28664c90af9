use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "darcflow",
    about = "Grid conversion, ligand parameterization and Rosetta DARC docking steps",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file (default: $DARCFLOW_CONFIG or ./darcflow.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print step outputs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert an AutoGrid electrostatic map (.e.map) to an AGD grid
    ConvertGrid(ConvertGridArgs),

    /// Parameterize a list of molfiles with unique three-character codes
    BatchParams(BatchParamsArgs),

    /// Charge, protonate and optionally expand ligands into conformers, then
    /// parameterize them
    PrepareLigands(PrepareLigandsArgs),

    /// Rename the residue of a params file
    RenameParams(RenameParamsArgs),

    /// Write an AutoGrid parameter file, optionally running AutoGrid on it
    WriteGpf(WriteGpfArgs),

    /// Clean a protein and rebuild its missing atoms with Rosetta score
    PrepareTarget(PrepareTargetArgs),

    /// Map a pocket with make_ray_files
    MakeRays(MakeRaysArgs),

    /// Dock a parameterized ligand with DARC
    Dock(DockArgs),

    /// Convert a structure or small molecule with OpenBabel
    ConvertFormat(ConvertFormatArgs),

    /// Print a Rosetta score file
    Scores(ScoresArgs),

    /// Report problems with the configured installation
    CheckInstall,
}

/// Box placement shared by grid commands.
#[derive(Args)]
pub struct BoxOptions {
    /// Box center
    #[arg(
        long,
        num_args = 3,
        value_names = ["X", "Y", "Z"],
        allow_hyphen_values = true
    )]
    pub center: Option<Vec<f64>>,

    /// Box radius in Å
    #[arg(long, value_name = "R")]
    pub radius: Option<f64>,

    /// Grid spacing in Å (default from configuration)
    #[arg(long, value_name = "S")]
    pub spacing: Option<f64>,
}

#[derive(Args)]
pub struct ConvertGridArgs {
    /// AutoGrid .e.map file
    pub emap: PathBuf,

    #[command(flatten)]
    pub grid: BoxOptions,

    /// Destination (default: <name>.agd next to the map)
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Check every sample is numeric and the count matches the grid
    #[arg(long)]
    pub validate: bool,
}

/// Where batch parameterization looks up reserved codes and its script.
#[derive(Args)]
pub struct ParamsSource {
    /// Rosetta database (default from configuration)
    #[arg(long, value_name = "DIR")]
    pub database: Option<PathBuf>,

    /// molfile_to_params.py (default from configuration)
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Extra codes to avoid, one per line
    #[arg(long, value_name = "FILE")]
    pub exclusion_list: Option<PathBuf>,
}

#[derive(Args)]
pub struct BatchParamsArgs {
    /// File listing one molfile per line
    pub list: PathBuf,

    #[command(flatten)]
    pub source: ParamsSource,

    /// Directory the script runs in (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ConformerMethod {
    /// OpenBabel genetic algorithm
    Genetic,
    /// OpenBabel Confab
    Confab,
}

#[derive(Args)]
pub struct PrepareLigandsArgs {
    /// Ligands in PDB or mol2 format
    #[arg(required = true)]
    pub molecules: Vec<PathBuf>,

    /// Partial charge model: gasteiger, mmff94, qeq, qtpie, eqeq, eem or none
    #[arg(long, value_name = "METHOD")]
    pub charges: Option<String>,

    /// Protonate for this pH instead of adding all hydrogens
    #[arg(long)]
    pub ph: Option<f64>,

    /// Generate conformers with this method
    #[arg(long, value_enum, value_name = "METHOD")]
    pub conformers: Option<ConformerMethod>,

    /// Maximum conformers per ligand
    #[arg(long, value_name = "N")]
    pub max_conformers: Option<u32>,

    /// Confab RMSD cutoff in Å
    #[arg(long, value_name = "A")]
    pub rmsd_cutoff: Option<f64>,

    #[command(flatten)]
    pub source: ParamsSource,

    /// Directory for prepared ligands and the params/ tree (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct RenameParamsArgs {
    pub params: PathBuf,

    /// New three-character residue name
    pub name: String,

    /// Conformer library referenced by PDB_ROTAMERS
    pub conformers: String,

    /// Also rename the HETATM residues of this PDB
    #[arg(long, value_name = "FILE")]
    pub pdb: Option<PathBuf>,
}

#[derive(Args)]
pub struct WriteGpfArgs {
    /// Receptor in PDBQT format
    pub receptor: PathBuf,

    #[command(flatten)]
    pub grid: BoxOptions,

    /// Output directory (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Run AutoGrid and convert the electrostatic map to AGD
    #[arg(long)]
    pub run: bool,
}

#[derive(Args)]
pub struct PrepareTargetArgs {
    pub structure: PathBuf,

    /// Keep water molecules
    #[arg(long)]
    pub keep_waters: bool,

    /// Keep ligands and other HETATM records
    #[arg(long)]
    pub keep_hetatm: bool,

    /// Keep only this chain
    #[arg(long, value_name = "ID")]
    pub chain: Option<char>,

    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct MakeRaysArgs {
    pub structure: PathBuf,

    /// Residue number the rays are cast around
    #[arg(long, value_name = "N")]
    pub target: String,

    /// More target residues, separated by commas, semicolons or spaces
    #[arg(long, value_name = "LIST")]
    pub extra_targets: Option<String>,

    /// Residue used as ray origin
    #[arg(long, value_name = "N")]
    pub origin: Option<u32>,

    /// Electrostatic grid (.agd, or .e.map converted on the fly)
    #[arg(long, value_name = "FILE")]
    pub grid: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct DockArgs {
    /// Prepared protein structure
    pub protein: PathBuf,

    /// Ligand directory produced by batch-params (params/<name>)
    pub params_dir: PathBuf,

    /// Directory holding the ray file
    #[arg(long, value_name = "DIR")]
    pub ray_dir: PathBuf,

    /// Ligand name (default: name of the params directory)
    #[arg(long)]
    pub ligand: Option<String>,

    /// Electrostatic grid in AGD format
    #[arg(long, value_name = "FILE")]
    pub grid: Option<PathBuf>,

    /// Do not search conformers during docking
    #[arg(long)]
    pub no_conformer_search: bool,

    /// Do not minimize the best pose
    #[arg(long)]
    pub no_minimize: bool,
}

#[derive(Args)]
pub struct ConvertFormatArgs {
    pub input: PathBuf,

    /// Target format: pdb, cif, sdf, sd, mol2 or smi
    #[arg(long)]
    pub to: String,

    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ScoresArgs {
    pub score_file: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}
