use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use darcflow_common::{DarcflowConfig, StepOutputs};
use darcflow_grid::{
    agd_path_for, convert_emap_to_agd, write_gpf, ConvertOptions, EmapHeader, GpfSpec, GridGeometry,
};
use darcflow_params::{
    read_molfile_list, rename_params_file, rename_pdb_residues, BatchOptions, BatchParameterizer,
    BatchReport, DisallowedSet,
};
use darcflow_protocols::{
    dock_ligand, generate_grid, generate_rays, parse_residue_list, prepare_and_parameterize,
    prepare_target, CleanOptions, ConformerSearch, DockRequest, GridBox, LigandPrepOptions,
    MoleculeFormat, Protonation, RayRequest, RosettaPaths, ScoreTable, ToolRunner,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{
    BatchParamsArgs, BoxOptions, Cli, Command, ConformerMethod, ConvertFormatArgs, ConvertGridArgs,
    DockArgs, MakeRaysArgs, ParamsSource, PrepareLigandsArgs, PrepareTargetArgs, RenameParamsArgs,
    ScoresArgs, WriteGpfArgs,
};

/// Shared state for one invocation.
pub struct Context {
    pub config: DarcflowConfig,
    pub json: bool,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => DarcflowConfig::from_path(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DarcflowConfig::load()?,
        };
        Ok(Self {
            config,
            json: cli.json,
        })
    }

    fn runner(&self) -> ToolRunner {
        ToolRunner::with_python(self.config.rosetta.python.as_ref())
    }

    fn rosetta(&self) -> RosettaPaths {
        RosettaPaths::from_config(&self.config.rosetta)
    }

    fn emit(&self, outputs: &StepOutputs) -> Result<()> {
        if self.json {
            println!("{}", outputs.to_json()?);
        } else {
            for (key, path) in outputs.iter() {
                println!("{key}: {}", path.display());
            }
        }
        Ok(())
    }

    fn emit_value<T: Serialize>(&self, value: &T, summary: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            summary();
        }
        Ok(())
    }
}

pub async fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::ConvertGrid(args) => convert_grid(args, ctx),
        Command::BatchParams(args) => batch_params(args, ctx).await,
        Command::PrepareLigands(args) => prepare_ligands(args, ctx).await,
        Command::RenameParams(args) => rename_params(args),
        Command::WriteGpf(args) => write_gpf_file(args, ctx).await,
        Command::PrepareTarget(args) => prepare(args, ctx).await,
        Command::MakeRays(args) => make_rays(args, ctx).await,
        Command::Dock(args) => dock(args, ctx).await,
        Command::ConvertFormat(args) => convert_format(args, ctx).await,
        Command::Scores(args) => scores(args, ctx),
        Command::CheckInstall => check_install(ctx),
    }
}

fn out_dir(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| PathBuf::from("."))
}

fn center_of(grid: &BoxOptions) -> Result<Option<[f64; 3]>> {
    match grid.center.as_deref() {
        None => Ok(None),
        Some(&[x, y, z]) => Ok(Some([x, y, z])),
        Some(other) => bail!("--center takes 3 values, got {}", other.len()),
    }
}

fn grid_box(grid: &BoxOptions, ctx: &Context) -> Result<GridBox> {
    let (Some(center), Some(radius)) = (center_of(grid)?, grid.radius) else {
        bail!("--center and --radius are required");
    };
    Ok(GridBox {
        center,
        radius,
        spacing: grid.spacing.unwrap_or(ctx.config.autogrid.default_spacing),
    })
}

/// Geometry given on the command line, or declared by the map header.
fn geometry_for(emap: &Path, grid: &BoxOptions, ctx: &Context) -> Result<GridGeometry> {
    if let (Some(center), Some(radius)) = (center_of(grid)?, grid.radius) {
        let spacing = grid.spacing.unwrap_or(ctx.config.autogrid.default_spacing);
        return Ok(GridGeometry::from_radius(center, radius, spacing)?);
    }
    Ok(GridGeometry::from_header(&EmapHeader::read(emap)?)?)
}

fn convert_grid(args: ConvertGridArgs, ctx: &Context) -> Result<()> {
    let geometry = geometry_for(&args.emap, &args.grid, ctx)?;
    let dest = args.out.unwrap_or_else(|| agd_path_for(&args.emap, None));
    let summary = convert_emap_to_agd(
        &args.emap,
        &dest,
        &geometry,
        &ConvertOptions {
            validate: args.validate,
        },
    )?;
    info!("{} values written", summary.values_written);
    ctx.emit(&StepOutputs::new().with("outputGRID_AGD", summary.dest))
}

fn work_dir_or_current(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

/// A parameterizer running in `work_dir`, avoiding the database codes and
/// any exclusion list.
fn parameterizer(source: ParamsSource, work_dir: PathBuf, ctx: &Context) -> Result<BatchParameterizer> {
    let mut options = BatchOptions::from_config(&ctx.config, work_dir);
    if let Some(script) = source.script {
        options.script = script;
    }

    let database = source
        .database
        .unwrap_or_else(|| ctx.config.rosetta.database_dir());
    let mut disallowed = DisallowedSet::from_database(&database)
        .with_context(|| format!("reading residue codes from {}", database.display()))?;
    if let Some(exclusions) = source
        .exclusion_list
        .as_ref()
        .or(ctx.config.params.exclusion_list.as_ref())
    {
        let added = disallowed.extend_from_exclusion_file(exclusions)?;
        info!("{} codes excluded by {}", added, exclusions.display());
    }

    Ok(BatchParameterizer::new(options, disallowed)?)
}

fn print_batch_report(report: &BatchReport) {
    for record in &report.processed {
        println!("{}\t{}\t{}", record.base_name, record.code, record.params_file.display());
    }
    for name in &report.skipped {
        println!("{name}\tskipped");
    }
    for failed in &report.failed {
        println!("{}\tfailed\t{}", failed.base_name, failed.reason);
    }
}

async fn batch_params(args: BatchParamsArgs, ctx: &Context) -> Result<()> {
    let work_dir = work_dir_or_current(args.work_dir)?;
    let mut batch = parameterizer(args.source, work_dir, ctx)?;
    let molfiles = read_molfile_list(&args.list)?;
    let report = batch.run(&molfiles).await?;

    ctx.emit_value(&report, || print_batch_report(&report))?;
    if !report.is_clean() {
        warn!("{} molecules failed", report.failed.len());
    }
    Ok(())
}

/// Preparation options from the configuration with command-line overrides.
fn ligand_options(args: &PrepareLigandsArgs, ctx: &Context) -> Result<LigandPrepOptions> {
    let defaults = &ctx.config.ligands;
    let charges = match &args.charges {
        Some(method) => method.parse()?,
        None => defaults.charge_method.parse()?,
    };
    let count = args.max_conformers.unwrap_or(defaults.conformers);
    let conformers = args.conformers.map(|method| match method {
        ConformerMethod::Genetic => ConformerSearch::Genetic { count },
        ConformerMethod::Confab => ConformerSearch::Confab {
            count,
            rmsd_cutoff: args.rmsd_cutoff.unwrap_or(defaults.rmsd_cutoff),
        },
    });
    Ok(LigandPrepOptions {
        charges,
        protonation: Protonation::from_ph(args.ph.or(defaults.ph)),
        conformers,
    })
}

async fn prepare_ligands(args: PrepareLigandsArgs, ctx: &Context) -> Result<()> {
    let options = ligand_options(&args, ctx)?;
    let work_dir = work_dir_or_current(args.work_dir)?;
    let mut batch = parameterizer(args.source, work_dir.clone(), ctx)?;

    let report = prepare_and_parameterize(
        &ctx.runner(),
        &ctx.config.openbabel.executable,
        &args.molecules,
        &options,
        &work_dir,
        &mut batch,
    )
    .await?;

    ctx.emit_value(&report, || {
        for failed in &report.preparation.failed {
            println!("{}\tnot prepared\t{}", failed.source.display(), failed.reason);
        }
        print_batch_report(&report.parameterization);
    })?;
    let failures = report.preparation.failed.len() + report.parameterization.failed.len();
    if failures > 0 {
        warn!("{} ligands failed", failures);
    }
    Ok(())
}

fn rename_params(args: RenameParamsArgs) -> Result<()> {
    rename_params_file(&args.params, &args.name, &args.conformers)?;
    if let Some(pdb) = &args.pdb {
        let renamed = rename_pdb_residues(pdb, &args.name)?;
        info!("Renamed {} HETATM records in {}", renamed, pdb.display());
    }
    Ok(())
}

async fn write_gpf_file(args: WriteGpfArgs, ctx: &Context) -> Result<()> {
    let grid_box = grid_box(&args.grid, ctx)?;
    let out_dir = out_dir(args.out_dir);

    if args.run {
        let outputs = generate_grid(
            &ctx.runner(),
            &ctx.config.autogrid.executable,
            &args.receptor,
            &grid_box,
            &out_dir,
        )
        .await?;
        return ctx.emit(&outputs);
    }

    let spec = GpfSpec::for_receptor(&args.receptor, grid_box.center, grid_box.radius, grid_box.spacing)?;
    let dest = out_dir.join(format!("{}.gpf", spec.receptor_name()));
    write_gpf(&spec, &dest)?;
    ctx.emit(&StepOutputs::new().with("gpfFile", dest))
}

async fn prepare(args: PrepareTargetArgs, ctx: &Context) -> Result<()> {
    let clean = CleanOptions {
        remove_waters: !args.keep_waters,
        remove_hetatm: !args.keep_hetatm,
        chain: args.chain.map(|c| c.to_ascii_uppercase()),
    };
    let outputs = prepare_target(
        &ctx.runner(),
        &ctx.rosetta(),
        &ctx.config.run,
        &args.structure,
        &clean,
        &out_dir(args.out_dir),
    )
    .await?;
    ctx.emit(&outputs)
}

async fn make_rays(args: MakeRaysArgs, ctx: &Context) -> Result<()> {
    let out_dir = out_dir(args.out_dir);
    std::fs::create_dir_all(&out_dir)?;

    let esp_grid = match args.grid {
        Some(grid) if grid.to_string_lossy().ends_with(".e.map") => {
            let geometry = GridGeometry::from_header(&EmapHeader::read(&grid)?)?;
            let agd = agd_path_for(&grid, Some(&out_dir));
            convert_emap_to_agd(&grid, &agd, &geometry, &ConvertOptions::default())?;
            Some(agd)
        }
        other => other,
    };

    let request = RayRequest {
        structure: args.structure,
        target_residue: args.target,
        extra_targets: args
            .extra_targets
            .as_deref()
            .map(parse_residue_list)
            .unwrap_or_default(),
        origin_residue: args.origin,
        esp_grid,
    };
    let outputs = generate_rays(&ctx.runner(), &ctx.rosetta(), &ctx.config.run, &request, &out_dir).await?;
    ctx.emit(&outputs)
}

async fn dock(args: DockArgs, ctx: &Context) -> Result<()> {
    let ligand = match args.ligand {
        Some(name) => name,
        None => args
            .params_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive the ligand name; pass --ligand")?,
    };
    let request = DockRequest {
        protein: args.protein,
        ligand,
        params_dir: args.params_dir,
        ray_dir: args.ray_dir,
        esp_grid: args.grid,
        search_conformers: !args.no_conformer_search,
        minimize_output: !args.no_minimize,
    };
    let result = dock_ligand(&ctx.runner(), &ctx.rosetta(), &ctx.config.run, &request).await?;
    ctx.emit_value(&result, || {
        for pose in &result.poses {
            println!("{}\t{}", result.ligand, pose.display());
        }
    })
}

async fn convert_format(args: ConvertFormatArgs, ctx: &Context) -> Result<()> {
    let format: MoleculeFormat = args.to.parse()?;
    let outputs = darcflow_protocols::convert_molecule(
        &ctx.runner(),
        &ctx.config.openbabel.executable,
        &args.input,
        format,
        &out_dir(args.out_dir),
    )
    .await?;
    ctx.emit(&outputs)
}

fn scores(args: ScoresArgs, ctx: &Context) -> Result<()> {
    let table = ScoreTable::read(&args.score_file)?;
    ctx.emit_value(&table, || {
        println!("{}\tdescription", table.columns.join("\t"));
        for row in &table.rows {
            println!("{}\t{}", row.values.join("\t"), row.description);
        }
    })
}

fn check_install(ctx: &Context) -> Result<()> {
    let mut problems = ctx.config.validate();
    let gpu = ctx.config.run.gpu_device().is_some();
    for program in ctx.rosetta().missing_programs(gpu) {
        problems.push(format!("program not found: {}", program.display()));
    }

    if problems.is_empty() {
        println!("Installation looks usable ({})", ctx.config.rosetta.home.display());
        return Ok(());
    }
    for problem in &problems {
        println!("- {problem}");
    }
    bail!("{} installation problems", problems.len())
}
