//! Electrostatic grid generation with AutoGrid.

use darcflow_common::{DarcError, Result, StepOutputs};
use darcflow_grid::{
    agd_path_for, convert_emap_to_agd, write_gpf, ConvertOptions, EmapHeader, GpfSpec, GridGeometry,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::runner::{Invocation, ToolRunner};

/// Box placement for a grid run.
#[derive(Debug, Clone, Copy)]
pub struct GridBox {
    pub center: [f64; 3],
    pub radius: f64,
    pub spacing: f64,
}

/// Write the GPF for `receptor`, run AutoGrid in `work_dir` and convert the
/// electrostatic map it produces to AGD.
pub async fn generate_grid(
    runner: &ToolRunner,
    autogrid: &Path,
    receptor: &Path,
    grid_box: &GridBox,
    work_dir: &Path,
) -> Result<StepOutputs> {
    fs::create_dir_all(work_dir)?;
    let spec = GpfSpec::for_receptor(receptor, grid_box.center, grid_box.radius, grid_box.spacing)?;
    let name = spec.receptor_name();
    let gpf = work_dir.join(format!("{name}.gpf"));
    let glg = work_dir.join(format!("{name}.glg"));
    write_gpf(&spec, &gpf)?;

    info!("Running AutoGrid for {} ({} points per axis)", name, spec.points);
    runner
        .run(
            &Invocation::new(autogrid)
                .arg("-p")
                .arg(&gpf)
                .arg("-l")
                .arg(&glg)
                .current_dir(work_dir),
        )
        .await?;

    let emap = work_dir.join(spec.elecmap_name());
    DarcError::require(&emap)?;
    let geometry = GridGeometry::from_header(&EmapHeader::read(&emap)?)?;
    let agd = agd_path_for(&emap, None);
    convert_emap_to_agd(&emap, &agd, &geometry, &ConvertOptions::default())?;

    Ok(StepOutputs::new()
        .with("gpfFile", gpf)
        .with("outputEMap", emap)
        .with("outputGRID_AGD", agd))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::fake_tool;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_generate_grid_with_fake_autogrid() {
        let bin = tempdir().unwrap();
        // A 2x2x2 map (NELEMENTS 1 1 1) named after the elecmap line of the GPF.
        let autogrid = fake_tool(
            bin.path(),
            "autogrid4",
            r#"map=$(awk '$1 == "elecmap" { print $2 }' "$2")
cat > "$map" <<EOF
GRID_PARAMETER_FILE $2
MACROMOLECULE 1abc.pdbqt
SPACING 0.375
NELEMENTS 1 1 1
CENTER 1.0 2.0 3.0
0.1
0.2
0.3
0.4
0.5
0.6
0.7
0.8
EOF
echo done > "$4""#,
        );

        let data = tempdir().unwrap();
        let receptor = data.path().join("1abc.pdbqt");
        fs::write(
            &receptor,
            "ATOM      1  N   MET A   1      27.340  24.430   2.614  1.00  9.67    -0.079 N \n",
        )
        .unwrap();
        let work = data.path().join("grid");
        let grid_box = GridBox {
            center: [1.0, 2.0, 3.0],
            radius: 5.0,
            spacing: 0.375,
        };

        let outputs = generate_grid(&ToolRunner::new(), &autogrid, &receptor, &grid_box, &work)
            .await
            .unwrap();

        let agd = fs::read_to_string(outputs.get("outputGRID_AGD").unwrap()).unwrap();
        assert!(agd.contains("Dim: 2 2 2\n"));
        assert!(agd.ends_with("0.8\n"));
        assert_eq!(outputs.get("gpfFile"), Some(work.join("1abc.gpf").as_path()));
        assert!(work.join("1abc.glg").exists());
    }
}
