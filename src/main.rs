use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use glam::DVec3;
use nifti_slicer::{
    AxisPlane, AxisSlice, OrientedSlice, OrthoViewer, RequestKind, SliceError, SlicePresenter,
    SlicerWorker, VolumeHeader,
};

#[derive(Parser)]
#[command(name = "nifti-slicer")]
#[command(version, about = "Slice a NIfTI volume into PNG images")]
struct Cli {
    /// Input .nii or .nii.gz file
    input: PathBuf,

    /// Directory the PNG slices are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Sagittal slice index (defaults to the middle)
    #[arg(long)]
    yz: Option<usize>,

    /// Coronal slice index (defaults to the middle)
    #[arg(long)]
    xz: Option<usize>,

    /// Axial slice index (defaults to the middle)
    #[arg(long)]
    xy: Option<usize>,

    /// Three world-space points `x,y,z` defining an oriented plane
    #[arg(long, num_args = 3, value_parser = parse_point, allow_hyphen_values = true)]
    points: Option<Vec<DVec3>>,

    /// Offset of the oriented plane along its normal
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    distance: f64,
}

fn parse_point(s: &str) -> Result<DVec3, String> {
    let coords: Vec<f64> = s
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("{c:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match coords[..] {
        [x, y, z] => Ok(DVec3::new(x, y, z)),
        _ => Err(format!("expected x,y,z, got {s:?}")),
    }
}

/// Writes every slice it receives as a PNG.
struct PngWriter {
    out_dir: PathBuf,
    written: Vec<PathBuf>,
    failed: bool,
}

impl PngWriter {
    fn save(&mut self, name: String, result: image::ImageResult<()>) {
        let path = self.out_dir.join(name);
        match result {
            Ok(()) => self.written.push(path),
            Err(err) => {
                log::error!("failed to write {}: {err}", path.display());
                self.failed = true;
            }
        }
    }
}

impl SlicePresenter for PngWriter {
    fn initialized(&mut self, dims: (usize, usize, usize), header: &VolumeHeader) {
        log::info!(
            "volume {}x{}x{}, datatype {}, sform {}",
            dims.0,
            dims.1,
            dims.2,
            header.datatype_code,
            header.sform_code
        );
    }

    fn axis_slice(&mut self, slice: AxisSlice) {
        let name = format!("{}_{:04}.png", slice.plane, slice.index);
        let Some(image) = slice.to_image() else {
            log::error!("{} slice has an unexpected size", slice.plane);
            return;
        };
        let result = image.save(self.out_dir.join(&name));
        self.save(name, result);
    }

    fn oriented_slice(&mut self, _points: [DVec3; 3], slice: OrientedSlice) {
        if slice.is_empty() {
            log::warn!("oriented plane does not cross the volume");
        }
        let Some(image) = slice.to_image() else {
            log::error!("oriented slice has an unexpected size");
            return;
        };
        let name = "oriented.png".to_string();
        let result = image.save(self.out_dir.join(&name));
        self.save(name, result);
    }

    fn failed(&mut self, kind: RequestKind, error: SliceError) {
        log::error!("{kind:?} failed: {error}");
        self.failed = true;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    let worker = SlicerWorker::spawn().context("spawning slicer worker")?;
    let mut viewer = OrthoViewer::new(
        worker,
        PngWriter {
            out_dir: cli.out_dir.clone(),
            written: Vec::new(),
            failed: false,
        },
    );

    viewer.load(bytes);
    viewer.run_until_idle().await;
    if viewer.dims().is_none() {
        bail!("{} could not be loaded", cli.input.display());
    }

    for (plane, index) in [
        (AxisPlane::Yz, cli.yz),
        (AxisPlane::Xz, cli.xz),
        (AxisPlane::Xy, cli.xy),
    ] {
        if let Some(index) = index {
            viewer.slice(plane, index);
        }
    }
    if let Some(points) = &cli.points {
        viewer.slice_plane([points[0], points[1], points[2]], cli.distance);
    }
    viewer.run_until_idle().await;

    let writer = viewer.into_presenter();
    for path in &writer.written {
        println!("{}", path.display());
    }
    if writer.failed {
        bail!("some slices could not be produced");
    }
    Ok(())
}
