//! # NIfTI slicer
//!
//! This crate slices NIfTI-1 volumes for an interactive three-plane viewer
//! and resamples them along arbitrary oriented planes.
//!
//! A volume is decoded once, its samples are kept in their declared numeric
//! type and stretched into a `u8` display buffer using the global minimum and
//! maximum. From that buffer the crate extracts:
//!  - Axis-aligned slices on the `yz`, `xz` and `xy` planes
//!  - Oriented slices through any three points, clipped to the volume box
//!    and sampled with nearest-voxel lookup on a square raster
//!
//! Slicing runs on a dedicated worker thread. The viewer side talks to it
//! with [`Request`]/[`Response`] messages and moves buffers rather than
//! sharing them. Supported element types are the eight NIfTI integer and
//! floating point kinds (`int8` to `float64`); `.nii.gz` input is inflated
//! transparently.
//!
//! # Examples
//!
//! ## Slicing a volume directly
//!
//! ```no_run
//! # use nifti_slicer::{AxisPlane, VolumeLoader};
//! # use glam::DVec3;
//! let volume = VolumeLoader::load_from_file("brain.nii.gz")
//!     .expect("should have loaded the volume");
//! let axial = volume.slice(AxisPlane::Xy, volume.dim().2 / 2);
//! axial.to_image().unwrap().save("axial.png").unwrap();
//!
//! let oblique = volume
//!     .slice_oriented(
//!         [
//!             DVec3::new(50.0, 30.0, 10.0),
//!             DVec3::new(10.0, 10.0, 10.0),
//!             DVec3::new(20.0, 10.0, 20.0),
//!         ],
//!         0.0,
//!     )
//!     .expect("points should not be collinear");
//! oblique.to_image().unwrap().save("oblique.png").unwrap();
//! ```
//!
//! ## Going through the worker
//!
//! ```no_run
//! # use nifti_slicer::{AxisPlane, Request, Response, SlicerWorker};
//! let mut worker = SlicerWorker::spawn().unwrap();
//! worker.send(Request::Init(std::fs::read("brain.nii").unwrap()));
//! worker.send(Request::Slice { plane: AxisPlane::Yz, index: 40 });
//! while let Some(response) = worker.blocking_recv() {
//!     if let Response::Sliced { data, .. } = response {
//!         println!("{} bytes", data.len());
//!         break;
//!     }
//! }
//! ```

pub mod enums;
pub mod error;
pub mod geometry;
mod resampler;
pub mod samples;
pub mod viewer;
pub mod volume;
pub mod volume_loader;
pub mod worker;

pub use enums::{AxisPlane, DataType};
pub use error::SliceError;
pub use resampler::OrientedSlice;
pub use viewer::{OrthoViewer, RequestState, SlicePresenter};
pub use volume::{AxisSlice, Volume};
pub use volume_loader::{NiftiDecoder, VolumeDecoder, VolumeHeader, VolumeLoader, VolumeLoaderError};
pub use worker::{Request, RequestKind, Response, SlicerService, SlicerWorker};
