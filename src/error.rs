use thiserror::Error;

use crate::enums::AxisPlane;
use crate::volume_loader::VolumeLoaderError;

/// Failure of a single slicing request. The volume stays usable.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error("Plane points are collinear or coincident")]
    DegeneratePlane,

    #[error("Slice {index} is outside the {plane} range 0..{dim}")]
    IndexOutOfRange {
        plane: AxisPlane,
        index: usize,
        dim: usize,
    },

    #[error("No volume loaded")]
    NotInitialized,

    #[error("Failed to load volume: {0}")]
    Load(#[from] VolumeLoaderError),
}

pub type Result<T> = std::result::Result<T, SliceError>;
