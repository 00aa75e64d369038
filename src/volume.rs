use crate::enums::AxisPlane;
use crate::error::SliceError;
use crate::resampler::{OrientedSlice, Resampler};
use crate::samples::{IntensityRange, Samples};
use crate::volume_loader::VolumeHeader;

use glam::DVec3;
use image::GrayImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

/// A scalar volume ready for display slicing.
///
/// Samples are laid out x fastest, then y, then z, so `normalized` is indexed
/// `[z, y, x]`. The volume is immutable once built.
#[derive(Clone, Debug)]
pub struct Volume {
    header: VolumeHeader,
    samples: Samples,
    normalized: Array3<u8>,
    range: IntensityRange,
}

/// One axis-aligned slice, row-major with the top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxisSlice {
    pub plane: AxisPlane,
    pub index: usize,
    pub cols: usize,
    pub rows: usize,
    pub data: Vec<u8>,
}

impl AxisSlice {
    /// Position of the slice quad along the fixed axis (voxel centre).
    pub fn offset(&self) -> f64 {
        self.index as f64 + 0.5
    }

    pub fn to_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.cols as u32, self.rows as u32, self.data.clone())
    }
}

impl Volume {
    /// `samples` must hold exactly `nx * ny * nz` values.
    pub(crate) fn new(header: VolumeHeader, samples: Samples) -> Self {
        let (nx, ny, nz) = header.dims;
        let (normalized, range) = samples.normalize();
        if range.is_constant() {
            log::warn!(
                "constant volume (min = max = {}), normalized samples set to 0",
                range.min
            );
        }
        let normalized = Array3::from_shape_vec((nz, ny, nx), normalized)
            .expect("sample count matches volume dimensions");
        log::info!(
            "loaded {nx}x{ny}x{nz} volume ({:?}), intensity range [{}, {}]",
            samples.data_type(),
            range.min,
            range.max
        );
        Self {
            header,
            samples,
            normalized,
            range,
        }
    }

    /// Get the dimensions of the volume (nx, ny, nz)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.header.dims
    }

    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Raw samples in their source element type
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Normalized display bytes indexed `[z, y, x]`
    pub fn normalized(&self) -> &Array3<u8> {
        &self.normalized
    }

    /// Normalized display bytes in linear order
    pub fn normalized_slice(&self) -> &[u8] {
        self.normalized
            .as_slice()
            .expect("normalized volume is built in standard layout")
    }

    pub fn range(&self) -> IntensityRange {
        self.range
    }

    /// True when every sample holds the same value.
    pub fn is_constant(&self) -> bool {
        self.range.is_constant()
    }

    /// Side of the square raster used for oriented slices
    pub fn max_dim(&self) -> usize {
        let (nx, ny, nz) = self.dim();
        nx.max(ny).max(nz)
    }

    #[inline]
    pub fn linear_index(&self, col: usize, row: usize, slice: usize) -> usize {
        let (nx, ny, _) = self.dim();
        nx * ny * slice + nx * row + col
    }

    /// View of the normalized slice, shaped `(rows, cols)`.
    ///
    /// `index` must lie in `[0, dim)` for the fixed axis.
    pub fn get_slice_from_axis(&self, index: usize, plane: AxisPlane) -> ArrayView2<'_, u8> {
        match plane {
            AxisPlane::Xy => self.normalized.slice(s![index, .., ..]),
            AxisPlane::Xz => self.normalized.slice(s![.., index, ..]),
            AxisPlane::Yz => self.normalized.slice(s![.., .., index]),
        }
    }

    /// Extract the normalized slice at `index` on `plane`.
    ///
    /// # Panics
    ///
    /// If `index` is outside the fixed axis; callers clamp first.
    pub fn slice(&self, plane: AxisPlane, index: usize) -> AxisSlice {
        let (cols, rows) = plane.raster_dim(self.dim());
        let data = self.get_slice_from_axis(index, plane).iter().copied().collect();
        AxisSlice {
            plane,
            index,
            cols,
            rows,
            data,
        }
    }

    /// Resample the volume on the plane through `points`, shifted by
    /// `distance` along its normal.
    pub fn slice_oriented(
        &self,
        points: [DVec3; 3],
        distance: f64,
    ) -> Result<OrientedSlice, SliceError> {
        Resampler::new(self).slice(points, distance)
    }
}
