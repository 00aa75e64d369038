//! Oriented-plane slicing.
//!
//! The cutting plane is given by three voxel-space points. The plane is
//! clipped to the volume box, the clipped polygon is bounded in the plane's
//! own 2D frame, and that rectangle is resampled on a square raster with
//! nearest-voxel lookup.

use glam::{DVec2, DVec3};
use image::GrayAlphaImage;
use rayon::prelude::*;

use crate::error::SliceError;
use crate::geometry::{
    LocalFrame, bbox_2d, box_plane_intersections, plane_from_points, rotate_vector,
};
use crate::volume::Volume;

/// Result of an oriented slice.
///
/// `texture` and `alpha` are `width * width` bytes, row-major. `vertices`
/// are the voxel-space corners of the sampled rectangle, ordered top-left,
/// top-right, bottom-left, bottom-right.
#[derive(Clone, Debug, PartialEq)]
pub struct OrientedSlice {
    pub vertices: [[f64; 3]; 4],
    pub alpha: Vec<u8>,
    pub texture: Vec<u8>,
    pub width: usize,
}

impl OrientedSlice {
    /// Fully transparent slice, used when the plane misses the volume.
    pub fn empty(width: usize) -> Self {
        Self {
            vertices: [[0.0; 3]; 4],
            alpha: vec![0; width * width],
            texture: vec![0; width * width],
            width,
        }
    }

    /// True when no pixel falls inside the volume.
    pub fn is_empty(&self) -> bool {
        self.alpha.iter().all(|&a| a == 0)
    }

    /// Luminance plus alpha, interleaved.
    pub fn to_image(&self) -> Option<GrayAlphaImage> {
        let pixels = self
            .texture
            .iter()
            .zip(&self.alpha)
            .flat_map(|(&luma, &alpha)| [luma, alpha])
            .collect();
        GrayAlphaImage::from_raw(self.width as u32, self.width as u32, pixels)
    }
}

pub(crate) struct Resampler<'a> {
    volume: &'a Volume,
    dims: [usize; 3],
}

impl<'a> Resampler<'a> {
    pub(crate) fn new(volume: &'a Volume) -> Self {
        let (nx, ny, nz) = volume.dim();
        Self {
            volume,
            dims: [nx, ny, nz],
        }
    }

    pub(crate) fn slice(&self, points: [DVec3; 3], distance: f64) -> Result<OrientedSlice, SliceError> {
        let [a, b, c] = points;
        let plane = plane_from_points(a, b, c)
            .ok_or(SliceError::DegeneratePlane)?
            .translated(distance);
        let frame = LocalFrame::new(a, b, plane.normal).ok_or(SliceError::DegeneratePlane)?;
        let local_z = plane.origin_distance();
        let width = self.volume.max_dim();

        let footprint: Vec<DVec2> = box_plane_intersections(self.volume.dim(), &plane)
            .into_iter()
            .map(|p| frame.to_local(p).truncate())
            .collect();
        let Some(bbox) = bbox_2d(&footprint) else {
            return Ok(OrientedSlice::empty(width));
        };

        let vertices = bbox
            .corners()
            .map(|corner| frame.to_world(corner.extend(local_z)).to_array());

        let normalized = self.volume.normalized_slice();
        let rotation = frame.local_to_world;
        let (step_x, step_y) = (bbox.width() / width as f64, bbox.height() / width as f64);

        let mut texture = vec![0u8; width * width];
        let mut alpha = vec![0u8; width * width];
        texture
            .par_chunks_mut(width)
            .zip(alpha.par_chunks_mut(width))
            .enumerate()
            .for_each(|(y, (texture_row, alpha_row))| {
                let local_y = (y as f64 + 0.5) * step_y + bbox.min.y;
                for x in 0..width {
                    let local_x = (x as f64 + 0.5) * step_x + bbox.min.x;
                    let p = rotate_vector(&rotation, [local_x, local_y, local_z]);
                    if let Some(offset) = self.nearest(p) {
                        alpha_row[x] = 255;
                        texture_row[x] = normalized[offset];
                    }
                }
            });

        Ok(OrientedSlice {
            vertices,
            alpha,
            texture,
            width,
        })
    }

    /// Linear offset of the voxel nearest to `p`, if `p` is inside the volume.
    #[inline]
    fn nearest(&self, p: [f64; 3]) -> Option<usize> {
        let mut voxel = [0usize; 3];
        for axis in 0..3 {
            let v = p[axis];
            let dim = self.dims[axis];
            if !(v >= 0.0 && v < dim as f64) {
                return None;
            }
            voxel[axis] = (v.round() as usize).min(dim - 1);
        }
        Some(self.volume.linear_index(voxel[0], voxel[1], voxel[2]))
    }
}
