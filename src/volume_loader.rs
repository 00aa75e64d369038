use crate::{
    enums::DataType,
    samples::{ByteOrder, Samples},
    volume::Volume,
};

use flate2::read::GzDecoder;
use glam::{DMat4, DVec3};
use nifti::{InMemNiftiObject, NiftiObject};
use std::{
    fs,
    io::{Cursor, Read},
    path::Path,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Input is not a NIfTI volume")]
    NotAVolume,

    #[error("Unsupported datatype code {0}")]
    UnsupportedDatatype(i16),

    #[error("Invalid volume dimensions {0:?}")]
    InvalidDimensions((usize, usize, usize)),

    #[error("Sample buffer too short: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

/// Header fields the slicer needs from the source format.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeHeader {
    /// Voxel counts `(nx, ny, nz)`
    pub dims: (usize, usize, usize),
    /// Row-major voxel to world transform
    pub affine: [[f64; 4]; 4],
    /// `pixdim` as stored, index 0 being `qfac`
    pub pixel_dims: [f64; 8],
    pub sform_code: i16,
    pub datatype_code: i16,
}

impl VolumeHeader {
    /// True when `affine` should place the volume in world space.
    pub fn has_sform(&self) -> bool {
        self.sform_code > 0
    }

    /// Voxel to world transform used for display: the affine when the sform
    /// is set, otherwise a scale by the voxel size.
    pub fn display_transform(&self) -> DMat4 {
        if self.has_sform() {
            DMat4::from_cols_array_2d(&self.affine).transpose()
        } else {
            DMat4::from_scale(DVec3::new(
                self.pixel_dims[1],
                self.pixel_dims[2],
                self.pixel_dims[3],
            ))
        }
    }
}

/// A decoded but not yet interpreted volume.
#[derive(Clone, Debug)]
pub struct RawVolume {
    pub header: VolumeHeader,
    pub data: Vec<u8>,
    pub byte_order: ByteOrder,
}

/// Byte-level file format decoding.
pub trait VolumeDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RawVolume, VolumeLoaderError>;
}

/// Decodes single-file NIfTI-1 (`.nii`), gzipped or not.
#[derive(Clone, Copy, Debug, Default)]
pub struct NiftiDecoder;

const NIFTI1_HEADER_SIZE: i32 = 348;

impl NiftiDecoder {
    fn is_gzip(bytes: &[u8]) -> bool {
        bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
    }

    /// `sizeof_hdr` must read 348 in one byte order or the other.
    fn is_nifti(bytes: &[u8]) -> bool {
        let Some(head) = bytes.get(..4) else {
            return false;
        };
        let head = [head[0], head[1], head[2], head[3]];
        i32::from_le_bytes(head) == NIFTI1_HEADER_SIZE
            || i32::from_be_bytes(head) == NIFTI1_HEADER_SIZE
    }

    fn inflate(bytes: &[u8]) -> Result<Vec<u8>, VolumeLoaderError> {
        let mut inflated = Vec::new();
        GzDecoder::new(Cursor::new(bytes)).read_to_end(&mut inflated)?;
        Ok(inflated)
    }

    fn header(header: &nifti::NiftiHeader) -> VolumeHeader {
        let row = |r: [f32; 4]| r.map(f64::from);
        // Axes past dim[0] are unused and may hold anything.
        let extent = |axis: usize| {
            if axis <= usize::from(header.dim[0]) {
                usize::from(header.dim[axis])
            } else {
                1
            }
        };
        VolumeHeader {
            dims: (extent(1), extent(2), extent(3)),
            affine: [
                row(header.srow_x),
                row(header.srow_y),
                row(header.srow_z),
                [0.0, 0.0, 0.0, 1.0],
            ],
            pixel_dims: header.pixdim.map(f64::from),
            sform_code: header.sform_code,
            datatype_code: header.datatype,
        }
    }
}

impl VolumeDecoder for NiftiDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RawVolume, VolumeLoaderError> {
        let inflated;
        let bytes = if Self::is_gzip(bytes) {
            inflated = Self::inflate(bytes)?;
            inflated.as_slice()
        } else {
            bytes
        };

        if !Self::is_nifti(bytes) {
            return Err(VolumeLoaderError::NotAVolume);
        }

        let object = InMemNiftiObject::from_reader(Cursor::new(bytes))?;
        let header = Self::header(object.header());
        let byte_order = match object.header().endianness {
            nifti::Endianness::Little => ByteOrder::Little,
            nifti::Endianness::Big => ByteOrder::Big,
        };
        let data = object.into_volume().into_raw_data();

        Ok(RawVolume {
            header,
            data,
            byte_order,
        })
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Build a volume from a decoded header and its raw sample bytes.
    ///
    /// # Errors
    ///
    /// Fails if the datatype is not one of the eight supported numeric kinds,
    /// if any dimension is zero, or if `raw` holds fewer samples than the
    /// dimensions require. Extra trailing samples (further time points of a
    /// 4D file) are ignored.
    pub fn load(raw: RawVolume) -> Result<Volume, VolumeLoaderError> {
        let RawVolume {
            header,
            data,
            byte_order,
        } = raw;

        let data_type = DataType::from_code(header.datatype_code)
            .ok_or(VolumeLoaderError::UnsupportedDatatype(header.datatype_code))?;

        let (nx, ny, nz) = header.dims;
        let invalid = VolumeLoaderError::InvalidDimensions(header.dims);
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(invalid);
        }
        let Some((count, expected)) = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .and_then(|count| Some((count, count.checked_mul(data_type.size())?)))
        else {
            return Err(invalid);
        };

        let samples = Samples::from_bytes(&data, data_type, count, byte_order).ok_or(
            VolumeLoaderError::SizeMismatch {
                expected,
                actual: data.len(),
            },
        )?;

        Ok(Volume::new(header, samples))
    }

    /// Decode `bytes` with `decoder` and build a volume from the result.
    pub fn load_with(
        decoder: &impl VolumeDecoder,
        bytes: &[u8],
    ) -> Result<Volume, VolumeLoaderError> {
        Self::load(decoder.decode(bytes)?)
    }

    /// Load a volume from in-memory `.nii` or `.nii.gz` bytes
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Volume, VolumeLoaderError> {
        Self::load_with(&NiftiDecoder, bytes)
    }

    /// Load a volume from a `.nii` or `.nii.gz` file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let bytes = fs::read(path.as_ref())?;
        Self::load_from_bytes(&bytes)
    }
}
