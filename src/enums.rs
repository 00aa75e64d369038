use std::fmt;

/// One of the three canonical slicing planes, named by the two axes it spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisPlane {
    /// Sagittal: fixed x, spans (y, z)
    Yz,
    /// Coronal: fixed y, spans (x, z)
    Xz,
    /// Axial: fixed z, spans (x, y)
    Xy,
}

impl AxisPlane {
    pub const ALL: [AxisPlane; 3] = [AxisPlane::Yz, AxisPlane::Xz, AxisPlane::Xy];

    /// Index of the axis held fixed by this plane (0 = x, 1 = y, 2 = z).
    pub fn axis(self) -> usize {
        match self {
            AxisPlane::Yz => 0,
            AxisPlane::Xz => 1,
            AxisPlane::Xy => 2,
        }
    }

    /// Output raster size `(cols, rows)` for volume dimensions `(nx, ny, nz)`.
    pub fn raster_dim(self, dims: (usize, usize, usize)) -> (usize, usize) {
        let (nx, ny, nz) = dims;
        match self {
            AxisPlane::Yz => (ny, nz),
            AxisPlane::Xz => (nx, nz),
            AxisPlane::Xy => (nx, ny),
        }
    }

    /// Corners of the display quad in voxel space, ordered
    /// top-left, top-right, bottom-left, bottom-right.
    pub fn quad_vertices(self, dims: (usize, usize, usize)) -> [[f64; 3]; 4] {
        let (nx, ny, nz) = (dims.0 as f64, dims.1 as f64, dims.2 as f64);
        match self {
            AxisPlane::Xy => [
                [0.0, ny, 0.0],
                [nx, ny, 0.0],
                [0.0, 0.0, 0.0],
                [nx, 0.0, 0.0],
            ],
            AxisPlane::Xz => [
                [0.0, 0.0, nz],
                [nx, 0.0, nz],
                [0.0, 0.0, 0.0],
                [nx, 0.0, 0.0],
            ],
            AxisPlane::Yz => [
                [0.0, 0.0, nz],
                [0.0, ny, nz],
                [0.0, 0.0, 0.0],
                [0.0, ny, 0.0],
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AxisPlane::Yz => "yz",
            AxisPlane::Xz => "xz",
            AxisPlane::Xy => "xy",
        }
    }
}

impl fmt::Display for AxisPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric element kinds a volume can be stored as, keyed by their NIfTI-1
/// datatype code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Uint8,
    Int16,
    Int32,
    Float32,
    Float64,
    Int8,
    Uint16,
    Uint32,
}

impl DataType {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            2 => Some(DataType::Uint8),
            4 => Some(DataType::Int16),
            8 => Some(DataType::Int32),
            16 => Some(DataType::Float32),
            64 => Some(DataType::Float64),
            256 => Some(DataType::Int8),
            512 => Some(DataType::Uint16),
            768 => Some(DataType::Uint32),
            _ => None,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            DataType::Uint8 => 2,
            DataType::Int16 => 4,
            DataType::Int32 => 8,
            DataType::Float32 => 16,
            DataType::Float64 => 64,
            DataType::Int8 => 256,
            DataType::Uint16 => 512,
            DataType::Uint32 => 768,
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }
}
