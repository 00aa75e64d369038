#![allow(dead_code)]

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Single-file little-endian NIfTI-1 image holding `data` as `datatype`.
pub fn nifti_bytes(
    dims: (usize, usize, usize),
    datatype: i16,
    bitpix: i16,
    data: &[u8],
    sform: Option<[[f32; 4]; 3]>,
) -> Vec<u8> {
    let mut header = [0u8; 348];
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    let dim: [i16; 8] = [3, dims.0 as i16, dims.1 as i16, dims.2 as i16, 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        header[40 + i * 2..42 + i * 2].copy_from_slice(&d.to_le_bytes());
    }
    header[70..72].copy_from_slice(&datatype.to_le_bytes());
    header[72..74].copy_from_slice(&bitpix.to_le_bytes());

    let pixdim: [f32; 8] = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
    for (i, p) in pixdim.iter().enumerate() {
        header[76 + i * 4..80 + i * 4].copy_from_slice(&p.to_le_bytes());
    }
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());

    if let Some(rows) = sform {
        header[254..256].copy_from_slice(&1i16.to_le_bytes());
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                let offset = 280 + r * 16 + c * 4;
                header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
    }
    header[344..348].copy_from_slice(b"n+1\0");

    let mut bytes = Vec::with_capacity(352 + data.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&[0u8; 4]);
    bytes.extend_from_slice(data);
    bytes
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// `value(x, y, z)` for every voxel, x fastest.
pub fn voxels<T>(dims: (usize, usize, usize), value: impl Fn(usize, usize, usize) -> T) -> Vec<T> {
    let mut out = Vec::with_capacity(dims.0 * dims.1 * dims.2);
    for z in 0..dims.2 {
        for y in 0..dims.1 {
            for x in 0..dims.0 {
                out.push(value(x, y, z));
            }
        }
    }
    out
}
