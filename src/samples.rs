//! Typed voxel storage and intensity normalization.
//!
//! Volumes arrive as raw bytes plus a datatype code. [`Samples`] keeps them in
//! their declared element type, and [`Samples::normalize`] stretches them into
//! the `0..=255` display range with one generic routine for every kind.

use rayon::prelude::*;

use crate::enums::DataType;

/// Byte order of the raw sample buffer handed over by a decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// A numeric voxel type which can be compared in double precision.
pub trait Sample: bytemuck::Pod + Send + Sync {
    fn to_f64(self) -> f64;
    fn swap_bytes(self) -> Self;
}

macro_rules! int_sample {
    ($($t:ty),*) => {$(
        impl Sample for $t {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn swap_bytes(self) -> Self {
                <$t>::swap_bytes(self)
            }
        }
    )*};
}

int_sample!(u8, i8, u16, i16, u32, i32);

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn swap_bytes(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

impl Sample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn swap_bytes(self) -> Self {
        f64::from_bits(self.to_bits().swap_bytes())
    }
}

/// Global intensity extrema of a volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityRange {
    pub min: f64,
    pub max: f64,
}

impl IntensityRange {
    /// True when the stretch `(v - min) / (max - min)` is undefined.
    pub fn is_constant(&self) -> bool {
        !(self.max > self.min)
    }
}

/// Raw voxel values in the element type declared by the source file.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Uint8(Vec<u8>),
    Int8(Vec<i8>),
    Uint16(Vec<u16>),
    Int16(Vec<i16>),
    Uint32(Vec<u32>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! dispatch {
    ($samples:expr, $values:ident => $body:expr) => {
        match $samples {
            Samples::Uint8($values) => $body,
            Samples::Int8($values) => $body,
            Samples::Uint16($values) => $body,
            Samples::Int16($values) => $body,
            Samples::Uint32($values) => $body,
            Samples::Int32($values) => $body,
            Samples::Float32($values) => $body,
            Samples::Float64($values) => $body,
        }
    };
}

impl Samples {
    /// Decode the first `count` elements of `bytes` as `data_type`.
    ///
    /// Returns `None` if `bytes` holds fewer than `count` elements.
    pub fn from_bytes(
        bytes: &[u8],
        data_type: DataType,
        count: usize,
        byte_order: ByteOrder,
    ) -> Option<Self> {
        let len = count.checked_mul(data_type.size())?;
        let bytes = bytes.get(..len)?;
        let samples = match data_type {
            DataType::Uint8 => Samples::Uint8(decode(bytes, byte_order)),
            DataType::Int8 => Samples::Int8(decode(bytes, byte_order)),
            DataType::Uint16 => Samples::Uint16(decode(bytes, byte_order)),
            DataType::Int16 => Samples::Int16(decode(bytes, byte_order)),
            DataType::Uint32 => Samples::Uint32(decode(bytes, byte_order)),
            DataType::Int32 => Samples::Int32(decode(bytes, byte_order)),
            DataType::Float32 => Samples::Float32(decode(bytes, byte_order)),
            DataType::Float64 => Samples::Float64(decode(bytes, byte_order)),
        };
        Some(samples)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Samples::Uint8(_) => DataType::Uint8,
            Samples::Int8(_) => DataType::Int8,
            Samples::Uint16(_) => DataType::Uint16,
            Samples::Int16(_) => DataType::Int16,
            Samples::Uint32(_) => DataType::Uint32,
            Samples::Int32(_) => DataType::Int32,
            Samples::Float32(_) => DataType::Float32,
            Samples::Float64(_) => DataType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a linear offset, widened to `f64`.
    pub fn get_f64(&self, offset: usize) -> Option<f64> {
        dispatch!(self, values => values.get(offset).map(|v| v.to_f64()))
    }

    pub fn range(&self) -> IntensityRange {
        dispatch!(self, values => intensity_range(values))
    }

    /// Min-max stretch of every sample into `0..=255`.
    ///
    /// A constant volume maps to all zeros.
    pub fn normalize(&self) -> (Vec<u8>, IntensityRange) {
        dispatch!(self, values => {
            let range = intensity_range(values);
            (stretch(values, range), range)
        })
    }
}

fn decode<T: Sample>(bytes: &[u8], byte_order: ByteOrder) -> Vec<T> {
    let swap = byte_order != ByteOrder::native();
    bytes
        .par_chunks_exact(std::mem::size_of::<T>())
        .map(|chunk| {
            let value: T = bytemuck::pod_read_unaligned(chunk);
            if swap { value.swap_bytes() } else { value }
        })
        .collect()
}

/// NaN samples are ignored.
pub(crate) fn intensity_range<T: Sample>(values: &[T]) -> IntensityRange {
    let (min, max) = values
        .par_iter()
        .map(|v| v.to_f64())
        .filter(|v| !v.is_nan())
        .fold(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), v| (min.min(v), max.max(v)),
        )
        .reduce(
            || (f64::INFINITY, f64::NEG_INFINITY),
            |a, b| (a.0.min(b.0), a.1.max(b.1)),
        );
    IntensityRange { min, max }
}

pub(crate) fn stretch<T: Sample>(values: &[T], range: IntensityRange) -> Vec<u8> {
    if range.is_constant() {
        return vec![0; values.len()];
    }
    let span = range.max - range.min;
    values
        .par_iter()
        .map(|v| ((v.to_f64() - range.min) * 255.0 / span).round() as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_little_and_big_endian() {
        let le = [0x01, 0x02, 0x03, 0x04];
        let samples = Samples::from_bytes(&le, DataType::Uint16, 2, ByteOrder::Little).unwrap();
        assert_eq!(samples, Samples::Uint16(vec![0x0201, 0x0403]));

        let samples = Samples::from_bytes(&le, DataType::Uint16, 2, ByteOrder::Big).unwrap();
        assert_eq!(samples, Samples::Uint16(vec![0x0102, 0x0304]));
    }

    #[test]
    fn decodes_big_endian_floats() {
        let bytes = 1.5f32.to_be_bytes();
        let samples = Samples::from_bytes(&bytes, DataType::Float32, 1, ByteOrder::Big).unwrap();
        assert_eq!(samples, Samples::Float32(vec![1.5]));
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(Samples::from_bytes(&[0, 0, 0], DataType::Int16, 2, ByteOrder::Little).is_none());
    }

    #[test]
    fn extra_bytes_are_ignored() {
        let samples = Samples::from_bytes(&[1, 2, 3, 4], DataType::Uint8, 2, ByteOrder::Little).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn normalize_stretches_to_full_range() {
        let samples = Samples::Int16(vec![-100, 0, 100]);
        let (normalized, range) = samples.normalize();
        assert_eq!(range, IntensityRange { min: -100.0, max: 100.0 });
        assert_eq!(normalized, vec![0, 128, 255]);
    }

    #[test]
    fn constant_volume_maps_to_zero() {
        let samples = Samples::Float32(vec![7.0; 8]);
        let (normalized, range) = samples.normalize();
        assert!(range.is_constant());
        assert_eq!(normalized, vec![0; 8]);
    }

    #[test]
    fn nan_samples_do_not_poison_extrema() {
        let samples = Samples::Float64(vec![f64::NAN, 2.0, 4.0]);
        let (normalized, range) = samples.normalize();
        assert_eq!(range, IntensityRange { min: 2.0, max: 4.0 });
        assert_eq!(normalized, vec![0, 0, 255]);
    }

    #[test]
    fn stretch_rounds_exact_halves_up() {
        for lo in -300i32..0 {
            for hi in (1i32..300).step_by(7) {
                let values: Vec<i32> = (lo..=hi).collect();
                let range = IntensityRange {
                    min: lo as f64,
                    max: hi as f64,
                };
                let stretched = stretch(&values, range);
                for (&v, &got) in values.iter().zip(&stretched) {
                    let expected =
                        ((v as f64 - lo as f64) * 255.0 / (hi as f64 - lo as f64)).round() as u8;
                    assert_eq!(got, expected, "v={v} in [{lo}, {hi}]");
                }
            }
        }
        // (-118 + 300) * 255 / 364 is exactly 127.5
        let stretched = stretch(&[-300i32, -118, 64], IntensityRange { min: -300.0, max: 64.0 });
        assert_eq!(stretched, vec![0, 128, 255]);
    }

    proptest! {
        #[test]
        fn normalized_extrema_hit_0_and_255(values in prop::collection::vec(any::<i32>(), 2..256)) {
            let samples = Samples::Int32(values.clone());
            let (normalized, range) = samples.normalize();
            prop_assert_eq!(normalized.len(), values.len());
            if !range.is_constant() {
                let min_at = values.iter().position(|&v| v as f64 == range.min).unwrap();
                let max_at = values.iter().position(|&v| v as f64 == range.max).unwrap();
                prop_assert_eq!(normalized[min_at], 0);
                prop_assert_eq!(normalized[max_at], 255);
            } else {
                prop_assert!(normalized.iter().all(|&v| v == 0));
            }
        }
    }
}
