// src/waveform/mod.rs
mod index;

pub use index::{FrozenIndex, WaveformIndex};
pub(crate) use index::validate_name;

use crate::error::{PdwError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Sample-count constraints imposed by the instrument's waveform memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentLimits {
    pub min_length: usize,
    pub granularity: usize,
}

impl Default for InstrumentLimits {
    fn default() -> Self {
        InstrumentLimits {
            min_length: 60,
            granularity: 2,
        }
    }
}

/// A named IQ waveform ready for download
///
/// Samples are normalized to the range [-1, 1]. The sample vectors can not be
/// changed once the waveform is constructed.
///
/// # Example
///
/// ```
/// use pdw_rs::waveform::{InstrumentLimits, Waveform};
///
/// let i = vec![0.5; 64];
/// let q = vec![0.0; 64];
/// let wfm = Waveform::new("TONE", i, q, &InstrumentLimits::default()).unwrap();
///
/// assert_eq!(wfm.len(), 64);
/// assert_eq!(wfm.to_iq_bytes().len(), 64 * 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    name: String,
    i: Vec<f64>,
    q: Vec<f64>,
}

impl Waveform {
    pub const FULL_SCALE: f64 = 32767.0;

    pub fn new(name: impl Into<String>, i: Vec<f64>, q: Vec<f64>, limits: &InstrumentLimits) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| PdwError::InvalidWaveform { name: name.clone(), reason };

        if name.is_empty() {
            return Err(invalid("name must not be empty".into()));
        }
        if i.len() != q.len() {
            return Err(invalid(format!("I has {} samples but Q has {}", i.len(), q.len())));
        }
        if i.len() < limits.min_length {
            return Err(invalid(format!(
                "{} samples is below the instrument minimum of {}",
                i.len(),
                limits.min_length
            )));
        }
        if limits.granularity > 1 && i.len() % limits.granularity != 0 {
            return Err(invalid(format!(
                "{} samples is not a multiple of the granularity {}",
                i.len(),
                limits.granularity
            )));
        }
        if i.iter().chain(q.iter()).any(|s| !s.is_finite()) {
            return Err(invalid("samples must be finite".into()));
        }

        Ok(Waveform { name, i, q })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn i(&self) -> &[f64] {
        &self.i
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn len(&self) -> usize {
        self.i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i.is_empty()
    }

    /// Interleaved big-endian i16 IQ pairs, clamped to full scale
    pub fn to_iq_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.len() * 4);
        for (&i, &q) in self.i.iter().zip(self.q.iter()) {
            buffer.put_i16(scale_sample(i));
            buffer.put_i16(scale_sample(q));
        }
        buffer.freeze()
    }
}

fn scale_sample(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * Waveform::FULL_SCALE).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> InstrumentLimits {
        InstrumentLimits {
            min_length: 4,
            granularity: 2,
        }
    }

    #[test]
    fn test_waveform_validation() {
        assert!(Waveform::new("ok", vec![0.0; 4], vec![0.0; 4], &limits()).is_ok());

        let err = Waveform::new("short", vec![0.0; 2], vec![0.0; 2], &limits()).unwrap_err();
        assert!(matches!(err, PdwError::InvalidWaveform { ref name, .. } if name == "short"));

        assert!(Waveform::new("odd", vec![0.0; 5], vec![0.0; 5], &limits()).is_err());
        assert!(Waveform::new("mismatch", vec![0.0; 4], vec![0.0; 6], &limits()).is_err());
        assert!(Waveform::new("nan", vec![f64::NAN; 4], vec![0.0; 4], &limits()).is_err());
        assert!(Waveform::new("", vec![0.0; 4], vec![0.0; 4], &limits()).is_err());
    }

    #[test]
    fn test_iq_encoding() {
        let wfm = Waveform::new("iq", vec![1.0, -1.0, 0.5, 2.0], vec![0.0, 0.0, -0.5, -3.0], &limits()).unwrap();
        let bytes = wfm.to_iq_bytes();

        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &[0x7F, 0xFF, 0x00, 0x00]);
        assert_eq!(&bytes[4..6], &(-32767i16).to_be_bytes());
        assert_eq!(&bytes[8..10], &16384i16.to_be_bytes());
        assert_eq!(&bytes[12..14], &32767i16.to_be_bytes());
        assert_eq!(&bytes[14..16], &(-32767i16).to_be_bytes());
    }
}
