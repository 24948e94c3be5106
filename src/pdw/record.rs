// src/pdw/record.rs
use crate::error::{PdwError, Result};
use crate::pdw::layout::Field;
use crate::types::{MarkerMask, Operation, PhaseMode, RfState, TimeOffset, WfmMarkerMask};

const CONTROL_CONTINUOUS_PHASE: u64 = 1 << 0;
const CONTROL_RF_OFF: u64 = 1 << 1;

/// One playback instruction (Pulse Descriptor Word)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdwRecord {
    pub operation: Operation,
    pub time_offset: TimeOffset,
    /// Hz
    pub frequency: f64,
    /// Degrees
    pub phase: f32,
    /// dBm
    pub power: f32,
    pub markers: MarkerMask,
    pub phase_mode: PhaseMode,
    pub rf: RfState,
    pub waveform_index: u32,
    pub wfm_markers: WfmMarkerMask,
}

impl Default for PdwRecord {
    fn default() -> Self {
        PdwRecord::new(Operation::Continue, TimeOffset::ZERO, 0)
    }
}

impl PdwRecord {
    pub fn new(operation: Operation, time_offset: TimeOffset, waveform_index: u32) -> Self {
        PdwRecord {
            operation,
            time_offset,
            frequency: 0.0,
            phase: 0.0,
            power: 0.0,
            markers: MarkerMask::empty(),
            phase_mode: PhaseMode::default(),
            rf: RfState::default(),
            waveform_index,
            wfm_markers: WfmMarkerMask::empty(),
        }
    }

    pub fn with_frequency(mut self, hz: f64) -> Self {
        self.frequency = hz;
        self
    }

    pub fn with_phase(mut self, degrees: f32) -> Self {
        self.phase = degrees;
        self
    }

    pub fn with_power(mut self, dbm: f32) -> Self {
        self.power = dbm;
        self
    }

    pub fn with_markers(mut self, markers: MarkerMask) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_phase_mode(mut self, mode: PhaseMode) -> Self {
        self.phase_mode = mode;
        self
    }

    pub fn with_rf(mut self, rf: RfState) -> Self {
        self.rf = rf;
        self
    }

    pub fn with_wfm_markers(mut self, markers: WfmMarkerMask) -> Self {
        self.wfm_markers = markers;
        self
    }

    /// Physical parameters must be finite to survive encoding unchanged
    pub(crate) fn check_values(&self, position: usize) -> Result<()> {
        let finite = self.frequency.is_finite() && self.phase.is_finite() && self.power.is_finite();
        if !finite {
            return Err(PdwError::InvalidParameter(format!(
                "record {} has a non-finite frequency, phase or power",
                position
            )));
        }
        Ok(())
    }

    pub(crate) fn raw_field(&self, field: Field) -> u64 {
        match field {
            Field::Operation => self.operation.code() as u64,
            Field::Controls => {
                let mut controls = 0;
                if self.phase_mode == PhaseMode::Continuous {
                    controls |= CONTROL_CONTINUOUS_PHASE;
                }
                if self.rf == RfState::Off {
                    controls |= CONTROL_RF_OFF;
                }
                controls
            }
            Field::Markers => self.markers.bits() as u64,
            Field::WaveformIndex => self.waveform_index as u64,
            Field::TimeOffset => self.time_offset.as_picos(),
            Field::Frequency => self.frequency.to_bits(),
            Field::Phase => self.phase.to_bits() as u64,
            Field::Power => self.power.to_bits() as u64,
            Field::WfmMarkers => self.wfm_markers.bits() as u64,
            Field::Reserved => 0,
        }
    }

    pub(crate) fn set_raw_field(&mut self, field: Field, raw: u64) -> Result<()> {
        let invalid = |what: &str| PdwError::MalformedFile(format!("invalid {} value 0x{:X}", what, raw));

        match field {
            Field::Operation => {
                self.operation = Operation::from_u8(raw as u8).ok_or_else(|| invalid("operation"))?;
            }
            Field::Controls => {
                if raw & !(CONTROL_CONTINUOUS_PHASE | CONTROL_RF_OFF) != 0 {
                    return Err(invalid("control flags"));
                }
                self.phase_mode = if raw & CONTROL_CONTINUOUS_PHASE != 0 {
                    PhaseMode::Continuous
                } else {
                    PhaseMode::Coherent
                };
                self.rf = if raw & CONTROL_RF_OFF != 0 { RfState::Off } else { RfState::On };
            }
            Field::Markers => {
                self.markers = MarkerMask::from_bits(raw as u16).ok_or_else(|| invalid("marker mask"))?;
            }
            Field::WaveformIndex => self.waveform_index = raw as u32,
            Field::TimeOffset => self.time_offset = TimeOffset::from_picos(raw),
            Field::Frequency => self.frequency = f64::from_bits(raw),
            Field::Phase => self.phase = f32::from_bits(raw as u32),
            Field::Power => self.power = f32::from_bits(raw as u32),
            Field::WfmMarkers => {
                self.wfm_markers = WfmMarkerMask::from_bits(raw as u8).ok_or_else(|| invalid("waveform marker mask"))?;
            }
            Field::Reserved => {
                if raw != 0 {
                    return Err(invalid("reserved bytes"));
                }
            }
        }
        Ok(())
    }
}
