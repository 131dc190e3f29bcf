use std::fmt;

use crate::{DiagnosisError, Result};

/// Closed fault taxonomy. Raw class indices with no entry in the table
/// map to `Unknown` rather than silently defaulting to a healthy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultLabel {
    CompressorNormal,
    CompressorOverload,
    CompressorBearingWear,
    CompressorValveFault,
    FanNormal,
    FanImbalance,
    FanBearingWear,
    RefrigerantNormal,
    RefrigerantLow,
    RefrigerantLeak,
    VibrationMount,
    ElectricalNoise,
    Unknown(i64),
}

/// Canonical class ordering used by the trained models.
pub const CANONICAL_LABELS: [FaultLabel; 12] = [
    FaultLabel::CompressorNormal,
    FaultLabel::CompressorOverload,
    FaultLabel::CompressorBearingWear,
    FaultLabel::CompressorValveFault,
    FaultLabel::FanNormal,
    FaultLabel::FanImbalance,
    FaultLabel::FanBearingWear,
    FaultLabel::RefrigerantNormal,
    FaultLabel::RefrigerantLow,
    FaultLabel::RefrigerantLeak,
    FaultLabel::VibrationMount,
    FaultLabel::ElectricalNoise,
];

impl FaultLabel {
    pub fn from_key(key: &str) -> Option<Self> {
        let label = match key {
            "compressor_normal" => FaultLabel::CompressorNormal,
            "compressor_overload" => FaultLabel::CompressorOverload,
            "compressor_bearing_wear" => FaultLabel::CompressorBearingWear,
            "compressor_valve_fault" => FaultLabel::CompressorValveFault,
            "fan_normal" => FaultLabel::FanNormal,
            "fan_imbalance" => FaultLabel::FanImbalance,
            "fan_bearing_wear" => FaultLabel::FanBearingWear,
            "refrigerant_normal" => FaultLabel::RefrigerantNormal,
            "refrigerant_low" => FaultLabel::RefrigerantLow,
            "refrigerant_leak" => FaultLabel::RefrigerantLeak,
            "vibration_mount" => FaultLabel::VibrationMount,
            "electrical_noise" => FaultLabel::ElectricalNoise,
            _ => return None,
        };
        Some(label)
    }

    pub fn key(&self) -> String {
        match self {
            FaultLabel::CompressorNormal => "compressor_normal".into(),
            FaultLabel::CompressorOverload => "compressor_overload".into(),
            FaultLabel::CompressorBearingWear => "compressor_bearing_wear".into(),
            FaultLabel::CompressorValveFault => "compressor_valve_fault".into(),
            FaultLabel::FanNormal => "fan_normal".into(),
            FaultLabel::FanImbalance => "fan_imbalance".into(),
            FaultLabel::FanBearingWear => "fan_bearing_wear".into(),
            FaultLabel::RefrigerantNormal => "refrigerant_normal".into(),
            FaultLabel::RefrigerantLow => "refrigerant_low".into(),
            FaultLabel::RefrigerantLeak => "refrigerant_leak".into(),
            FaultLabel::VibrationMount => "vibration_mount".into(),
            FaultLabel::ElectricalNoise => "electrical_noise".into(),
            FaultLabel::Unknown(idx) => format!("unknown_class_{}", idx),
        }
    }

    /// Human-readable description for reports and alerts.
    pub fn description(&self) -> &'static str {
        match self {
            FaultLabel::CompressorNormal => "Normal compressor operation",
            FaultLabel::CompressorOverload => "Compressor overload",
            FaultLabel::CompressorBearingWear => "Compressor bearing wear",
            FaultLabel::CompressorValveFault => "Compressor valve fault",
            FaultLabel::FanNormal => "Normal fan operation",
            FaultLabel::FanImbalance => "Fan imbalance",
            FaultLabel::FanBearingWear => "Fan bearing wear",
            FaultLabel::RefrigerantNormal => "Normal refrigerant flow",
            FaultLabel::RefrigerantLow => "Low refrigerant",
            FaultLabel::RefrigerantLeak => "Refrigerant leak",
            FaultLabel::VibrationMount => "Mount vibration",
            FaultLabel::ElectricalNoise => "Electrical noise",
            FaultLabel::Unknown(_) => "Unrecognized fault class",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FaultLabel::Unknown(_))
    }
}

impl fmt::Display for FaultLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl serde::Serialize for FaultLabel {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

/// Bidirectional index <-> label lookup, validated at load time.
#[derive(Debug, Clone)]
pub struct LabelTable {
    entries: Vec<FaultLabel>,
}

impl LabelTable {
    /// The canonical 12-class table.
    pub fn builtin() -> Self {
        Self {
            entries: CANONICAL_LABELS.to_vec(),
        }
    }

    /// Build from persisted label keys (index order). Unrecognized or
    /// duplicated keys are load errors, not runtime surprises.
    pub fn from_keys(keys: &[String]) -> Result<Self> {
        if keys.is_empty() {
            return Err(DiagnosisError::ModelLoad("empty label table".into()));
        }

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let label = FaultLabel::from_key(key).ok_or_else(|| {
                DiagnosisError::ModelLoad(format!("unrecognized label key: {}", key))
            })?;
            if entries.contains(&label) {
                return Err(DiagnosisError::ModelLoad(format!(
                    "duplicate label key: {}",
                    key
                )));
            }
            entries.push(label);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a raw class index to its label; out-of-table indices become
    /// `Unknown(index)`.
    pub fn label_for(&self, index: i64) -> FaultLabel {
        if index >= 0 {
            if let Some(label) = self.entries.get(index as usize) {
                return *label;
            }
        }
        FaultLabel::Unknown(index)
    }

    pub fn index_of(&self, label: FaultLabel) -> Option<usize> {
        self.entries.iter().position(|&l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_index_maps_to_explicit_unknown() {
        let table = LabelTable::builtin();
        let label = table.label_for(99);
        assert_eq!(label, FaultLabel::Unknown(99));
        assert_eq!(label.key(), "unknown_class_99");
        assert!(label.is_unknown());
    }

    #[test]
    fn negative_index_is_unknown_too() {
        let table = LabelTable::builtin();
        assert!(table.label_for(-1).is_unknown());
    }

    #[test]
    fn builtin_table_round_trips() {
        let table = LabelTable::builtin();
        for (idx, label) in CANONICAL_LABELS.iter().enumerate() {
            assert_eq!(table.label_for(idx as i64), *label);
            assert_eq!(table.index_of(*label), Some(idx));
            assert_eq!(FaultLabel::from_key(&label.key()), Some(*label));
        }
    }

    #[test]
    fn duplicate_keys_rejected() {
        let keys = vec!["compressor_normal".to_string(), "compressor_normal".to_string()];
        assert!(LabelTable::from_keys(&keys).is_err());
    }

    #[test]
    fn unrecognized_key_rejected() {
        let keys = vec!["compressor_normal".to_string(), "warp_core_breach".to_string()];
        assert!(LabelTable::from_keys(&keys).is_err());
    }
}
