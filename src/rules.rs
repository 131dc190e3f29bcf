use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::RefrigerantFeatures;

/// Ordinal severity attached to a diagnosis verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Normal,
    Attention,
    Urgent,
    Critical,
}

/// Graded refrigerant-charge assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefrigerantLevel {
    Normal,
    SlightlyLow,
    Low,
    VeryLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Critical,
}

/// One severity-tagged line of scoring rationale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn new(severity: Severity, message: String) -> Self {
        Self { severity, message }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Ok => "ok",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingPerformance {
    Excellent,
    Good,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressorTemperature {
    Normal,
    Warm,
    Hot,
    VeryHot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrostFormation {
    None,
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclingFrequency {
    Normal,
    Frequent,
    Continuous,
}

/// Technician-entered signals from the site visit, combined additively
/// with the audio-derived score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldObservation {
    pub cooling_performance: CoolingPerformance,
    pub compressor_temperature: CompressorTemperature,
    pub frost_formation: FrostFormation,
    pub cycling_frequency: CyclingFrequency,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Default for FieldObservation {
    fn default() -> Self {
        Self {
            cooling_performance: CoolingPerformance::Good,
            compressor_temperature: CompressorTemperature::Normal,
            frost_formation: FrostFormation::None,
            cycling_frequency: CyclingFrequency::Normal,
            notes: None,
        }
    }
}

/// One scoring tier: crossing `threshold` contributes `points`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tier {
    pub threshold: f64,
    pub points: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldPoints {
    pub poor_cooling: u32,
    pub hot_compressor: u32,
    pub frost: u32,
    pub frequent_cycling: u32,
}

impl Default for FieldPoints {
    fn default() -> Self {
        Self {
            poor_cooling: 20,
            hot_compressor: 15,
            frost: 10,
            frequent_cycling: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Breakpoints {
    pub urgent: u32,
    pub attention: u32,
    pub monitor: u32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            urgent: 70,
            attention: 50,
            monitor: 30,
        }
    }
}

/// All rule-scorer weights and breakpoints. The defaults reproduce the
/// empirically tuned values the scorer shipped with; they have no
/// documented derivation, so treat them as a starting point and
/// recalibrate against labeled recordings when available.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Low-band energy ratio tiers, descending; value must exceed the
    /// threshold to score.
    pub low_band: [Tier; 3],
    /// Flow-peak frequency tiers, ascending; value must fall below the
    /// threshold to score.
    pub flow_peak: [Tier; 3],
    pub high_band: [Tier; 2],
    pub rms: [Tier; 2],
    pub field: FieldPoints,
    pub breakpoints: Breakpoints,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            low_band: [
                Tier { threshold: 0.28, points: 40 },
                Tier { threshold: 0.18, points: 25 },
                Tier { threshold: 0.12, points: 10 },
            ],
            flow_peak: [
                Tier { threshold: 300.0, points: 30 },
                Tier { threshold: 500.0, points: 20 },
                Tier { threshold: 700.0, points: 5 },
            ],
            high_band: [
                Tier { threshold: 0.20, points: 20 },
                Tier { threshold: 0.12, points: 10 },
            ],
            rms: [
                Tier { threshold: 0.050, points: 15 },
                Tier { threshold: 0.030, points: 8 },
            ],
            field: FieldPoints::default(),
            breakpoints: Breakpoints::default(),
        }
    }
}

impl Breakpoints {
    pub(crate) fn grade(&self, total: u32) -> (RefrigerantLevel, UrgencyTier, f32, &'static str) {
        if total >= self.urgent {
            (
                RefrigerantLevel::VeryLow,
                UrgencyTier::Urgent,
                0.9,
                "Stop the unit immediately, recharge refrigerant and inspect for leaks",
            )
        } else if total >= self.attention {
            (
                RefrigerantLevel::Low,
                UrgencyTier::Attention,
                0.8,
                "Check refrigerant charge and look for leaks; top up as soon as possible",
            )
        } else if total >= self.monitor {
            (
                RefrigerantLevel::SlightlyLow,
                UrgencyTier::Attention,
                0.7,
                "Schedule a refrigerant-level check and keep monitoring performance",
            )
        } else {
            (
                RefrigerantLevel::Normal,
                UrgencyTier::Normal,
                0.6,
                "Maintain current operation and continue routine inspections",
            )
        }
    }
}

/// Diagnosis result handed to UI, notification and report sinks.
/// Immutable; created once per invocation and never persisted here.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisVerdict {
    pub refrigerant_level: RefrigerantLevel,
    pub urgency: UrgencyTier,
    pub confidence: f32,
    pub recommended_action: String,
    pub total_score: u32,
    pub breakdown: Vec<Finding>,
}

/// Weighted-threshold scorer for refrigerant shortage. A pure function
/// of its inputs: same features and observations always produce the
/// same verdict.
pub struct RuleScorer {
    config: RuleConfig,
}

impl Default for RuleScorer {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

impl RuleScorer {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        features: &RefrigerantFeatures,
        observations: Option<&FieldObservation>,
    ) -> DiagnosisVerdict {
        let mut points: u32 = 0;
        let mut breakdown = Vec::new();

        // Low-band energy: compressor mechanical load.
        let low = features.low_band_energy;
        let tiers = &self.config.low_band;
        if low > tiers[0].threshold {
            points += tiers[0].points;
            breakdown.push(Finding::new(
                Severity::Critical,
                format!("high low-band energy ({:.3}) - suspected compressor overload", low),
            ));
        } else if low > tiers[1].threshold {
            points += tiers[1].points;
            breakdown.push(Finding::new(
                Severity::Warning,
                format!("elevated low-band energy ({:.3}) - load is rising", low),
            ));
        } else if low > tiers[2].threshold {
            points += tiers[2].points;
            breakdown.push(Finding::new(
                Severity::Info,
                format!("slightly raised low-band energy ({:.3}) - upper normal range", low),
            ));
        } else {
            breakdown.push(Finding::new(
                Severity::Ok,
                format!("low-band energy normal ({:.3})", low),
            ));
        }

        // Flow peak: refrigerant circulation tone drops as charge falls.
        let flow = features.flow_peak_hz;
        let tiers = &self.config.flow_peak;
        if flow < tiers[0].threshold {
            points += tiers[0].points;
            breakdown.push(Finding::new(
                Severity::Critical,
                format!("flow tone down at {:.0} Hz - refrigerant shortage likely", flow),
            ));
        } else if flow < tiers[1].threshold {
            points += tiers[1].points;
            breakdown.push(Finding::new(
                Severity::Warning,
                format!("reduced refrigerant flow ({:.0} Hz)", flow),
            ));
        } else if flow < tiers[2].threshold {
            points += tiers[2].points;
            breakdown.push(Finding::new(
                Severity::Info,
                format!("slightly low flow tone ({:.0} Hz)", flow),
            ));
        } else {
            breakdown.push(Finding::new(
                Severity::Ok,
                format!("refrigerant flow normal ({:.0} Hz)", flow),
            ));
        }

        // High-band noise: system stress.
        let high = features.high_band_energy;
        let tiers = &self.config.high_band;
        if high > tiers[0].threshold {
            points += tiers[0].points;
            breakdown.push(Finding::new(
                Severity::Critical,
                format!("high system noise ({:.3}) - stressed operation", high),
            ));
        } else if high > tiers[1].threshold {
            points += tiers[1].points;
            breakdown.push(Finding::new(
                Severity::Warning,
                format!("elevated noise level ({:.3})", high),
            ));
        } else {
            breakdown.push(Finding::new(
                Severity::Ok,
                format!("noise level normal ({:.3})", high),
            ));
        }

        // RMS: overall vibration.
        let rms = features.rms;
        let tiers = &self.config.rms;
        if rms > tiers[0].threshold {
            points += tiers[0].points;
            breakdown.push(Finding::new(
                Severity::Critical,
                format!("high vibration level ({:.3}) - system under load", rms),
            ));
        } else if rms > tiers[1].threshold {
            points += tiers[1].points;
            breakdown.push(Finding::new(
                Severity::Warning,
                format!("elevated vibration ({:.3})", rms),
            ));
        } else {
            breakdown.push(Finding::new(
                Severity::Ok,
                format!("vibration level normal ({:.3})", rms),
            ));
        }

        if let Some(obs) = observations {
            points += self.score_observations(obs, &mut breakdown);
        }

        let total_score = points.min(100);
        let (refrigerant_level, urgency, confidence, action) =
            self.config.breakpoints.grade(total_score);

        DiagnosisVerdict {
            refrigerant_level,
            urgency,
            confidence,
            recommended_action: action.to_string(),
            total_score,
            breakdown,
        }
    }

    fn score_observations(&self, obs: &FieldObservation, breakdown: &mut Vec<Finding>) -> u32 {
        let mut points = 0;

        if matches!(
            obs.cooling_performance,
            CoolingPerformance::Poor | CoolingPerformance::VeryPoor
        ) {
            points += self.config.field.poor_cooling;
            breakdown.push(Finding::new(
                Severity::Critical,
                "field check: degraded cooling performance".into(),
            ));
        }

        if matches!(
            obs.compressor_temperature,
            CompressorTemperature::Hot | CompressorTemperature::VeryHot
        ) {
            points += self.config.field.hot_compressor;
            breakdown.push(Finding::new(
                Severity::Critical,
                "field check: compressor running hot".into(),
            ));
        }

        if matches!(
            obs.frost_formation,
            FrostFormation::Moderate | FrostFormation::Heavy
        ) {
            points += self.config.field.frost;
            breakdown.push(Finding::new(
                Severity::Warning,
                "field check: excessive frost on the evaporator".into(),
            ));
        }

        if obs.cycling_frequency == CyclingFrequency::Frequent {
            points += self.config.field.frequent_cycling;
            breakdown.push(Finding::new(
                Severity::Warning,
                "field check: frequent compressor cycling".into(),
            ));
        }

        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(low: f64, flow: f64, high: f64, rms: f64) -> RefrigerantFeatures {
        RefrigerantFeatures {
            low_band_energy: low,
            flow_peak_hz: flow,
            high_band_energy: high,
            harmonic_distortion: 0.05,
            rms,
            crest_factor: 1.4,
            spectral_centroid: 600.0,
            spectral_rolloff: 2000.0,
        }
    }

    #[test]
    fn score_rises_monotonically_with_low_band_energy() {
        let scorer = RuleScorer::default();

        let mut previous_score = 0;
        let mut previous_urgency = UrgencyTier::Normal;
        for low in [0.10, 0.20, 0.30] {
            let verdict = scorer.score(&features(low, 800.0, 0.05, 0.01), None);
            assert!(
                verdict.total_score >= previous_score,
                "score dropped at low-band {}",
                low
            );
            assert!(verdict.urgency >= previous_urgency);
            previous_score = verdict.total_score;
            previous_urgency = verdict.urgency;
        }
    }

    #[test]
    fn urgent_breakpoint_is_inclusive() {
        let breakpoints = Breakpoints::default();

        let (level, urgency, _, _) = breakpoints.grade(70);
        assert_eq!(level, RefrigerantLevel::VeryLow);
        assert_eq!(urgency, UrgencyTier::Urgent);

        let (_, urgency, _, _) = breakpoints.grade(69);
        assert_ne!(urgency, UrgencyTier::Urgent);
    }

    #[test]
    fn audio_and_field_scores_reach_urgent() {
        let scorer = RuleScorer::default();
        // 40 (low band) + 30 (flow) = 70 exactly.
        let verdict = scorer.score(&features(0.30, 250.0, 0.05, 0.01), None);
        assert_eq!(verdict.total_score, 70);
        assert_eq!(verdict.urgency, UrgencyTier::Urgent);
        assert_eq!(verdict.refrigerant_level, RefrigerantLevel::VeryLow);
        assert!((verdict.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn field_observations_add_points() {
        let scorer = RuleScorer::default();
        let audio = features(0.20, 600.0, 0.05, 0.01);

        let without = scorer.score(&audio, None);

        let obs = FieldObservation {
            cooling_performance: CoolingPerformance::Poor,
            compressor_temperature: CompressorTemperature::Hot,
            frost_formation: FrostFormation::Heavy,
            cycling_frequency: CyclingFrequency::Frequent,
            notes: None,
        };
        let with = scorer.score(&audio, Some(&obs));

        assert_eq!(with.total_score, without.total_score + 55);
    }

    #[test]
    fn total_score_caps_at_one_hundred() {
        let scorer = RuleScorer::default();
        let obs = FieldObservation {
            cooling_performance: CoolingPerformance::VeryPoor,
            compressor_temperature: CompressorTemperature::VeryHot,
            frost_formation: FrostFormation::Heavy,
            cycling_frequency: CyclingFrequency::Frequent,
            notes: None,
        };
        let verdict = scorer.score(&features(0.45, 150.0, 0.30, 0.08), Some(&obs));
        assert_eq!(verdict.total_score, 100);
    }

    #[test]
    fn healthy_unit_scores_normal() {
        let scorer = RuleScorer::default();
        let verdict = scorer.score(&features(0.08, 850.0, 0.04, 0.012), None);

        assert_eq!(verdict.total_score, 0);
        assert_eq!(verdict.refrigerant_level, RefrigerantLevel::Normal);
        assert_eq!(verdict.urgency, UrgencyTier::Normal);
        assert!(verdict.breakdown.iter().all(|f| f.severity == Severity::Ok));
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = RuleScorer::default();
        let audio = features(0.22, 450.0, 0.15, 0.04);
        let obs = FieldObservation::default();

        let a = scorer.score(&audio, Some(&obs));
        let b = scorer.score(&audio, Some(&obs));

        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.urgency, b.urgency);
        assert_eq!(a.breakdown, b.breakdown);
    }

    #[test]
    fn every_audio_quantity_yields_a_finding() {
        let scorer = RuleScorer::default();
        let verdict = scorer.score(&features(0.08, 850.0, 0.04, 0.012), None);
        assert_eq!(verdict.breakdown.len(), 4);
    }
}
