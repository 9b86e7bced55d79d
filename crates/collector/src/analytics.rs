//! Pressure deltas and barometric tendency.
//!
//! Each horizon is matched by time, not by index, so missed or late
//! collection cycles shift which point is used rather than silently
//! comparing against the wrong hour.

use chrono::{DateTime, Duration, Utc};
use common::config::AnalyticsConfig;
use common::{PressureAnalysis, PressurePoint, Trend, DELTA_HORIZONS_HOURS};
use serde::Serialize;
use tracing::info;

/// What one horizon looked for and what it found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonAudit {
    pub hours: i64,
    pub target: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PressureAnalyzer {
    tolerance: Duration,
    trend_threshold_mb: f64,
}

impl PressureAnalyzer {
    /// `tolerance` should stay under half the sampling interval so adjacent
    /// cycles can never both qualify for the same horizon.
    pub fn new(tolerance: Duration, trend_threshold_mb: f64) -> Self {
        Self {
            tolerance,
            trend_threshold_mb,
        }
    }

    pub fn from_config(cfg: &AnalyticsConfig) -> Self {
        Self::new(
            Duration::minutes(cfg.delta_tolerance_mins),
            cfg.trend_threshold_mb,
        )
    }

    /// Closest point to `target` within tolerance, searching `past` from
    /// newest to oldest. On equal distance the newer point is kept.
    pub fn find_match<'a>(
        &self,
        past: &'a [PressurePoint],
        target: DateTime<Utc>,
    ) -> Option<&'a PressurePoint> {
        let mut best: Option<&PressurePoint> = None;
        let mut best_diff = self.tolerance + Duration::seconds(1);

        for p in past.iter().rev() {
            let diff = (p.timestamp - target).abs();
            if diff <= self.tolerance && diff < best_diff {
                best_diff = diff;
                best = Some(p);
            }

            // Ascending order: everything further back is further away.
            if target - p.timestamp > self.tolerance {
                break;
            }
        }

        best
    }

    /// Tendency from the 3-hour delta alone.
    pub fn classify_trend(&self, delta_3h: Option<f64>) -> Trend {
        match delta_3h {
            None => Trend::Unknown,
            Some(d) if d > self.trend_threshold_mb => Trend::Rising,
            Some(d) if d < -self.trend_threshold_mb => Trend::Falling,
            Some(_) => Trend::Stable,
        }
    }

    /// Analysis plus per-horizon audit. The last point of `history` is the
    /// current reading; the rest are candidates.
    pub fn analyze_with_audit(
        &self,
        history: &[PressurePoint],
    ) -> (PressureAnalysis, Vec<HorizonAudit>) {
        let mut analysis = PressureAnalysis::default();

        let Some((current, past)) = history.split_last() else {
            return (analysis, Vec::new());
        };
        analysis.timestamp = Some(current.timestamp);
        if past.is_empty() {
            return (analysis, Vec::new());
        }

        let mut audit = Vec::with_capacity(DELTA_HORIZONS_HOURS.len());
        for hours in DELTA_HORIZONS_HOURS {
            let target = current.timestamp - Duration::hours(hours);
            let matched = self.find_match(past, target);
            let delta = matched.map(|p| current.pressure_mb - p.pressure_mb);

            analysis.set_delta(hours, delta);
            audit.push(HorizonAudit {
                hours,
                target,
                found: matched.map(|p| p.timestamp),
                delta,
            });
        }

        analysis.trend = self.classify_trend(analysis.delta_3h);
        (analysis, audit)
    }

    /// Analyze and emit the audit as a diagnostics event.
    pub fn analyze(&self, location_id: &str, history: &[PressurePoint]) -> PressureAnalysis {
        let (analysis, audit) = self.analyze_with_audit(history);

        if let Some(current) = analysis.timestamp.filter(|_| !audit.is_empty()) {
            let audit_json = serde_json::to_string(&audit).unwrap_or_default();
            info!(
                location = location_id,
                current_time = %current.to_rfc3339(),
                trend = %analysis.trend,
                analysis = %audit_json,
                "pressure analysis diagnostics"
            );
        }

        analysis
    }
}

impl Default for PressureAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}
