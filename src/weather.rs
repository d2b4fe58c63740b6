//! Weather suitability evaluation.
//!
//! A window is suitable only if every forecast sample touching it satisfies
//! every supplied threshold. Missing data fails closed: an uncovered stretch
//! yields [`Suitability::ForecastUnavailable`], never a pass.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::{
    InfeasibilityReason, TimeWindow, WeatherFeed, WeatherForecastPoint, WeatherThresholds,
};

/// The weather limit a sample broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Threshold {
    MinTemperature,
    MaxTemperature,
    MaxWindSpeed,
    MaxPrecipitation,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MinTemperature => "min_temperature",
            Self::MaxTemperature => "max_temperature",
            Self::MaxWindSpeed => "max_wind_speed",
            Self::MaxPrecipitation => "max_precipitation",
        };
        f.write_str(name)
    }
}

/// One sample breaking one threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdViolation {
    /// Validity period of the offending sample.
    pub sample: TimeWindow,
    pub threshold: Threshold,
    pub limit: f64,
    pub observed: f64,
}

impl fmt::Display for ThresholdViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} breaks {} (limit {})",
            self.sample.start.to_rfc3339(),
            self.observed,
            self.threshold,
            self.limit
        )
    }
}

/// Verdict for one window.
#[derive(Debug, Clone, PartialEq)]
pub enum Suitability {
    Suitable,
    /// At least one sample breaks a threshold.
    Unsuitable(Vec<ThresholdViolation>),
    /// No violation seen, but these parts of the window have no data.
    ForecastUnavailable(Vec<TimeWindow>),
}

impl Suitability {
    pub fn is_suitable(&self) -> bool {
        matches!(self, Self::Suitable)
    }

    /// The matching infeasibility reason, if not suitable.
    pub fn reason(&self) -> Option<InfeasibilityReason> {
        match self {
            Self::Suitable => None,
            Self::Unsuitable(_) => Some(InfeasibilityReason::WeatherUnsuitable),
            Self::ForecastUnavailable(_) => Some(InfeasibilityReason::ForecastUnavailable),
        }
    }

    /// End of the latest violating sample. Any window of the same length
    /// starting earlier still overlaps it.
    pub fn clear_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unsuitable(violations) => violations.iter().map(|v| v.sample.end).max(),
            _ => None,
        }
    }

    /// Human-readable details for result notes.
    pub fn describe(&self) -> Vec<String> {
        match self {
            Self::Suitable => Vec::new(),
            Self::Unsuitable(violations) => violations.iter().map(ToString::to_string).collect(),
            Self::ForecastUnavailable(gaps) => gaps
                .iter()
                .map(|g| {
                    format!(
                        "no forecast from {} to {}",
                        g.start.to_rfc3339(),
                        g.end.to_rfc3339()
                    )
                })
                .collect(),
        }
    }
}

/// Judges `window` against `thresholds` using `feed`.
///
/// Violations take precedence over gaps: a window with a known bad sample
/// is `Unsuitable` even if it also has holes in the data.
pub fn evaluate<F: WeatherFeed + ?Sized>(
    thresholds: &WeatherThresholds,
    window: &TimeWindow,
    feed: &F,
) -> Suitability {
    if thresholds.is_empty() || window.is_empty() {
        return Suitability::Suitable;
    }

    let resolution = feed.resolution();
    let mut violations = Vec::new();
    let mut gaps = Vec::new();
    let mut covered_until = window.start;

    for point in feed.samples(window) {
        if point.timestamp > covered_until {
            gaps.push(TimeWindow::new(covered_until, point.timestamp.min(window.end)));
        }
        let sample = TimeWindow::starting_at(point.timestamp, resolution);
        check_point(thresholds, point, sample, &mut violations);
        covered_until = covered_until.max(sample.end);
    }
    if covered_until < window.end {
        gaps.push(TimeWindow::new(covered_until, window.end));
    }

    if !violations.is_empty() {
        Suitability::Unsuitable(violations)
    } else if !gaps.is_empty() {
        Suitability::ForecastUnavailable(gaps)
    } else {
        Suitability::Suitable
    }
}

// Comparisons are written so that a NaN reading counts as a violation.
fn check_point(
    thresholds: &WeatherThresholds,
    point: &WeatherForecastPoint,
    sample: TimeWindow,
    out: &mut Vec<ThresholdViolation>,
) {
    let mut flag = |threshold, limit: f64, observed: f64, ok: bool| {
        if !ok {
            out.push(ThresholdViolation {
                sample,
                threshold,
                limit,
                observed,
            });
        }
    };

    if let Some(min) = thresholds.min_temperature {
        flag(Threshold::MinTemperature, min, point.temperature, point.temperature >= min);
    }
    if let Some(max) = thresholds.max_temperature {
        flag(Threshold::MaxTemperature, max, point.temperature, point.temperature <= max);
    }
    if let Some(max) = thresholds.max_wind_speed {
        flag(Threshold::MaxWindSpeed, max, point.wind_speed, point.wind_speed <= max);
    }
    if let Some(max) = thresholds.max_precipitation {
        flag(Threshold::MaxPrecipitation, max, point.precipitation, point.precipitation <= max);
    }
}
