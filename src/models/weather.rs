//! Forecast data supplied by an external weather provider.
//!
//! The engine never produces forecasts; it only reads an ordered sequence of
//! samples. Each sample stands for the conditions over
//! `[timestamp, timestamp + resolution)`, where the resolution is the feed's
//! native granularity (hourly, three-hourly, daily).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// One forecast sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Air temperature (°C).
    pub temperature: f64,
    /// Relative humidity (%).
    pub humidity: f64,
    /// Precipitation (mm) over the sample period.
    pub precipitation: f64,
    /// Wind speed (km/h).
    pub wind_speed: f64,
}

impl WeatherForecastPoint {
    /// Creates a calm, dry sample at the given temperature.
    pub fn new(timestamp: DateTime<Utc>, temperature: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity: 50.0,
            precipitation: 0.0,
            wind_speed: 0.0,
        }
    }

    pub fn with_humidity(mut self, humidity: f64) -> Self {
        self.humidity = humidity;
        self
    }

    pub fn with_precipitation(mut self, mm: f64) -> Self {
        self.precipitation = mm;
        self
    }

    pub fn with_wind_speed(mut self, speed: f64) -> Self {
        self.wind_speed = speed;
        self
    }
}

/// Read access to forecast data.
pub trait WeatherFeed: Send + Sync {
    /// How long each sample stays valid.
    fn resolution(&self) -> Duration;

    /// Samples whose validity period intersects `window`, in time order.
    fn samples(&self, window: &TimeWindow) -> &[WeatherForecastPoint];
}

/// An in-memory, time-ordered forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    points: Vec<WeatherForecastPoint>,
    resolution_minutes: i64,
}

impl Forecast {
    /// Builds a forecast from samples in any order.
    ///
    /// Samples are sorted by timestamp; on duplicate timestamps the last
    /// one supplied wins.
    pub fn new(mut points: Vec<WeatherForecastPoint>, resolution: Duration) -> Self {
        points.reverse();
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self {
            points,
            resolution_minutes: resolution.num_minutes().max(1),
        }
    }

    /// An empty feed. Every weather-gated window is unknown.
    pub fn empty(resolution: Duration) -> Self {
        Self::new(Vec::new(), resolution)
    }

    /// `hours` consecutive hourly samples, each built from its timestamp.
    pub fn hourly(
        start: DateTime<Utc>,
        hours: usize,
        mut sample: impl FnMut(DateTime<Utc>) -> WeatherForecastPoint,
    ) -> Self {
        let points = (0..hours)
            .map(|i| sample(start + Duration::hours(i as i64)))
            .collect();
        Self::new(points, Duration::hours(1))
    }

    pub fn points(&self) -> &[WeatherForecastPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Start of the first sample and end of the last one.
    pub fn coverage(&self) -> Option<TimeWindow> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some(TimeWindow::new(first.timestamp, last.timestamp + self.resolution()))
    }
}

impl WeatherFeed for Forecast {
    fn resolution(&self) -> Duration {
        Duration::minutes(self.resolution_minutes)
    }

    fn samples(&self, window: &TimeWindow) -> &[WeatherForecastPoint] {
        // A sample at t covers [t, t + resolution), so it touches the window
        // iff window.start - resolution < t < window.end.
        let earliest = window.start - self.resolution();
        let lo = self.points.partition_point(|p| p.timestamp <= earliest);
        let hi = self.points.partition_point(|p| p.timestamp < window.end);
        &self.points[lo..hi.max(lo)]
    }
}
