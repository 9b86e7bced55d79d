//! Bounded, time-ordered history per location.

use chrono::{DateTime, Utc};
use common::{PollenSnapshot, PressurePoint};

/// Anything stored in a `HistoryWindow`.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for PressurePoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for PollenSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.collected_at
    }
}

/// Oldest first. Callers append in time order; the window does not
/// re-sort, and lookups go through timestamps rather than positions.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow<P> {
    points: Vec<P>,
    capacity: usize,
}

impl<P: Timestamped> HistoryWindow<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Wrap previously stored points as-is.
    pub fn from_points(points: Vec<P>, capacity: usize) -> Self {
        Self { points, capacity }
    }

    pub fn append(&mut self, point: P) {
        self.points.push(point);
    }

    /// Drop the oldest surplus so at most `capacity` points remain.
    /// Returns how many were dropped.
    pub fn evict_to_capacity(&mut self) -> usize {
        let surplus = self.points.len().saturating_sub(self.capacity);
        if surplus > 0 {
            self.points.drain(..surplus);
        }
        surplus
    }

    /// Append then evict.
    pub fn push(&mut self, point: P) -> usize {
        self.append(point);
        self.evict_to_capacity()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn points(&self) -> &[P] {
        &self.points
    }

    pub fn latest(&self) -> Option<&P> {
        self.points.last()
    }

    pub fn into_points(self) -> Vec<P> {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(base: DateTime<Utc>, hours: i64, pressure: f64) -> PressurePoint {
        PressurePoint::new(base + Duration::hours(hours), pressure)
    }

    #[test]
    fn test_append_beyond_capacity_keeps_most_recent() {
        let base = Utc::now();
        let mut window = HistoryWindow::new(3);
        for h in 0..5 {
            window.push(at(base, h, 1000.0 + h as f64));
        }

        assert_eq!(window.len(), 3);
        let pressures: Vec<f64> = window.points().iter().map(|p| p.pressure_mb).collect();
        assert_eq!(pressures, vec![1002.0, 1003.0, 1004.0]);
        assert!(window
            .points()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_evict_trims_oversized_stored_history() {
        let base = Utc::now();
        let stored: Vec<PressurePoint> = (0..10).map(|h| at(base, h, 1000.0)).collect();
        let mut window = HistoryWindow::from_points(stored, 4);

        assert_eq!(window.len(), 10);
        assert_eq!(window.evict_to_capacity(), 6);
        assert_eq!(window.len(), 4);
        assert_eq!(window.points()[0].timestamp, base + Duration::hours(6));
        assert_eq!(window.evict_to_capacity(), 0);
    }

    #[test]
    fn test_under_capacity_untouched() {
        let base = Utc::now();
        let mut window = HistoryWindow::new(48);
        assert!(window.is_empty());
        assert_eq!(window.push(at(base, 0, 1013.0)), 0);
        assert_eq!(window.push(at(base, 1, 1014.0)), 0);
        assert_eq!(window.len(), 2);
        assert_eq!(window.latest().unwrap().pressure_mb, 1014.0);
        assert_eq!(window.capacity(), 48);
    }
}
