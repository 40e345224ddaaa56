//! Movement threshold filter for outgoing location updates.

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Great-circle distance in metres between two `(latitude, longitude)` pairs
/// given in degrees.
pub fn haversine_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone)]
pub struct DistanceGate {
    min_movement_m: f64,
    last_emitted: Option<(f64, f64)>,
}

impl DistanceGate {
    pub fn new(min_movement_m: f64) -> Self {
        Self {
            min_movement_m,
            last_emitted: None,
        }
    }

    /// Returns true and records the point when it is the first one, or at
    /// least `min_movement_m` away from the last recorded point.
    pub fn should_emit(&mut self, latitude: f64, longitude: f64) -> bool {
        let emit = match self.last_emitted {
            None => true,
            Some(last) => haversine_m(last, (latitude, longitude)) >= self.min_movement_m,
        };

        if emit {
            self.last_emitted = Some((latitude, longitude));
        }

        emit
    }

    pub fn reset(&mut self) {
        self.last_emitted = None;
    }

    pub fn last_emitted(&self) -> Option<(f64, f64)> {
        self.last_emitted
    }

    pub fn min_movement_m(&self) -> f64 {
        self.min_movement_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One degree of latitude on a 6,371 km sphere.
    const METRES_PER_DEGREE: f64 = 111_194.93;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_m((0.0, 0.0), (1.0, 0.0));
        assert!((d - METRES_PER_DEGREE).abs() < 1.0);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine_m((48.8566, 2.3522), (48.8566, 2.3522)), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = (51.5074, -0.1278);
        let b = (40.7128, -74.0060);
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
        // London to New York is roughly 5,570 km.
        assert!((haversine_m(a, b) / 1000.0 - 5_570.0).abs() < 20.0);
    }

    #[test]
    fn test_first_point_always_emits() {
        let mut gate = DistanceGate::new(1_000_000.0);
        assert!(gate.should_emit(10.0, 10.0));
        assert_eq!(gate.last_emitted(), Some((10.0, 10.0)));
    }

    #[test]
    fn test_below_threshold_is_suppressed() {
        let mut gate = DistanceGate::new(50.0);
        assert!(gate.should_emit(0.0, 0.0));

        // ~11 m north
        let lat = 11.0 / METRES_PER_DEGREE;
        assert!(!gate.should_emit(lat, 0.0));
        assert_eq!(gate.last_emitted(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_at_or_above_threshold_emits_once_and_moves_anchor() {
        let mut gate = DistanceGate::new(50.0);
        assert!(gate.should_emit(0.0, 0.0));

        // ~60 m north
        let lat = 60.0 / METRES_PER_DEGREE;
        assert!(gate.should_emit(lat, 0.0));
        assert_eq!(gate.last_emitted(), Some((lat, 0.0)));

        // Same point again is now below threshold.
        assert!(!gate.should_emit(lat, 0.0));
    }

    #[test]
    fn test_small_steps_accumulate_against_anchor() {
        let mut gate = DistanceGate::new(50.0);
        assert!(gate.should_emit(0.0, 0.0));

        let step = 20.0 / METRES_PER_DEGREE;
        assert!(!gate.should_emit(step, 0.0));
        assert!(!gate.should_emit(2.0 * step, 0.0));
        assert!(gate.should_emit(3.0 * step, 0.0));
    }

    #[test]
    fn test_reset_forces_next_emit() {
        let mut gate = DistanceGate::new(50.0);
        assert!(gate.should_emit(0.0, 0.0));
        assert!(!gate.should_emit(0.0, 0.0));

        gate.reset();
        assert_eq!(gate.last_emitted(), None);
        assert!(gate.should_emit(0.0, 0.0));
    }
}
