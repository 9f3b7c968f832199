//! Projection of a sighting onto the transect's perpendicular.
//!
//! Observers record a radial (slant) distance to the animal and the angle
//! between the sight line and the perpendicular to the transect. The horizontal
//! perpendicular distance is
//!
//! ```text
//! x = r · cos(θ · π / 180)
//! ```
//!
//! which is non-negative and decreasing in `θ` for `θ ∈ [0°, 90°]`. Outside that
//! range the cosine can go negative, so the caller chooses an [`AnglePolicy`].

use thiserror::Error;

use crate::domain::AnglePolicy;

pub const MAX_ANGLE_DEG: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("angle {angle}° is outside [0°, 90°]")]
    AngleOutOfRange { angle: f64 },

    #[error("radial distance {distance} must be finite and >= 0")]
    InvalidRadialDistance { distance: f64 },

    #[error("angle must be finite (got {angle})")]
    NonFiniteAngle { angle: f64 },
}

/// Result of projecting one sighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Angle actually used (differs from the input only when clamped).
    pub angle_deg: f64,
    pub angle_rad: f64,
    pub distance: f64,
    pub clamped: bool,
}

pub fn degrees_to_radians(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Perpendicular distance from a radial distance and an angle in degrees.
pub fn perpendicular_distance(radial: f64, angle_deg: f64, policy: AnglePolicy) -> Result<Projection, GeometryError> {
    if !(radial.is_finite() && radial >= 0.0) {
        return Err(GeometryError::InvalidRadialDistance { distance: radial });
    }
    if !angle_deg.is_finite() {
        return Err(GeometryError::NonFiniteAngle { angle: angle_deg });
    }

    let in_range = (0.0..=MAX_ANGLE_DEG).contains(&angle_deg);
    let angle = match (in_range, policy) {
        (true, _) => angle_deg,
        (false, AnglePolicy::Reject) => return Err(GeometryError::AngleOutOfRange { angle: angle_deg }),
        (false, AnglePolicy::Clamp) => angle_deg.clamp(0.0, MAX_ANGLE_DEG),
    };

    let angle_rad = degrees_to_radians(angle);
    // cos(π/2) evaluates to ~6e-17; never let rounding produce a negative.
    let distance = (radial * angle_rad.cos()).max(0.0);

    Ok(Projection {
        angle_deg: angle,
        angle_rad,
        distance,
        clamped: !in_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_degrees_at_one_hundred() {
        let p = perpendicular_distance(100.0, 30.0, AnglePolicy::Reject).unwrap();
        assert!((p.distance - 86.603).abs() < 1e-3);
        assert!(!p.clamped);
    }

    #[test]
    fn non_negative_and_decreasing_over_quarter_turn() {
        for &r in &[0.0, 1.0, 37.5, 1000.0] {
            let mut prev = f64::INFINITY;
            for step in 0..=180 {
                let theta = step as f64 * 0.5;
                let d = perpendicular_distance(r, theta, AnglePolicy::Reject).unwrap().distance;
                assert!(d >= 0.0, "r={r} θ={theta} gave {d}");
                assert!(d <= prev + 1e-12, "not decreasing at r={r} θ={theta}");
                prev = d;
            }
        }
    }

    #[test]
    fn out_of_range_angle_rejected_or_clamped() {
        let err = perpendicular_distance(10.0, 95.0, AnglePolicy::Reject).unwrap_err();
        assert_eq!(err, GeometryError::AngleOutOfRange { angle: 95.0 });

        let p = perpendicular_distance(10.0, -5.0, AnglePolicy::Clamp).unwrap();
        assert!(p.clamped);
        assert_eq!(p.angle_deg, 0.0);
        assert!((p.distance - 10.0).abs() < 1e-12);
    }

    #[test]
    fn negative_radial_distance_always_rejected() {
        assert!(perpendicular_distance(-1.0, 10.0, AnglePolicy::Clamp).is_err());
        assert!(perpendicular_distance(f64::NAN, 10.0, AnglePolicy::Clamp).is_err());
    }
}
