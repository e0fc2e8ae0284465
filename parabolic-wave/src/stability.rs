//! CFL bound for the explicit five-point scheme.

/// Safety factor applied to the 2-D bound `h / (c sqrt 2)`.
pub const CFL_SAFETY: f64 = 0.4;

/// Largest time step considered stable: `0.4 * min(dx, dy) / (c_max * sqrt 2)`.
pub fn stable_time_step(dx: f64, dy: f64, c_max: f64) -> f64 {
    CFL_SAFETY * dx.min(dy) / (c_max * 2f64.sqrt())
}

/// Courant number `c dt / min(dx, dy)`.
pub fn courant_number(dt: f64, dx: f64, dy: f64, c_max: f64) -> f64 {
    c_max * dt / dx.min(dy)
}

pub fn is_stable(dt: f64, dx: f64, dy: f64, c_max: f64) -> bool {
    dt <= stable_time_step(dx, dy, c_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bound_uses_the_smaller_spacing() {
        let dt = stable_time_step(2.0, 0.5, 1_000.0);
        assert_relative_eq!(dt, 0.4 * 0.5 / (1_000.0 * 2f64.sqrt()));
        assert!(is_stable(dt, 2.0, 0.5, 1_000.0));
        assert!(!is_stable(dt * 1.01, 2.0, 0.5, 1_000.0));
    }

    #[test]
    fn faster_medium_tightens_the_bound() {
        let slow = stable_time_step(1.0, 1.0, 343_000.0);
        let fast = stable_time_step(1.0, 1.0, 1_500_000.0);
        assert!(fast < slow);
        assert_relative_eq!(courant_number(fast, 1.0, 1.0, 1_500_000.0), 0.4 / 2f64.sqrt());
    }
}
