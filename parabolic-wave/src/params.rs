use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, FieldError};
use crate::grid::Grid;

/// Air speed of sound in mm/s.
pub const SPEED_OF_SOUND_AIR: f64 = 343_000.0;

/// Domain, resolution and stepping parameters for one field solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub grid_size: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub time_step: f64,       // Seconds
    pub damping_factor: f64,
    pub reflection_coeff: f64, // Reported to consumers, not used by the stencil
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_size: 300,
            x_min: -300.0,
            x_max: 300.0,
            y_min: -100.0,
            y_max: 150.0,
            time_step: 1e-6,
            damping_factor: 0.001,
            reflection_coeff: 0.95,
        }
    }
}

impl SimulationConfig {
    pub fn grid(&self) -> Result<Grid, FieldError> {
        Grid::new(self.grid_size, self.x_min, self.x_max, self.y_min, self.y_max)
    }
}

/// Source and propagation parameters. `speed` is the air speed in mm/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveParams {
    pub frequency: f64,  // Hz
    pub wavelength: f64, // mm
    pub speed: f64,      // mm/s
    pub amplitude: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self::new(1000.0, SPEED_OF_SOUND_AIR, 1.0)
    }
}

impl WaveParams {
    pub fn new(frequency: f64, speed: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            wavelength: speed / frequency,
            speed,
            amplitude,
        }
    }

    pub fn validate(&self) -> Result<(), FieldError> {
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(FieldError::InvalidFrequency(self.frequency));
        }
        require_positive("wave speed", self.speed)?;
        if !self.amplitude.is_finite() {
            return Err(FieldError::NonFiniteParameter {
                name: "amplitude",
                value: self.amplitude,
            });
        }
        Ok(())
    }

    /// Change the frequency, keeping `wavelength = speed / frequency`.
    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), FieldError> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(FieldError::InvalidFrequency(frequency));
        }
        self.frequency = frequency;
        self.wavelength = self.speed / frequency;
        Ok(())
    }
}

/// Reflector material model: wave speed inside the solid band, band thickness and
/// the width of the rigid frame around the domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    pub parabolic_speed: f64, // mm/s
    pub thickness: f64,       // mm
    pub rigid_margin: usize,  // Cells
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            parabolic_speed: 1_500_000.0,
            thickness: 40.0,
            rigid_margin: 5,
        }
    }
}

impl MaterialConfig {
    pub fn validate(&self, grid_size: usize) -> Result<(), FieldError> {
        require_positive("parabolic speed", self.parabolic_speed)?;
        require_non_negative("material thickness", self.thickness)?;
        if 2 * self.rigid_margin >= grid_size {
            return Err(FieldError::MarginTooWide {
                margin: self.rigid_margin,
                grid_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wavelength_tracks_frequency() {
        let mut wave = WaveParams::default();
        assert_relative_eq!(wave.wavelength, 343.0);
        wave.set_frequency(2000.0).unwrap();
        assert_relative_eq!(wave.wavelength, 171.5);
        assert!(wave.set_frequency(0.0).is_err());
        assert!(wave.set_frequency(f64::NAN).is_err());
        assert_relative_eq!(wave.frequency, 2000.0);
    }

    #[test]
    fn thickness_may_be_zero_but_not_negative() {
        let mut materials = MaterialConfig {
            thickness: 0.0,
            ..MaterialConfig::default()
        };
        assert!(materials.validate(101).is_ok());

        materials.thickness = -1.0;
        let err = materials.validate(101).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
        assert!(matches!(
            err,
            FieldError::NegativeParameter { name: "material thickness", .. }
        ));
    }

    #[test]
    fn margin_must_leave_an_interior() {
        let materials = MaterialConfig::default();
        assert!(materials.validate(11).is_ok());
        assert!(materials.validate(10).is_err());
    }
}
