use thiserror::Error;

/// Errors raised while building or reconfiguring a field solver.
#[derive(Error, Debug, Clone)]
pub enum FieldError {
    #[error("grid size must be at least 3 (got {0})")]
    GridTooSmall(usize),

    #[error("degenerate {axis} extent: min={min}, max={max}")]
    DegenerateDomain { axis: char, min: f64, max: f64 },

    #[error("invalid reflector geometry: diameter={diameter}, focal_length={focal_length}")]
    InvalidParabola { diameter: f64, focal_length: f64 },

    #[error("frequency must be positive and finite (got {0})")]
    InvalidFrequency(f64),

    #[error("{name} must be positive and finite (got {value})")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("{name} must be non-negative and finite (got {value})")]
    NegativeParameter { name: &'static str, value: f64 },

    #[error("{name} must be finite (got {value})")]
    NonFiniteParameter { name: &'static str, value: f64 },

    #[error("rigid margin of {margin} cells leaves no interior on a {grid_size}x{grid_size} grid")]
    MarginTooWide { margin: usize, grid_size: usize },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, FieldError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FieldError::InvalidParameter { name, value })
    }
}

pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<f64, FieldError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FieldError::NegativeParameter { name, value })
    }
}
