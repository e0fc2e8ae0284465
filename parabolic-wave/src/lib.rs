//! Two-dimensional acoustic FDTD simulation between two confocal parabolic reflectors.
//!
//! A [`DualParabolicSimulation`] owns a concave-down major reflector and a concave-up
//! minor reflector sharing one focus, a Morlet point source at that focus and a
//! [`WaveField`] that integrates the scalar wave equation over a grid classified into
//! air, reflector material and a rigid frame.

pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod grid;
pub mod materials;
pub mod params;
pub mod simulation;
pub mod source;
pub mod stability;
pub mod visualisation;
pub mod wavefield;

pub use config::Config;
pub use error::FieldError;
pub use export::DataExporter;
pub use geometry::{Parabola, Point2D};
pub use grid::Grid;
pub use materials::{Material, MaterialMap, MaterialSpeeds};
pub use params::{MaterialConfig, SimulationConfig, WaveParams};
pub use simulation::DualParabolicSimulation;
pub use source::MorletSource;
pub use visualisation::FieldVisualiser;
pub use wavefield::{FieldState, WaveField};
