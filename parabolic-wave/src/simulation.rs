use ndarray::Array2;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{require_positive, FieldError};
use crate::geometry::{Parabola, Point2D};
use crate::materials::{Material, MaterialMap, MaterialSpeeds};
use crate::params::{MaterialConfig, SimulationConfig, WaveParams};
use crate::stability;
use crate::wavefield::{FieldState, WaveField};

/// Reference reflector pair: diameter and focal length in mm.
pub const MAJOR_DIAMETER: f64 = 508.0;
pub const MAJOR_FOCAL_LENGTH: f64 = 100.0;
pub const MINOR_DIAMETER: f64 = 200.0;
pub const MINOR_FOCAL_LENGTH: f64 = 50.0;

/// Notification fired after every update and reset.
pub type UpdateCallback = Box<dyn FnMut() + Send>;

/// Two confocal reflectors around a point source, driving a [`WaveField`].
///
/// The major reflector opens downwards above the focus and the minor one opens
/// upwards below it, so rays leaving the focus bounce between them parallel to the
/// axis.
pub struct DualParabolicSimulation {
    major: Parabola,
    minor: Parabola,
    focus: Point2D,
    config: SimulationConfig,
    wave: WaveParams,
    material_config: MaterialConfig,
    field: WaveField,
    time_step: f64,
    simulation_speed: f64,
    callback: Option<UpdateCallback>,
}

impl DualParabolicSimulation {
    /// Reference setup stepping at the CFL bound.
    pub fn new() -> Result<Self, FieldError> {
        let focus = Point2D::new(0.0, 0.0);
        let (major, minor) = reference_reflectors(focus)?;
        let material_config = MaterialConfig::default();
        let wave = WaveParams::default();

        let mut config = SimulationConfig::default();
        let grid = config.grid()?;
        let c_max = MaterialSpeeds {
            air: wave.speed,
            parabolic: material_config.parabolic_speed,
        }
        .max();
        config.time_step = stability::stable_time_step(grid.dx, grid.dy, c_max);

        Self::from_parts(config, wave, material_config, major, minor, focus)
    }

    /// Square domain `[-d/2, d/2]` on both axes around the reference reflectors.
    pub fn with_parameters(
        grid_size: usize,
        domain_size_mm: f64,
        wave_speed_m_per_s: f64,
        time_step: f64,
        simulation_speed: f64,
    ) -> Result<Self, FieldError> {
        let half = require_positive("domain size", domain_size_mm)? / 2.0;
        let speed = require_positive("wave speed", wave_speed_m_per_s)? * 1000.0;
        require_positive("time step", time_step)?;

        let config = SimulationConfig {
            grid_size,
            x_min: -half,
            x_max: half,
            y_min: -half,
            y_max: half,
            time_step,
            ..SimulationConfig::default()
        };
        let defaults = WaveParams::default();
        let wave = WaveParams::new(defaults.frequency, speed, defaults.amplitude);

        let focus = Point2D::new(0.0, 0.0);
        let (major, minor) = reference_reflectors(focus)?;

        let mut simulation =
            Self::from_parts(config, wave, MaterialConfig::default(), major, minor, focus)?;
        simulation.simulation_speed = simulation_speed;
        Ok(simulation)
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let simulation = Self::from_parts(
            config.simulation_config(),
            config.wave_params(),
            config.materials,
            config.major_parabola()?,
            config.minor_parabola()?,
            config.focus_point(),
        )?;
        Ok(simulation)
    }

    pub fn from_parts(
        config: SimulationConfig,
        wave: WaveParams,
        material_config: MaterialConfig,
        major: Parabola,
        minor: Parabola,
        focus: Point2D,
    ) -> Result<Self, FieldError> {
        let time_step = require_positive("time step", config.time_step)?;
        let field = WaveField::new(&config, wave, &material_config, &major, &minor, focus)?;

        info!(
            n = config.grid_size,
            time_step,
            max_stable = field.stable_time_step(),
            "built dual parabolic simulation"
        );

        Ok(Self {
            major,
            minor,
            focus,
            config,
            wave,
            material_config,
            field,
            time_step,
            simulation_speed: 1.0,
            callback: None,
        })
    }

    /// Advance by the configured time step.
    pub fn update(&mut self) {
        self.update_with(self.time_step);
    }

    pub fn update_with(&mut self, dt: f64) {
        self.field.update(dt);
        self.notify();
    }

    pub fn reset(&mut self) {
        self.field.reset();
        debug!("simulation reset");
        self.notify();
    }

    fn notify(&mut self) {
        if let Some(callback) = self.callback.as_mut() {
            callback();
        }
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), FieldError> {
        self.wave.set_frequency(frequency)?;
        self.field.set_frequency(frequency)
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<(), FieldError> {
        self.field.set_amplitude(amplitude)?;
        self.wave.amplitude = amplitude;
        Ok(())
    }

    pub fn set_update_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_update_callback(&mut self) {
        self.callback = None;
    }

    pub fn field(&self) -> &WaveField {
        &self.field
    }

    pub fn displacement(&self) -> &Array2<f64> {
        self.field.displacement()
    }

    pub fn previous_displacement(&self) -> &Array2<f64> {
        self.field.previous_displacement()
    }

    pub fn source_grid(&self) -> &Array2<f64> {
        self.field.source_grid()
    }

    pub fn materials(&self) -> &MaterialMap {
        self.field.materials()
    }

    pub fn material_at(&self, i: usize, j: usize) -> Material {
        self.field.materials().get(i, j)
    }

    pub fn boundary_mask(&self) -> Array2<u8> {
        self.field.boundary_mask()
    }

    pub fn time(&self) -> f64 {
        self.field.time()
    }

    pub fn steps(&self) -> u64 {
        self.field.steps()
    }

    pub fn state(&self) -> FieldState {
        self.field.state()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn wave_params(&self) -> &WaveParams {
        &self.wave
    }

    pub fn material_config(&self) -> &MaterialConfig {
        &self.material_config
    }

    pub fn major_parabola(&self) -> &Parabola {
        &self.major
    }

    pub fn minor_parabola(&self) -> &Parabola {
        &self.minor
    }

    pub fn focus_point(&self) -> Point2D {
        self.focus
    }

    pub fn focus_cell(&self) -> (usize, usize) {
        self.field.focus_cell()
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn stable_time_step(&self) -> f64 {
        self.field.stable_time_step()
    }

    /// Pacing hint for interactive consumers; the solver does not read it.
    pub fn simulation_speed(&self) -> f64 {
        self.simulation_speed
    }
}

fn reference_reflectors(focus: Point2D) -> Result<(Parabola, Parabola), FieldError> {
    Ok((
        Parabola::umbrella(MAJOR_DIAMETER, MAJOR_FOCAL_LENGTH, focus)?,
        Parabola::bowl(MINOR_DIAMETER, MINOR_FOCAL_LENGTH, focus)?,
    ))
}
