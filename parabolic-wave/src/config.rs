use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

use crate::geometry::{Parabola, Point2D};
use crate::grid::Grid;
use crate::materials::MaterialSpeeds;
use crate::params::{MaterialConfig, SimulationConfig, WaveParams, SPEED_OF_SOUND_AIR};
use crate::simulation::{MAJOR_DIAMETER, MAJOR_FOCAL_LENGTH, MINOR_DIAMETER, MINOR_FOCAL_LENGTH};
use crate::stability;

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: usize,
    pub x_min: f64, // mm
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 300,
            x_min: -300.0,
            x_max: 300.0,
            y_min: -100.0,
            y_max: 150.0,
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<Grid> {
        Grid::new(self.size, self.x_min, self.x_max, self.y_min, self.y_max)
            .map_err(|e| anyhow!("Invalid [grid] section: {}", e))
    }
}

/// One reflector: aperture and focal length, both in mm. A missing key keeps
/// that reflector's reference value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
}

impl ReflectorConfig {
    /// (diameter, focal length) with unset keys taken from the given reference
    pub fn resolve(&self, diameter: f64, focal_length: f64) -> (f64, f64) {
        (
            self.diameter.unwrap_or(diameter),
            self.focal_length.unwrap_or(focal_length),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorsConfig {
    pub major: ReflectorConfig, // Concave down, above the focus
    pub minor: ReflectorConfig, // Concave up, below the focus
}

impl ReflectorsConfig {
    pub fn major(&self) -> (f64, f64) {
        self.major.resolve(MAJOR_DIAMETER, MAJOR_FOCAL_LENGTH)
    }

    pub fn minor(&self) -> (f64, f64) {
        self.minor.resolve(MINOR_DIAMETER, MINOR_FOCAL_LENGTH)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub frequency: f64, // Hz
    pub speed: f64,     // Air, mm/s
    pub amplitude: f64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            frequency: 1000.0,
            speed: SPEED_OF_SOUND_AIR,
            amplitude: 1.0,
        }
    }
}

/// Stepping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_step: Option<f64>, // Optional: computed from the CFL bound if not provided
    #[serde(default = "default_damping")]
    pub damping_factor: f64,
    #[serde(default = "default_reflection_coeff")]
    pub reflection_coeff: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_report_period")]
    pub report_period: usize,
}

fn default_damping() -> f64 {
    0.001
}

fn default_reflection_coeff() -> f64 {
    0.95
}

fn default_steps() -> usize {
    2000
}

fn default_report_period() -> usize {
    10
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            time_step: None,
            damping_factor: default_damping(),
            reflection_coeff: default_reflection_coeff(),
            steps: default_steps(),
            report_period: default_report_period(),
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<()> {
        if let Some(dt) = self.time_step {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(anyhow!("time_step must be positive, got {}", dt));
            }
        }
        if !(self.damping_factor.is_finite() && self.damping_factor >= 0.0) {
            return Err(anyhow!(
                "damping_factor must be non-negative, got {}",
                self.damping_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.reflection_coeff) {
            return Err(anyhow!(
                "reflection_coeff must be in [0, 1], got {}",
                self.reflection_coeff
            ));
        }
        if self.steps == 0 {
            return Err(anyhow!("steps must be positive"));
        }
        if self.report_period == 0 {
            return Err(anyhow!("report_period must be positive"));
        }
        Ok(())
    }

    /// Compute the time step from the CFL bound if not specified
    pub fn compute_time_step_if_needed(&mut self, grid: &Grid, c_max: f64) {
        if self.time_step.is_none() {
            self.time_step = Some(stability::stable_time_step(grid.dx, grid.dy, c_max));
        }
    }
}

/// Exporter and renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_capture_interval")]
    pub capture_interval: usize,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub frames: bool,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

fn default_directory() -> String {
    "output".to_string()
}

fn default_capture_interval() -> usize {
    20
}

fn default_image_width() -> u32 {
    900
}

fn default_image_height() -> u32 {
    900
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            capture_interval: default_capture_interval(),
            export: false,
            frames: false,
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.capture_interval == 0 {
            return Err(anyhow!("capture_interval must be positive"));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        Ok(())
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub reflectors: ReflectorsConfig,
    pub focus: FocusConfig,
    pub wave: WaveConfig,
    pub materials: MaterialConfig,
    pub simulation: RunConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        // Validate before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration parameters and resolve the time step
    pub fn validate(&mut self) -> Result<()> {
        let grid = self.grid.validate()?;
        self.major_parabola()?;
        self.minor_parabola()?;
        self.wave_params()
            .validate()
            .map_err(|e| anyhow!("Invalid [wave] section: {}", e))?;
        self.materials
            .validate(grid.n)
            .map_err(|e| anyhow!("Invalid [materials] section: {}", e))?;
        self.simulation.validate()?;
        self.output.validate()?;

        let c_max = self.speeds().max();
        self.simulation.compute_time_step_if_needed(&grid, c_max);

        let dt = self.time_step();
        let dt_max = stability::stable_time_step(grid.dx, grid.dy, c_max);
        if dt > dt_max {
            warn!(
                time_step = dt,
                max_stable = dt_max,
                "Configured time step exceeds the CFL limit, expect divergence"
            );
        }

        Ok(())
    }

    /// Resolved time step; the CFL bound until `validate` has run.
    pub fn time_step(&self) -> f64 {
        match self.simulation.time_step {
            Some(dt) => dt,
            None => match self.grid.validate() {
                Ok(grid) => stability::stable_time_step(grid.dx, grid.dy, self.speeds().max()),
                Err(_) => SimulationConfig::default().time_step,
            },
        }
    }

    pub fn speeds(&self) -> MaterialSpeeds {
        MaterialSpeeds {
            air: self.wave.speed,
            parabolic: self.materials.parabolic_speed,
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            grid_size: self.grid.size,
            x_min: self.grid.x_min,
            x_max: self.grid.x_max,
            y_min: self.grid.y_min,
            y_max: self.grid.y_max,
            time_step: self.time_step(),
            damping_factor: self.simulation.damping_factor,
            reflection_coeff: self.simulation.reflection_coeff,
        }
    }

    pub fn wave_params(&self) -> WaveParams {
        WaveParams::new(self.wave.frequency, self.wave.speed, self.wave.amplitude)
    }

    pub fn focus_point(&self) -> Point2D {
        Point2D::new(self.focus.x, self.focus.y)
    }

    pub fn major_parabola(&self) -> Result<Parabola> {
        let (diameter, focal_length) = self.reflectors.major();
        Parabola::umbrella(diameter, focal_length, self.focus_point())
            .map_err(|e| anyhow!("Invalid [reflectors.major] section: {}", e))
    }

    pub fn minor_parabola(&self) -> Result<Parabola> {
        let (diameter, focal_length) = self.reflectors.minor();
        Parabola::bowl(diameter, focal_length, self.focus_point())
            .map_err(|e| anyhow!("Invalid [reflectors.minor] section: {}", e))
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        info!("=== Simulation Configuration ===");
        info!(
            "Grid: {}x{} over x=[{}, {}] mm, y=[{}, {}] mm",
            self.grid.size,
            self.grid.size,
            self.grid.x_min,
            self.grid.x_max,
            self.grid.y_min,
            self.grid.y_max
        );
        let (major_d, major_f) = self.reflectors.major();
        let (minor_d, minor_f) = self.reflectors.minor();
        info!(
            "Reflectors: major d={} mm f={} mm, minor d={} mm f={} mm, focus ({}, {})",
            major_d,
            major_f,
            minor_d,
            minor_f,
            self.focus.x,
            self.focus.y
        );
        info!(
            "Wave: f={} Hz, c_air={} mm/s, amplitude={}",
            self.wave.frequency, self.wave.speed, self.wave.amplitude
        );
        info!(
            "Materials: c_parabolic={} mm/s, thickness={} mm, margin={} cells",
            self.materials.parabolic_speed, self.materials.thickness, self.materials.rigid_margin
        );
        let dt = self.time_step();
        info!(
            "Simulation: dt={:e} s, steps={}, total_time={:e} s, damping={}",
            dt,
            self.simulation.steps,
            dt * self.simulation.steps as f64,
            self.simulation.damping_factor
        );
        info!(
            "Output: '{}' every {} steps (export={}, frames={})",
            self.output.directory,
            self.output.capture_interval,
            self.output.export,
            self.output.frames
        );
        info!("================================");
    }
}
