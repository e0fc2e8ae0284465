use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use crate::error::{require_non_negative, FieldError};
use crate::geometry::{Parabola, Point2D};
use crate::grid::Grid;
use crate::materials::{Material, MaterialMap, MaterialSpeeds};
use crate::params::{MaterialConfig, SimulationConfig, WaveParams};
use crate::source::MorletSource;
use crate::stability;

/// Axis neighbours excited at half strength around the focus.
const SOURCE_NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Freshly built or reset, no step taken yet
    Ready,
    Advancing,
}

/// Leapfrog FDTD solver for the scalar wave equation on a classified grid.
///
/// Holds three displacement buffers: `current` (time n), `previous` (n-1) and a
/// scratch buffer the sweep writes time n+1 into. The sweep only reads the first
/// two, so cells can be computed in any order or in parallel; the buffers are
/// rotated once it completes.
#[derive(Debug, Clone)]
pub struct WaveField {
    config: SimulationConfig,
    wave: WaveParams,
    material_config: MaterialConfig,
    speeds: MaterialSpeeds,
    grid: Grid,
    materials: MaterialMap,
    focus_point: Point2D,
    focus_cell: (usize, usize),

    current: Array2<f64>,
    previous: Array2<f64>,
    scratch: Array2<f64>,
    source: Array2<f64>,

    time: f64,
    steps: u64,
}

impl WaveField {
    pub fn new(
        config: &SimulationConfig,
        wave: WaveParams,
        material_config: &MaterialConfig,
        major: &Parabola,
        minor: &Parabola,
        focus_point: Point2D,
    ) -> Result<Self, FieldError> {
        let grid = config.grid()?;
        wave.validate()?;
        material_config.validate(grid.n)?;
        require_non_negative("damping factor", config.damping_factor)?;

        let speeds = MaterialSpeeds {
            air: wave.speed,
            parabolic: material_config.parabolic_speed,
        };

        // The bound must come from the fastest medium, not just air
        let max_dt = stability::stable_time_step(grid.dx, grid.dy, speeds.max());
        if config.time_step > max_dt {
            warn!(
                time_step = config.time_step,
                max_stable = max_dt,
                min_spacing = grid.min_spacing(),
                air_speed = speeds.air,
                parabolic_speed = speeds.parabolic,
                "time step exceeds the CFL stability limit"
            );
        }

        let materials = MaterialMap::classify(&grid, major, minor, material_config)?;

        if !grid.contains(focus_point) {
            warn!(x = focus_point.x, y = focus_point.y, "focus lies outside the domain, clamping");
        }
        let focus_cell = grid.nearest_cell(focus_point);

        debug!(
            n = grid.n,
            air = materials.count(Material::Air),
            parabolic = materials.count(Material::Parabolic),
            rigid = materials.count(Material::Rigid),
            focus_i = focus_cell.0,
            focus_j = focus_cell.1,
            "classified grid"
        );

        let shape = (grid.n, grid.n);
        Ok(Self {
            config: config.clone(),
            wave,
            material_config: *material_config,
            speeds,
            grid,
            materials,
            focus_point,
            focus_cell,
            current: Array2::zeros(shape),
            previous: Array2::zeros(shape),
            scratch: Array2::zeros(shape),
            source: Array2::zeros(shape),
            time: 0.0,
            steps: 0,
        })
    }

    /// Advance one step of length `dt`, sweeping cells in parallel.
    pub fn update(&mut self, dt: f64) {
        self.advance(dt, true);
    }

    /// Same as [`update`](Self::update) with a single-threaded sweep.
    pub fn update_serial(&mut self, dt: f64) {
        self.advance(dt, false);
    }

    fn advance(&mut self, dt: f64, parallel: bool) {
        self.time += dt;

        // 1. Source for the new time level
        self.inject_source();

        // 2. New displacement from the frozen n and n-1 levels
        self.sweep(dt, parallel);

        // 3. previous <- current <- new, recycling the oldest buffer
        std::mem::swap(&mut self.previous, &mut self.current);
        std::mem::swap(&mut self.current, &mut self.scratch);

        // 4. Rigid cells hold zero in both levels
        self.clamp_rigid();

        self.steps += 1;
    }

    /// Zero the displacement and the clock. Classification is kept.
    pub fn reset(&mut self) {
        self.current.fill(0.0);
        self.previous.fill(0.0);
        self.scratch.fill(0.0);
        self.source.fill(0.0);
        self.time = 0.0;
        self.steps = 0;
    }

    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), FieldError> {
        self.wave.set_frequency(frequency)
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<(), FieldError> {
        if !amplitude.is_finite() {
            return Err(FieldError::NonFiniteParameter {
                name: "amplitude",
                value: amplitude,
            });
        }
        self.wave.amplitude = amplitude;
        Ok(())
    }

    fn inject_source(&mut self) {
        self.source.fill(0.0);

        let (fi, fj) = self.focus_cell;
        if !self.materials.get(fi, fj).propagates() {
            return;
        }

        let amplitude = self.morlet().amplitude_at(self.time);
        self.source[[fi, fj]] = amplitude;

        for (di, dj) in SOURCE_NEIGHBOURS {
            let (ni, nj) = (fi as isize + di, fj as isize + dj);
            if !self.grid.in_bounds(ni, nj) {
                continue;
            }
            let (ni, nj) = (ni as usize, nj as usize);
            if self.materials.get(ni, nj).propagates() {
                self.source[[ni, nj]] = 0.5 * amplitude;
            }
        }
    }

    fn sweep(&mut self, dt: f64, parallel: bool) {
        let stencil = Stencil {
            grid: &self.grid,
            materials: &self.materials,
            speeds: self.speeds,
            current: &self.current,
            previous: &self.previous,
            source: &self.source,
            damping_factor: self.config.damping_factor,
            dt,
        };

        let zip = Zip::indexed(&mut self.scratch);
        if parallel {
            zip.par_for_each(|(i, j), out| *out = stencil.value(i, j));
        } else {
            zip.for_each(|(i, j), out| *out = stencil.value(i, j));
        }
    }

    fn clamp_rigid(&mut self) {
        Zip::from(&mut self.current)
            .and(&mut self.previous)
            .and(self.materials.cells())
            .par_for_each(|u, u_prev, &material| {
                if material == Material::Rigid {
                    *u = 0.0;
                    *u_prev = 0.0;
                }
            });
    }

    pub fn morlet(&self) -> MorletSource {
        MorletSource::new(self.wave.frequency, self.wave.amplitude)
    }

    pub fn stable_time_step(&self) -> f64 {
        stability::stable_time_step(self.grid.dx, self.grid.dy, self.speeds.max())
    }

    pub fn state(&self) -> FieldState {
        if self.steps == 0 {
            FieldState::Ready
        } else {
            FieldState::Advancing
        }
    }

    /// Displacement at the current time level.
    pub fn displacement(&self) -> &Array2<f64> {
        &self.current
    }

    pub fn previous_displacement(&self) -> &Array2<f64> {
        &self.previous
    }

    pub fn source_grid(&self) -> &Array2<f64> {
        &self.source
    }

    pub fn materials(&self) -> &MaterialMap {
        &self.materials
    }

    pub fn boundary_mask(&self) -> Array2<u8> {
        self.materials.propagation_mask()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
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

    pub fn speeds(&self) -> MaterialSpeeds {
        self.speeds
    }

    pub fn focus_point(&self) -> Point2D {
        self.focus_point
    }

    pub fn focus_cell(&self) -> (usize, usize) {
        self.focus_cell
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn max_abs(&self) -> f64 {
        self.current.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
    }

    /// False once any cell has overflowed or become NaN.
    pub fn is_finite(&self) -> bool {
        self.current.iter().all(|v| v.is_finite())
    }

    /// Sum of squared displacement over the grid.
    pub fn energy(&self) -> f64 {
        self.current.iter().map(|v| v * v).sum()
    }
}

/// Read-only view of the pre-step state used by the sweep.
struct Stencil<'a> {
    grid: &'a Grid,
    materials: &'a MaterialMap,
    speeds: MaterialSpeeds,
    current: &'a Array2<f64>,
    previous: &'a Array2<f64>,
    source: &'a Array2<f64>,
    damping_factor: f64,
    dt: f64,
}

impl Stencil<'_> {
    /// Displacement of cell `(i, j)` at the next time level.
    fn value(&self, i: usize, j: usize) -> f64 {
        let material = self.materials.get(i, j);
        if material == Material::Rigid {
            return 0.0;
        }

        // Top row keeps a one-sided y derivative, every other edge absorbs
        let n = self.grid.n;
        let top_row = i == 0 && j > 0 && j < n - 1;
        if self.grid.is_edge(i, j) && !top_row {
            return 0.0;
        }

        let c = self.speeds.speed(material);
        let q0 = c * self.dt;
        let q1 = q0 * q0;
        let q2 = (q0 / self.grid.dx).powi(2);
        let q3 = (q0 / self.grid.dy).powi(2);

        let u = self.current[[i, j]];
        let (dxx, dyy) = if top_row {
            (
                self.current[[i, j - 1]] - 2.0 * u + self.current[[i, j + 1]],
                2.0 * (self.current[[i + 1, j]] - u),
            )
        } else {
            let aware = self.materials.at_interface(i, j);
            let at = |r: usize, s: usize| self.neighbour(r, s, aware);
            (
                at(i, j - 1) - 2.0 * u + at(i, j + 1),
                at(i - 1, j) - 2.0 * u + at(i + 1, j),
            )
        };

        let damping = self.damping_factor * q0;
        let u_prev = self.previous[[i, j]];
        (-(u_prev - 2.0 * u) + damping * u_prev + q1 * self.source[[i, j]] + q2 * dxx + q3 * dyy)
            / (1.0 + damping)
    }

    /// Neighbour displacement; rigid neighbours read as zero at material interfaces.
    fn neighbour(&self, i: usize, j: usize, aware: bool) -> f64 {
        if aware && self.materials.get(i, j) == Material::Rigid {
            0.0
        } else {
            self.current[[i, j]]
        }
    }
}
