//! Plain-text snapshots of the field for offline plotting.
//!
//! Every grid file holds `N` lines of `N` space-separated values in row-major order,
//! top row (largest `y`) first.

use anyhow::{anyhow, bail, Result};
use ndarray::Array2;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::simulation::DualParabolicSimulation;

pub const MASK_FILE: &str = "boundary_mask.txt";
pub const TYPES_FILE: &str = "boundary_types.txt";
pub const METADATA_FILE: &str = "metadata.txt";

/// Snapshot file name for capture number `index`.
pub fn snapshot_name(index: usize) -> String {
    format!("wave_data_t{:04}.txt", index)
}

pub fn write_grid<T: Display>(path: &Path, data: &Array2<T>) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| anyhow!("Failed to create '{}': {}", path.display(), e))?;
    let mut out = BufWriter::new(file);

    for row in data.rows() {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{}", line)
            .map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))?;
    }
    out.flush()
        .map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}

/// Parse a rectangular grid written by [`write_grid`].
pub fn read_grid(path: &Path) -> Result<Array2<f64>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))?;

    let mut values = Vec::new();
    let mut rows = 0;
    let mut cols = None;
    for (line_no, line) in content.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let before = values.len();
        for token in line.split_whitespace() {
            let v: f64 = token.parse().map_err(|e| {
                anyhow!("'{}' line {}: bad value '{}': {}", path.display(), line_no + 1, token, e)
            })?;
            values.push(v);
        }

        let width = values.len() - before;
        match cols {
            None => cols = Some(width),
            Some(expected) if expected != width => bail!(
                "'{}' line {}: expected {} values, found {}",
                path.display(),
                line_no + 1,
                expected,
                width
            ),
            Some(_) => {}
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, cols.unwrap_or(0)), values)
        .map_err(|e| anyhow!("'{}' is not a rectangular grid: {}", path.display(), e))
}

/// Writes periodic displacement snapshots plus the static material files.
#[derive(Debug)]
pub struct DataExporter {
    directory: PathBuf,
    capture_interval: usize,
    captures: usize,
}

impl DataExporter {
    pub fn new(directory: impl AsRef<Path>, capture_interval: usize) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if capture_interval == 0 {
            return Err(anyhow!("capture_interval must be positive"));
        }
        fs::create_dir_all(&directory).map_err(|e| {
            anyhow!("Failed to create output directory '{}': {}", directory.display(), e)
        })?;
        Ok(Self {
            directory,
            capture_interval,
            captures: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn captures(&self) -> usize {
        self.captures
    }

    pub fn should_capture(&self, step: u64) -> bool {
        step % self.capture_interval as u64 == 0
    }

    /// Write the current displacement as the next numbered snapshot.
    pub fn capture(&mut self, simulation: &DualParabolicSimulation) -> Result<PathBuf> {
        let path = self.directory.join(snapshot_name(self.captures));
        write_grid(&path, simulation.displacement())?;
        self.captures += 1;
        debug!(file = %path.display(), step = simulation.steps(), "captured snapshot");
        Ok(path)
    }

    /// Material codes and propagation mask; these never change during a run.
    pub fn write_materials(&self, simulation: &DualParabolicSimulation) -> Result<()> {
        write_grid(&self.directory.join(TYPES_FILE), &simulation.materials().codes())?;
        write_grid(&self.directory.join(MASK_FILE), &simulation.boundary_mask())?;
        Ok(())
    }

    pub fn write_metadata(&self, simulation: &DualParabolicSimulation) -> Result<PathBuf> {
        let path = self.directory.join(METADATA_FILE);
        let config = simulation.config();
        let wave = simulation.wave_params();
        let materials = simulation.material_config();
        let major = simulation.major_parabola();
        let minor = simulation.minor_parabola();
        let focus = simulation.focus_point();
        let grid = simulation.field().grid();

        let entries: Vec<(&str, String)> = vec![
            ("grid_size", config.grid_size.to_string()),
            ("x_min_mm", config.x_min.to_string()),
            ("x_max_mm", config.x_max.to_string()),
            ("y_min_mm", config.y_min.to_string()),
            ("y_max_mm", config.y_max.to_string()),
            ("domain_width_mm", grid.width().to_string()),
            ("domain_height_mm", grid.height().to_string()),
            ("air_speed_mm_s", wave.speed.to_string()),
            ("parabolic_speed_mm_s", materials.parabolic_speed.to_string()),
            ("frequency_hz", wave.frequency.to_string()),
            ("amplitude", wave.amplitude.to_string()),
            ("time_step_s", format!("{:e}", simulation.time_step())),
            ("damping_factor", config.damping_factor.to_string()),
            ("reflection_coeff", config.reflection_coeff.to_string()),
            ("capture_interval", self.capture_interval.to_string()),
            ("num_captures", self.captures.to_string()),
            ("num_time_steps", simulation.steps().to_string()),
            ("total_duration_s", format!("{:e}", simulation.time())),
            ("major_parabola_diameter_mm", major.diameter().to_string()),
            ("major_parabola_focus_mm", major.focal_length().to_string()),
            ("minor_parabola_diameter_mm", minor.diameter().to_string()),
            ("minor_parabola_focus_mm", minor.focal_length().to_string()),
            ("focus_point_x_mm", focus.x.to_string()),
            ("focus_point_y_mm", focus.y.to_string()),
            ("material_thickness_mm", materials.thickness.to_string()),
            ("rigid_margin_cells", materials.rigid_margin.to_string()),
        ];

        let mut text = String::from("# Dual parabolic wave simulation metadata\n");
        for (key, value) in entries {
            text.push_str(key);
            text.push('=');
            text.push_str(&value);
            text.push('\n');
        }
        fs::write(&path, text)
            .map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))?;
        Ok(path)
    }
}

/// Parse `key=value` lines, skipping `#` comments.
pub fn read_metadata(path: &Path) -> Result<Vec<(String, String)>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            l.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("'{}': malformed line '{}'", path.display(), l))
        })
        .collect()
}
