use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::geometry::Parabola;
use crate::grid::Grid;
use crate::params::MaterialConfig;

/// Per-cell medium. The discriminants are the codes written by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Material {
    Air = 0,
    Parabolic = 1,
    Rigid = 2,
}

impl Material {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn propagates(self) -> bool {
        self != Material::Rigid
    }
}

/// Wave speed of each propagating medium (mm/s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSpeeds {
    pub air: f64,
    pub parabolic: f64,
}

impl MaterialSpeeds {
    pub fn speed(&self, material: Material) -> f64 {
        match material {
            Material::Air => self.air,
            Material::Parabolic => self.parabolic,
            Material::Rigid => 0.0,
        }
    }

    /// Fastest speed present in the model; this is what bounds the time step.
    pub fn max(&self) -> f64 {
        self.air.max(self.parabolic)
    }
}

/// Material of a single cell, a pure function of geometry.
pub fn classify_cell(
    grid: &Grid,
    i: usize,
    j: usize,
    major: &Parabola,
    minor: &Parabola,
    config: &MaterialConfig,
) -> Material {
    // The frame overrides any geometric result
    let m = config.rigid_margin;
    if i < m || j < m || i + m >= grid.n || j + m >= grid.n {
        return Material::Rigid;
    }

    let p = grid.position(i, j);
    if major.band_contains(p, config.thickness) || minor.band_contains(p, config.thickness) {
        Material::Parabolic
    } else {
        Material::Air
    }
}

/// Immutable classification of every grid cell.
#[derive(Debug, Clone)]
pub struct MaterialMap {
    cells: Array2<Material>,
}

impl MaterialMap {
    pub fn classify(
        grid: &Grid,
        major: &Parabola,
        minor: &Parabola,
        config: &MaterialConfig,
    ) -> Result<Self, FieldError> {
        let n = grid.n;

        // Cells are independent, so classify them all in parallel
        let cells: Vec<Material> = (0..grid.cell_count())
            .into_par_iter()
            .map(|k| classify_cell(grid, k / n, k % n, major, minor, config))
            .collect();

        Ok(Self {
            cells: Array2::from_shape_vec((n, n), cells)?,
        })
    }

    pub fn get(&self, i: usize, j: usize) -> Material {
        self.cells[[i, j]]
    }

    pub fn cells(&self) -> &Array2<Material> {
        &self.cells
    }

    pub fn count(&self, material: Material) -> usize {
        self.cells.iter().filter(|&&m| m == material).count()
    }

    /// 1 where waves propagate, 0 on rigid cells.
    pub fn propagation_mask(&self) -> Array2<u8> {
        self.cells.mapv(|m| u8::from(m.propagates()))
    }

    pub fn codes(&self) -> Array2<u8> {
        self.cells.mapv(Material::code)
    }

    /// True when any axis neighbour of `(i, j)` has a different material.
    pub fn at_interface(&self, i: usize, j: usize) -> bool {
        let (rows, cols) = self.cells.dim();
        let here = self.cells[[i, j]];
        (i > 0 && self.cells[[i - 1, j]] != here)
            || (i + 1 < rows && self.cells[[i + 1, j]] != here)
            || (j > 0 && self.cells[[i, j - 1]] != here)
            || (j + 1 < cols && self.cells[[i, j + 1]] != here)
    }
}
