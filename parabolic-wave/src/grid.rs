use crate::error::FieldError;
use crate::geometry::Point2D;

/// Uniform N x N grid over `[x_min, x_max] x [y_min, y_max]`.
///
/// Row `i` runs from `y_max` downwards, column `j` from `x_min` rightwards, and
/// cells are stored row-major at `i * n + j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub n: usize,  // Points per side
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub dx: f64,   // Column spacing (mm)
    pub dy: f64,   // Row spacing (mm)
}

impl Grid {
    pub fn new(n: usize, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self, FieldError> {
        if n < 3 {
            return Err(FieldError::GridTooSmall(n));
        }
        let check = |axis: char, min: f64, max: f64| {
            if min.is_finite() && max.is_finite() && max > min {
                Ok(())
            } else {
                Err(FieldError::DegenerateDomain { axis, min, max })
            }
        };
        check('x', x_min, x_max)?;
        check('y', y_min, y_max)?;

        let cells = (n - 1) as f64;
        Ok(Grid {
            n,
            x_min,
            x_max,
            y_min,
            y_max,
            dx: (x_max - x_min) / cells,
            dy: (y_max - y_min) / cells,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.n * self.n
    }

    pub fn index(&self, i: usize, j: usize) -> usize {
        i * self.n + j
    }

    pub fn x_coord(&self, j: usize) -> f64 {
        self.x_min + j as f64 * self.dx
    }

    pub fn y_coord(&self, i: usize) -> f64 {
        self.y_max - i as f64 * self.dy
    }

    pub fn position(&self, i: usize, j: usize) -> Point2D {
        Point2D::new(self.x_coord(j), self.y_coord(i))
    }

    /// Nearest cell to a physical point, clamped into the grid.
    pub fn nearest_cell(&self, p: Point2D) -> (usize, usize) {
        let last = (self.n - 1) as f64;
        let i = ((self.y_max - p.y) / self.dy).round().clamp(0.0, last);
        let j = ((p.x - self.x_min) / self.dx).round().clamp(0.0, last);
        (i as usize, j as usize)
    }

    pub fn contains(&self, p: Point2D) -> bool {
        (self.x_min..=self.x_max).contains(&p.x) && (self.y_min..=self.y_max).contains(&p.y)
    }

    pub fn in_bounds(&self, i: isize, j: isize) -> bool {
        let n = self.n as isize;
        (0..n).contains(&i) && (0..n).contains(&j)
    }

    pub fn is_edge(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i == self.n - 1 || j == self.n - 1
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn min_spacing(&self) -> f64 {
        self.dx.min(self.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> Grid {
        Grid::new(301, -300.0, 300.0, -100.0, 150.0).unwrap()
    }

    #[test]
    fn spacing_from_extent() {
        let g = reference();
        assert_relative_eq!(g.dx, 2.0);
        assert_relative_eq!(g.dy, 250.0 / 300.0);
        assert_eq!(g.cell_count(), 301 * 301);
        assert_eq!((g.width(), g.height()), (600.0, 250.0));
        assert_relative_eq!(g.min_spacing(), g.dy);
    }

    #[test]
    fn rows_descend_in_y() {
        let g = reference();
        assert_eq!(g.position(0, 0), Point2D::new(-300.0, 150.0));
        assert_relative_eq!(g.y_coord(300), -100.0, epsilon = 1e-9);
        assert_relative_eq!(g.x_coord(300), 300.0);
        assert_eq!(g.index(2, 5), 2 * 301 + 5);
    }

    #[test]
    fn nearest_cell_clamps_outside_points() {
        let g = reference();
        assert_eq!(g.nearest_cell(Point2D::new(0.0, 150.0)), (0, 150));
        assert_eq!(g.nearest_cell(Point2D::new(-1e6, 1e6)), (0, 0));
        assert_eq!(g.nearest_cell(Point2D::new(1e6, -1e6)), (300, 300));
    }

    #[test]
    fn rejects_small_or_degenerate_grids() {
        assert!(matches!(
            Grid::new(2, 0.0, 1.0, 0.0, 1.0),
            Err(FieldError::GridTooSmall(2))
        ));
        assert!(Grid::new(10, 1.0, 1.0, 0.0, 1.0).is_err());
        assert!(Grid::new(10, 0.0, 1.0, 0.0, f64::INFINITY).is_err());
    }
}
