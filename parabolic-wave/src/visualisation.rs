use anyhow::{anyhow, Result};
use ndarray::Array2;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::materials::{Material, MaterialMap};

const RIGID_COLOR: RGBColor = RGBColor(40, 40, 40);
const REFLECTOR_TINT: RGBColor = RGBColor(150, 150, 150);

/// Renders displacement frames as PNG heat maps with the reflectors overlaid.
pub struct FieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    // Store as a boxed trait object
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FieldVisualiser {
    pub fn new(output_dir: impl AsRef<Path>, width: u32, height: u32) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            anyhow!("Failed to create frame directory '{}': {}", output_dir.display(), e)
        })?;

        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Ok(Self {
            output_dir,
            width,
            height,
            gradient,
        })
    }

    pub fn frame_path(&self, step: u64) -> PathBuf {
        self.output_dir.join(format!("displacement_{:06}.png", step))
    }

    /// Draw one frame. Row 0 of `data` is the top of the image.
    pub fn plot_field(
        &self,
        data: &Array2<f64>,
        materials: &MaterialMap,
        step: u64,
    ) -> Result<PathBuf> {
        let path = self.frame_path(step);
        self.render(&path, data, materials)
            .map_err(|e| anyhow!("Failed to render '{}': {}", path.display(), e))?;
        debug!(file = %path.display(), "saved frame");
        Ok(path)
    }

    fn render(
        &self,
        path: &Path,
        data: &Array2<f64>,
        materials: &MaterialMap,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let (rows, cols) = data.dim();
        let max_abs = data.iter().map(|&v| v.abs()).fold(0.0_f64, f64::max);

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(0..cols, 0..rows)?;

        let cells = data.indexed_iter().map(|((i, j), &value)| {
            let color = match materials.get(i, j) {
                Material::Rigid => RIGID_COLOR,
                Material::Parabolic => blend(self.value_to_color(value, max_abs), REFLECTOR_TINT),
                Material::Air => self.value_to_color(value, max_abs),
            };
            let y = rows - 1 - i;
            Rectangle::new([(j, y), (j + 1, y + 1)], color.filled())
        });
        chart.draw_series(cells)?;

        root.present()?;
        Ok(())
    }

    /// Symmetric scale: zero maps to the middle of the gradient.
    fn value_to_color(&self, value: f64, max_abs: f64) -> RGBColor {
        let normalized = if max_abs > 0.0 {
            0.5 + 0.5 * value / max_abs
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}

fn blend(a: RGBColor, b: RGBColor) -> RGBColor {
    let mix = |x: u8, y: u8| ((x as u16 + y as u16) / 2) as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_averages_channels() {
        let c = blend(RGBColor(0, 100, 255), RGBColor(255, 100, 1));
        assert_eq!((c.0, c.1, c.2), (127, 100, 128));
    }

    #[test]
    fn frame_names_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let vis = FieldVisualiser::new(dir.path(), 64, 64).unwrap();
        assert!(vis.frame_path(7).ends_with("displacement_000007.png"));
    }
}
