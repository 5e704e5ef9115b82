//! PNG figures rendered with `plotters` on the bitmap backend.
//!
//! Captions and tick labels are drawn with DejaVu Sans, compiled into the
//! crate and registered with plotters' `ab_glyph` renderer on first use, so
//! rendering needs no system fonts.

use crate::core::models::potential::PotentialSurface;
use crate::core::models::sample::DistancePair;
use crate::core::physics::constants::DomainBounds;
use plotters::prelude::*;
use plotters::style::register_font;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const FIGURE_SIZE: (u32, u32) = (1200, 900);
pub const DEFAULT_GRID_RESOLUTION: usize = 100;

/// Family name plotters uses for captions and mesh labels by default.
const FONT_FAMILY: &str = "sans-serif";
const CAPTION_FONT: (&str, u32) = (FONT_FAMILY, 28);
static EMBEDDED_FONT: &[u8] = include_bytes!("../../../assets/DejaVuSans.ttf");
static FONT_REGISTERED: OnceLock<bool> = OnceLock::new();

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Failed to render '{path}': {message}")]
    Render { path: String, message: String },
    #[error("Cannot plot '{path}': {left} values against {right}")]
    LengthMismatch {
        path: String,
        left: usize,
        right: usize,
    },
    #[error("The embedded plotting font could not be loaded")]
    Font,
}

/// Registers the embedded font with plotters once per process.
fn ensure_font() -> Result<(), PlotError> {
    let registered = *FONT_REGISTERED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, EMBEDDED_FONT).is_ok());
    if registered {
        Ok(())
    } else {
        Err(PlotError::Font)
    }
}

type DrawResult = Result<(), Box<dyn std::error::Error>>;

fn finish(path: &Path, result: DrawResult) -> Result<(), PlotError> {
    result.map_err(|e| PlotError::Render {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })
}

/// Axis titles and caption shared by every figure.
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Surface values on a regular `(r12, r23)` grid, row-major in `r23`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGrid {
    pub r12: Vec<f64>,
    pub r23: Vec<f64>,
    pub values: Vec<f64>,
}

impl SurfaceGrid {
    pub fn sample<S: PotentialSurface + ?Sized>(
        surface: &S,
        window: &DomainBounds,
        resolution: usize,
    ) -> Self {
        let n = resolution.max(2);
        let r12 = linspace(window.r12.0, window.r12.1, n);
        let r23 = linspace(window.r23.0, window.r23.1, n);
        let points: Vec<DistancePair> = r23
            .iter()
            .flat_map(|&y| r12.iter().map(move |&x| DistancePair::new(x, y)))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = points.iter();

        #[cfg(feature = "parallel")]
        let iterator = points.par_iter();

        let values = iterator.map(|&p| surface.energy(p)).collect();
        Self { r12, r23, values }
    }

    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.r12.len() + col]
    }

    pub fn value_range(&self) -> (f64, f64) {
        finite_bounds(self.values.iter().copied()).unwrap_or((0.0, 1.0))
    }

    /// Grid cells as `(x0, y0, x1, y1, mean of the four corners)`.
    fn cells(&self) -> impl Iterator<Item = (f64, f64, f64, f64, f64)> + '_ {
        let cols = self.r12.len().saturating_sub(1);
        let rows = self.r23.len().saturating_sub(1);
        (0..rows).flat_map(move |i| {
            (0..cols).map(move |j| {
                let v = 0.25
                    * (self.value(i, j)
                        + self.value(i, j + 1)
                        + self.value(i + 1, j)
                        + self.value(i + 1, j + 1));
                (self.r12[j], self.r23[i], self.r12[j + 1], self.r23[i + 1], v)
            })
        })
    }
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Axis range covering `values` with a 5% margin; never zero-width.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    match finite_bounds(values) {
        None => 0.0..1.0,
        Some((lo, hi)) if (hi - lo).abs() < 1e-12 => {
            let pad = lo.abs().max(1.0) * 0.05;
            (lo - pad)..(hi + pad)
        }
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad)..(hi + pad)
        }
    }
}

/// Sequential palette from deep blue (`t = 0`) to yellow (`t = 1`).
pub fn sequential_color(t: f64) -> HSLColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    HSLColor(0.72 - 0.56 * t, 0.8, 0.25 + 0.4 * t)
}

/// Diverging palette: blue for negative, white at zero, red for positive.
pub fn diverging_color(t: f64) -> HSLColor {
    let t = if t.is_finite() { t.clamp(-1.0, 1.0) } else { 0.0 };
    let hue = if t < 0.0 { 0.6 } else { 0.0 };
    HSLColor(hue, 0.75, 1.0 - 0.55 * t.abs())
}

/// Filled surface with an optional visited path drawn on top.
pub fn render_surface(
    path: &Path,
    grid: &SurfaceGrid,
    overlay: &[DistancePair],
    labels: Labels,
) -> Result<(), PlotError> {
    ensure_font()?;
    finish(path, draw_surface(path, grid, overlay, labels))
}

fn draw_surface(
    path: &Path,
    grid: &SurfaceGrid,
    overlay: &[DistancePair],
    labels: Labels,
) -> DrawResult {
    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_range = padded_range(grid.r12.iter().copied());
    let y_range = padded_range(grid.r23.iter().copied());
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range.clone())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(labels.x)
        .y_desc(labels.y)
        .draw()?;

    let (lo, hi) = grid.value_range();
    let span = (hi - lo).max(f64::EPSILON);
    chart.draw_series(grid.cells().map(|(x0, y0, x1, y1, v)| {
        Rectangle::new([(x0, y0), (x1, y1)], sequential_color((v - lo) / span).filled())
    }))?;

    chart.draw_series(
        overlay
            .iter()
            .filter(|p| x_range.contains(&p.r12) && y_range.contains(&p.r23))
            .map(|p| Circle::new((p.r12, p.r23), 3, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Line plot of `values` against their index.
pub fn render_series(path: &Path, values: &[f64], labels: Labels) -> Result<(), PlotError> {
    ensure_font()?;
    finish(path, draw_series(path, values, labels))
}

fn draw_series(path: &Path, values: &[f64], labels: Labels) -> DrawResult {
    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = values.len().max(2) as f64 - 1.0;
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0.0..x_max, padded_range(values.iter().copied()))?;

    chart
        .configure_mesh()
        .x_desc(labels.x)
        .y_desc(labels.y)
        .draw()?;

    let points = || {
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (i as f64, v))
    };
    chart.draw_series(LineSeries::new(points(), &BLUE))?;
    chart.draw_series(points().map(|p| Circle::new(p, 2, BLUE.filled())))?;

    root.present()?;
    Ok(())
}

/// Scatter of predicted against reference values with the identity line.
pub fn render_parity(
    path: &Path,
    reference: &[f64],
    predicted: &[f64],
    labels: Labels,
) -> Result<(), PlotError> {
    check_lengths(path, reference.len(), predicted.len())?;
    ensure_font()?;
    finish(path, draw_parity(path, reference, predicted, labels))
}

fn draw_parity(path: &Path, reference: &[f64], predicted: &[f64], labels: Labels) -> DrawResult {
    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let range = padded_range(reference.iter().chain(predicted).copied());
    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(range.clone(), range.clone())?;

    chart
        .configure_mesh()
        .x_desc(labels.x)
        .y_desc(labels.y)
        .draw()?;

    if let Some((lo, hi)) = finite_bounds(reference.iter().copied()) {
        chart.draw_series(LineSeries::new([(lo, lo), (hi, hi)], BLACK.stroke_width(2)))?;
    }
    chart.draw_series(
        reference
            .iter()
            .zip(predicted)
            .filter(|(r, p)| r.is_finite() && p.is_finite())
            .map(|(&r, &p)| Circle::new((r, p), 3, BLUE.mix(0.7).filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Signed errors at scattered sample coordinates.
pub fn render_error_map(
    path: &Path,
    coords: &[DistancePair],
    errors: &[f64],
    labels: Labels,
) -> Result<(), PlotError> {
    check_lengths(path, coords.len(), errors.len())?;
    ensure_font()?;
    finish(path, draw_error_map(path, coords, errors, labels))
}

fn draw_error_map(
    path: &Path,
    coords: &[DistancePair],
    errors: &[f64],
    labels: Labels,
) -> DrawResult {
    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(labels.title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(
            padded_range(coords.iter().map(|p| p.r12)),
            padded_range(coords.iter().map(|p| p.r23)),
        )?;

    chart
        .configure_mesh()
        .x_desc(labels.x)
        .y_desc(labels.y)
        .draw()?;

    let scale = errors
        .iter()
        .filter(|e| e.is_finite())
        .fold(0.0f64, |m, e| m.max(e.abs()))
        .max(f64::EPSILON);
    chart.draw_series(
        coords
            .iter()
            .zip(errors)
            .map(|(p, &e)| Circle::new((p.r12, p.r23), 5, diverging_color(e / scale).filled())),
    )?;

    root.present()?;
    Ok(())
}

fn check_lengths(path: &Path, left: usize, right: usize) -> Result<(), PlotError> {
    if left != right {
        return Err(PlotError::LengthMismatch {
            path: path.to_string_lossy().to_string(),
            left,
            right,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::potential::SurfacePoint;
    use std::fs;
    use tempfile::tempdir;

    struct Bowl;

    impl PotentialSurface for Bowl {
        fn energy(&self, c: DistancePair) -> f64 {
            0.5 * (c.r12 * c.r12 + c.r23 * c.r23)
        }

        fn energy_and_gradient(&self, c: DistancePair) -> SurfacePoint {
            SurfacePoint {
                energy: self.energy(c),
                gradient: [c.r12, c.r23],
            }
        }
    }

    const LABELS: Labels = Labels {
        title: "Test",
        x: "x",
        y: "y",
    };

    #[test]
    fn linspace_includes_both_ends() {
        let v = linspace(0.5, 4.0, 8);
        assert_eq!(v.len(), 8);
        assert_eq!(v[0], 0.5);
        assert!((v[7] - 4.0).abs() < 1e-12);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn grid_is_row_major_in_r23() {
        let window = DomainBounds::default().contour_window();
        let grid = SurfaceGrid::sample(&Bowl, &window, 5);
        assert_eq!(grid.values.len(), 25);
        let expected = Bowl.energy(DistancePair::new(grid.r12[3], grid.r23[1]));
        assert_eq!(grid.value(1, 3), expected);
        assert_eq!(grid.cells().count(), 16);
    }

    #[test]
    fn padded_range_is_never_degenerate() {
        let r = padded_range([2.0, 2.0].into_iter());
        assert!(r.end > r.start);
        let empty = padded_range(std::iter::empty());
        assert_eq!(empty, 0.0..1.0);
    }

    #[test]
    fn surface_and_series_render_png_files() {
        let dir = tempdir().unwrap();
        let surface_path = dir.path().join("md.png");
        let grid = SurfaceGrid::sample(&Bowl, &DomainBounds::default().contour_window(), 10);
        let path = [DistancePair::new(3.0, 1.1), DistancePair::new(2.5, 1.2)];
        render_surface(&surface_path, &grid, &path, LABELS).unwrap();
        assert!(fs::metadata(&surface_path).unwrap().len() > 0);

        let series_path = dir.path().join("energy.png");
        render_series(&series_path, &[], LABELS).unwrap();
        render_series(&series_path, &[1.0, 1.0, 1.0], LABELS).unwrap();
        assert!(fs::metadata(&series_path).unwrap().len() > 0);
    }

    #[test]
    fn parity_rejects_mismatched_lengths() {
        let dir = tempdir().unwrap();
        let result = render_parity(&dir.path().join("p.png"), &[1.0, 2.0], &[1.0], LABELS);
        assert!(matches!(result, Err(PlotError::LengthMismatch { .. })));
    }

    #[test]
    fn embedded_font_registers_and_measures_text() {
        ensure_font().unwrap();
        let font: FontDesc = (FONT_FAMILY, 20).into_font();
        let (w, h) = font.box_size("r12 / Å").unwrap();
        assert!(w > 0 && h > 0);
    }

    #[test]
    fn captioned_parity_plot_renders_png() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("assess.png");
        render_parity(
            &out,
            &[1.0, 2.0, 3.0],
            &[1.1, 1.9, 3.2],
            Labels {
                title: "Predicted against reference energy",
                x: "reference",
                y: "predicted",
            },
        )
        .unwrap();
        assert!(fs::metadata(&out).unwrap().len() > 0);
    }

    #[test]
    fn error_map_renders_png() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("error.png");
        let coords = [DistancePair::new(1.0, 1.0), DistancePair::new(2.0, 1.5)];
        render_error_map(&out, &coords, &[-0.1, 0.2], LABELS).unwrap();
        assert!(out.exists());
    }
}
