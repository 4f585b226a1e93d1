use std::path::Path;

use chrono::NaiveDate;
use plotters::prelude::*;

use crate::error::PipelineError;
use crate::table::Table;

const CHART_SIZE: (u32, u32) = (1000, 600);
const MARGIN: i32 = 30;

// Viridis endpoints for the presence/absence map.
const PRESENT: RGBColor = RGBColor(68, 1, 84);
const MISSING: RGBColor = RGBColor(253, 231, 37);

/// Null-occupancy map: one cell per (row, column), missing values highlighted.
pub fn null_map(table: &Table, path: &Path) -> Result<(), PipelineError> {
    let rows = table.num_rows();
    let cols = table.num_cols();
    if rows == 0 || cols == 0 {
        return Err(PipelineError::Chart {
            message: "cannot draw null map of an empty table".to_string(),
        });
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(PipelineError::chart)?;

    let (w, h) = CHART_SIZE;
    let cell_w = w as f64 / cols as f64;
    let cell_h = h as f64 / rows as f64;

    for (ci, col) in table.columns().iter().enumerate() {
        for (ri, value) in col.values.iter().enumerate() {
            let color = if value.is_null() { MISSING } else { PRESENT };
            let x0 = (ci as f64 * cell_w) as i32;
            let y0 = (ri as f64 * cell_h) as i32;
            let x1 = ((ci + 1) as f64 * cell_w).ceil() as i32;
            let y1 = ((ri + 1) as f64 * cell_h).ceil() as i32;
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], color.filled()))
                .map_err(PipelineError::chart)?;
        }
    }

    root.present().map_err(PipelineError::chart)?;
    Ok(())
}

/// Histogram of a numeric column, 20 equal-width bins. NaN and infinite
/// values are dropped before binning.
pub fn histogram(values: &[f64], path: &Path) -> Result<(), PipelineError> {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return Err(PipelineError::Chart {
            message: "no finite values to draw a histogram from".to_string(),
        });
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let bins: Vec<(f64, f64, usize)> = if max > min {
        const BINS: usize = 20;
        let span = max - min;
        let mut counts = vec![0usize; BINS];
        for v in &values {
            let idx = (((v - min) / span) * BINS as f64) as usize;
            counts[idx.min(BINS - 1)] += 1;
        }
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let lo = min + span * i as f64 / BINS as f64;
                let hi = min + span * (i + 1) as f64 / BINS as f64;
                (lo, hi, *c)
            })
            .collect()
    } else {
        // Degenerate distribution: a single bar around the lone value.
        vec![(min - 0.5, min + 0.5, values.len())]
    };

    let y_max = bins.iter().map(|(_, _, c)| *c).max().unwrap_or(1) as u32;
    let (x_lo, x_hi) = (bins[0].0, bins[bins.len() - 1].1);

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(PipelineError::chart)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(MARGIN)
        .build_cartesian_2d(x_lo..x_hi, 0u32..y_max + 1)
        .map_err(PipelineError::chart)?;

    chart
        .draw_series(bins.iter().map(|(lo, hi, c)| {
            Rectangle::new([(*lo, 0u32), (*hi, *c as u32)], BLUE.mix(0.6).filled())
        }))
        .map_err(PipelineError::chart)?;

    root.present().map_err(PipelineError::chart)?;
    Ok(())
}

/// Bar chart of category counts (already sorted, at most 10 entries).
pub fn bar_chart(counts: &[(String, usize)], path: &Path) -> Result<(), PipelineError> {
    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    if max_count == 0 {
        return Err(PipelineError::Chart {
            message: "no categories to draw".to_string(),
        });
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(PipelineError::chart)?;

    let (w, h) = CHART_SIZE;
    let plot_w = w as i32 - 2 * MARGIN;
    let plot_h = h as i32 - 2 * MARGIN;
    let step = plot_w as f64 / counts.len() as f64;

    for (i, (_, count)) in counts.iter().enumerate() {
        let bar_h = (plot_h as f64 * *count as f64 / max_count as f64) as i32;
        let x0 = MARGIN + (i as f64 * step + step * 0.1) as i32;
        let x1 = MARGIN + (i as f64 * step + step * 0.9) as i32;
        let y1 = h as i32 - MARGIN;
        let y0 = y1 - bar_h;
        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], BLUE.mix(0.8).filled()))
            .map_err(PipelineError::chart)?;
    }

    root.present().map_err(PipelineError::chart)?;
    Ok(())
}

/// Lower-triangular correlation heatmap. `matrix[i][j]` holds the Pearson
/// coefficient between numeric columns i and j, None for undefined pairs.
pub fn correlation_heatmap(matrix: &[Vec<Option<f64>>], path: &Path) -> Result<(), PipelineError> {
    let n = matrix.len();
    if n < 2 {
        return Err(PipelineError::Chart {
            message: "correlation heatmap needs at least two columns".to_string(),
        });
    }

    let root = BitMapBackend::new(path, (600, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(PipelineError::chart)?;

    let side = 600 - 2 * MARGIN;
    let cell = side as f64 / n as f64;

    for i in 0..n {
        // Strictly lower triangle, matching the masked upper half of the source.
        for j in 0..i {
            let color = match matrix[i][j] {
                Some(r) => diverging_color(r),
                None => RGBColor(220, 220, 220),
            };
            let x0 = MARGIN + (j as f64 * cell) as i32;
            let y0 = MARGIN + (i as f64 * cell) as i32;
            let x1 = MARGIN + ((j + 1) as f64 * cell) as i32 - 2;
            let y1 = MARGIN + ((i + 1) as f64 * cell) as i32 - 2;
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], color.filled()))
                .map_err(PipelineError::chart)?;
        }
    }

    root.present().map_err(PipelineError::chart)?;
    Ok(())
}

/// Maps r in [-1, 1] onto a blue-white-red scale.
fn diverging_color(r: f64) -> RGBColor {
    let r = r.clamp(-1.0, 1.0);
    let blend = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t) as u8;
    if r < 0.0 {
        let t = -r;
        RGBColor(blend(255, 59, t), blend(255, 76, t), blend(255, 192, t))
    } else {
        RGBColor(blend(255, 180, r), blend(255, 4, r), blend(255, 38, r))
    }
}

/// Monthly-mean time series, points pre-aggregated and sorted by date.
pub fn time_series(points: &[(NaiveDate, f64)], path: &Path) -> Result<(), PipelineError> {
    if points.is_empty() {
        return Err(PipelineError::Chart {
            message: "no points to draw a time series from".to_string(),
        });
    }

    let first = points[0].0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(d, _)| (*d - first).num_days() as f64)
        .collect();
    let ys: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

    let x_hi = xs.iter().cloned().fold(0.0, f64::max).max(1.0);
    let mut y_lo = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut y_hi = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if y_lo == y_hi {
        y_lo -= 1.0;
        y_hi += 1.0;
    }

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(PipelineError::chart)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(MARGIN)
        .build_cartesian_2d(0.0..x_hi, y_lo..y_hi)
        .map_err(PipelineError::chart)?;

    chart
        .draw_series(LineSeries::new(
            xs.into_iter().zip(ys),
            BLUE.stroke_width(2),
        ))
        .map_err(PipelineError::chart)?;

    root.present().map_err(PipelineError::chart)?;
    Ok(())
}
