//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line
//! - reference curve: `.` line

use crate::plot::PlotData;

/// Render a fixed-size plot of the observations, fitted curve and optional reference.
pub fn render_ascii_plot(data: &PlotData, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (t_min, t_max) = data.x_bounds();
    let (y_min, y_max) = data.y_bounds(0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Fitted curve first so it wins over the reference where they overlap;
    // points are stamped last.
    draw_curve(&mut grid, &data.curve, (t_min, t_max), (y_min, y_max), '-');
    if let Some(reference) = &data.reference {
        draw_curve(&mut grid, reference, (t_min, t_max), (y_min, y_max), '.');
    }

    for &(t, h) in &data.points {
        if !(t.is_finite() && h.is_finite()) {
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(h, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] s | h=[{y_min:.3}, {y_max:.3}] m\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out.push_str(&format!("o data  - {}", data.fit_label()));
    if data.reference.is_some() {
        out.push_str(&format!("  . {}", data.reference_label()));
    }
    out.push('\n');

    out
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_range: (f64, f64), y_range: (f64, f64), ch: char) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, h) in curve {
        if !(t.is_finite() && h.is_finite()) {
            prev = None;
            continue;
        }
        let x = map_x(t, x_range.0, x_range.1, width);
        let y = map_y(h, y_range.0, y_range.1, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, y, ch),
            None if grid[y][x] == ' ' => grid[y][x] = ch,
            None => {}
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham-ish). Only fills empty cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    fn small_plot(reference: Option<Vec<(f64, f64)>>) -> PlotData {
        // h = 5t² sampled at 10 points over [0, 2].
        let curve = (0..10)
            .map(|i| {
                let t = 2.0 * i as f64 / 9.0;
                (t, 5.0 * t * t)
            })
            .collect();
        PlotData {
            points: vec![(0.0, 0.0), (1.0, 5.0), (2.0, 20.0)],
            curve,
            reference,
            kind: ModelKind::FreeFall,
            g: 10.0,
            g_std_error: 0.0,
            r_squared: Some(1.0),
            g_ref: 9.8,
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_ascii_plot(&small_plot(None), 10, 5);
        let expected = concat!(
            "Plot: t=[0.000, 2.000] s | h=[-1.000, 21.000] m\n",
            "         o\n",
            "        - \n",
            "      --  \n",
            "   --o    \n",
            "o--       \n",
            "o data  - Fit (g = 10.000 m/s²)\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn reference_curve_fills_free_cells() {
        // A flat reference line along h = 10 crosses the middle row.
        let reference = vec![(0.0, 10.0), (2.0, 10.0)];
        let txt = render_ascii_plot(&small_plot(Some(reference)), 10, 5);
        let lines: Vec<&str> = txt.lines().collect();

        assert_eq!(lines[3], "......--..");
        assert!(lines[6].ends_with("  . Reference (g = 9.8)"));
    }
}
