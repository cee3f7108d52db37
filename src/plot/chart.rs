//! Annotated SVG chart of the fit.
//!
//! Layout:
//! - blue scatter of the observations
//! - red fitted curve, optional dashed green reference curve
//! - dashed light grid, axis labels and title
//! - legend in the lower right, annotation box (equation, `g ± σ`, R², error) in the upper left

use std::path::Path;

use plotters::coord::Shift;
use plotters::coord::ranged1d::Ranged;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use thiserror::Error;

use crate::error::AppError;
use crate::plot::PlotData;

pub const DEFAULT_CHART_SIZE: (u32, u32) = (1000, 700);

const TITLE: &str = "Free-Fall Motion Data Fit";
const WHEAT: RGBColor = RGBColor(245, 222, 179);
const DATA_BLUE: RGBColor = RGBColor(31, 119, 180);
const FIT_RED: RGBColor = RGBColor(214, 39, 40);
const REFERENCE_GREEN: RGBColor = RGBColor(44, 160, 44);

/// Errors that can occur during chart generation.
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Failed to save chart to '{path}': {message}")]
    FileSave { path: String, message: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<PlotError> for AppError {
    fn from(err: PlotError) -> Self {
        AppError::input(err.to_string())
    }
}

type Result<T> = core::result::Result<T, PlotError>;

/// Render the annotated chart to an SVG file.
pub fn render_svg_chart(data: &PlotData, path: &Path, size: (u32, u32)) -> Result<()> {
    if data.points.is_empty() {
        return Err(PlotError::InvalidData("No observations to plot".to_string()));
    }
    if data.curve.len() < 2 {
        return Err(PlotError::InvalidData("Fitted curve needs at least two samples".to_string()));
    }

    let (x0, x1) = data.x_bounds();
    let (y0, y1) = data.y_bounds(0.05);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 28).into_font().style(FontStyle::Bold))
        .margin(20)
        .x_label_area_size(55)
        .y_label_area_size(75)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    // Mesh lines are solid in plotters; draw the grid ourselves (dashed, light)
    // on the same key points the axis labels use.
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(10)
        .y_labels(10)
        .x_desc("Time (s)")
        .y_desc("Displacement (m)")
        .axis_desc_style(("sans-serif", 20))
        .label_style(("sans-serif", 15))
        .x_label_formatter(&|v| format!("{v:.2}"))
        .y_label_formatter(&|v| format!("{v:.2}"))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let grid_style = BLACK.mix(0.15).stroke_width(1);
    for x in RangedCoordf64::from(x0..x1).key_points(10usize) {
        chart
            .draw_series(DashedLineSeries::new(vec![(x, y0), (x, y1)], 6, 4, grid_style))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }
    for y in RangedCoordf64::from(y0..y1).key_points(10usize) {
        chart
            .draw_series(DashedLineSeries::new(vec![(x0, y), (x1, y)], 6, 4, grid_style))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    if let Some(reference) = &data.reference {
        let style = REFERENCE_GREEN.stroke_width(2);
        chart
            .draw_series(DashedLineSeries::new(reference.clone(), 10, 6, style))
            .map_err(|e| PlotError::Drawing(e.to_string()))?
            .label(data.reference_label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    let fit_style = FIT_RED.stroke_width(2);
    chart
        .draw_series(LineSeries::new(data.curve.iter().copied(), fit_style))
        .map_err(|e| PlotError::Drawing(e.to_string()))?
        .label(data.fit_label())
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], fit_style));

    let point_style = DATA_BLUE.mix(0.7).filled();
    chart
        .draw_series(
            data.points
                .iter()
                .map(|&(t, h)| Circle::new((t, h), 5, point_style)),
        )
        .map_err(|e| PlotError::Drawing(e.to_string()))?
        .label("Experimental data")
        .legend(move |(x, y)| Circle::new((x + 10, y), 5, point_style));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK.mix(0.4))
        .label_font(("sans-serif", 16))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    draw_annotation(&chart.plotting_area().strip_coord_spec(), &data.annotation_lines())?;

    root.present().map_err(|e| PlotError::FileSave {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(())
}

/// Wheat-coloured text box pinned to the upper-left corner of the plotting area.
fn draw_annotation<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, lines: &[String]) -> Result<()> {
    const FONT_SIZE: i32 = 15;
    const LINE_HEIGHT: i32 = 21;
    const PAD: i32 = 10;
    const INSET: i32 = 12;

    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
    // Rough glyph advance for a 15px sans-serif font.
    let box_w = widest * FONT_SIZE * 6 / 10 + 2 * PAD;
    let box_h = lines.len() as i32 * LINE_HEIGHT + 2 * PAD - (LINE_HEIGHT - FONT_SIZE);

    let top_left = (INSET, INSET);
    let bottom_right = (INSET + box_w, INSET + box_h);

    area.draw(&Rectangle::new([top_left, bottom_right], WHEAT.mix(0.8).filled()))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    area.draw(&Rectangle::new([top_left, bottom_right], BLACK.mix(0.3).stroke_width(1)))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let font = ("sans-serif", 15).into_font().color(&BLACK);
    for (i, line) in lines.iter().enumerate() {
        let y = INSET + PAD + i as i32 * LINE_HEIGHT;
        area.draw(&Text::new(line.clone(), (INSET + PAD, y), font.clone()))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::demo_observations;
    use crate::domain::ModelKind;
    use crate::fit::{FitOptions, fit_model};

    fn demo_plot(reference: bool) -> PlotData {
        let observations = demo_observations();
        let fit = fit_model(ModelKind::FreeFall, &observations, &FitOptions::default()).unwrap();
        PlotData::from_fit(&observations, &fit, 9.8, reference)
    }

    #[test]
    fn writes_annotated_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        render_svg_chart(&demo_plot(true), &path, DEFAULT_CHART_SIZE).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(TITLE));
        assert!(svg.contains("Fit (g = 9.800 m/s²)"));
        assert!(svg.contains("Reference (g = 9.8)"));
        assert!(svg.contains("Experimental data"));
        assert!(svg.contains("R² = 1.0000"));
        assert!(svg.contains("Time (s)"));
    }

    #[test]
    fn reference_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        render_svg_chart(&demo_plot(false), &path, DEFAULT_CHART_SIZE).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(!svg.contains("Reference"));
    }

    #[test]
    fn empty_data_is_rejected() {
        let mut data = demo_plot(false);
        data.points.clear();
        let dir = tempfile::tempdir().unwrap();
        let err = render_svg_chart(&data, &dir.path().join("x.svg"), DEFAULT_CHART_SIZE).unwrap_err();
        assert!(matches!(err, PlotError::InvalidData(_)));
        assert_eq!(AppError::from(err).exit_code(), 2);
    }
}
