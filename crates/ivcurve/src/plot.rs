//! PNG rendering of IV curves with plotters

use crate::colors::{curve_color, reference_color};
use crate::curve::{auto_range, log_points};
use crate::{IvCurve, IvError, IvResult};
use plotters::coord::ranged1d::{Ranged, ValueFormatter};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YScale {
    Linear,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
}

/// One drawn line with its legend entry
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub marker: Marker,
}

/// A titled chart of one or more series
#[derive(Debug, Clone)]
pub struct IvPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
    pub y_scale: YScale,
    /// Fixed X range; auto-scaled when `None`
    pub x_range: Option<(f64, f64)>,
    /// Fixed Y range; auto-scaled when `None`
    pub y_range: Option<(f64, f64)>,
    pub series: Vec<Series>,
}

impl IvPlot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: "Voltage (V)".to_string(),
            y_label: "Current (A)".to_string(),
            width: 1200,
            height: 800,
            y_scale: YScale::Linear,
            x_range: None,
            y_range: None,
            series: Vec::new(),
        }
    }

    pub fn axis_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = x.into();
        self.y_label = y.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn y_scale(mut self, scale: YScale) -> Self {
        self.y_scale = scale;
        self
    }

    pub fn ranges(mut self, x: Option<(f64, f64)>, y: Option<(f64, f64)>) -> Self {
        self.x_range = x;
        self.y_range = y;
        self
    }

    pub fn with_series(mut self, series: Vec<Series>) -> Self {
        self.series = series;
        self
    }

    /// Series as drawn; log plots lose non-positive currents
    pub fn drawable_series(&self) -> Vec<Series> {
        self.series
            .iter()
            .map(|s| match self.y_scale {
                YScale::Linear => s.clone(),
                YScale::Log => {
                    let points = log_points(&s.points);
                    if points.len() < s.points.len() {
                        debug!(
                            series = %s.label,
                            dropped = s.points.len() - points.len(),
                            "Dropped non-positive currents from log plot"
                        );
                    }
                    Series {
                        points,
                        ..s.clone()
                    }
                }
            })
            .collect()
    }

    /// Explicit ranges, or the data's padded extent
    pub fn resolved_ranges(&self, series: &[Series]) -> IvResult<((f64, f64), (f64, f64))> {
        let all = || series.iter().flat_map(|s| s.points.iter().copied());

        let x = match self.x_range {
            Some(r) => r,
            None => auto_range(all().map(|(v, _)| v), false)
                .ok_or_else(|| IvError::InvalidData("no points to plot".to_string()))?,
        };
        let y = match self.y_range {
            Some(r) => r,
            None => auto_range(all().map(|(_, i)| i), self.y_scale == YScale::Log)
                .ok_or_else(|| IvError::InvalidData("no points to plot".to_string()))?,
        };
        Ok((x, y))
    }

    pub fn render(&self, output_path: &Path) -> IvResult<()> {
        let series = self.drawable_series();
        let (x, y) = self.resolved_ranges(&series)?;

        let root = BitMapBackend::new(output_path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)
            .map_err(|e| IvError::DrawingArea(e.to_string()))?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .caption(&self.title, ("sans-serif", 32))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(90);

        match self.y_scale {
            YScale::Linear => {
                let chart = builder
                    .build_cartesian_2d(x.0..x.1, y.0..y.1)
                    .map_err(|e| IvError::ChartConfig(e.to_string()))?;
                draw_chart(chart, self, &series)?;
            }
            YScale::Log => {
                let chart = builder
                    .build_cartesian_2d(x.0..x.1, (y.0..y.1).log_scale())
                    .map_err(|e| IvError::ChartConfig(e.to_string()))?;
                draw_chart(chart, self, &series)?;
            }
        }

        root.present()
            .map_err(|e| IvError::Drawing(e.to_string()))?;
        info!(path = ?output_path, series = series.len(), "Plot saved");
        Ok(())
    }
}

fn draw_chart<'a, 'b: 'a, Y>(
    mut chart: ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, Y>>,
    plot: &IvPlot,
    series: &[Series],
) -> IvResult<()>
where
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    chart
        .configure_mesh()
        .x_desc(plot.x_label.as_str())
        .y_desc(plot.y_label.as_str())
        .label_style(("sans-serif", 20))
        .draw()
        .map_err(|e| IvError::Drawing(e.to_string()))?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(2)))
            .map_err(|e| IvError::Drawing(e.to_string()))?
            .label(s.label.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });

        match s.marker {
            Marker::Circle => chart
                .draw_series(s.points.iter().map(|&p| Circle::new(p, 3, color.filled())))
                .map_err(|e| IvError::Drawing(e.to_string()))?,
            Marker::Square => chart
                .draw_series(s.points.iter().map(|&p| {
                    EmptyElement::at(p) + Rectangle::new([(-4, -4), (4, 4)], color.filled())
                }))
                .map_err(|e| IvError::Drawing(e.to_string()))?,
        };
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 18))
        .draw()
        .map_err(|e| IvError::Drawing(e.to_string()))?;

    Ok(())
}

/// Database curves in tab20 colours followed by square-marked references
///
/// Colours are indexed over all curves, references included, so skipped
/// curves still consume their slot.
pub fn comparison_series(curves: &[IvCurve], references: &[IvCurve]) -> Vec<Series> {
    let total = curves.len() + references.len();
    let mut series = Vec::with_capacity(total);

    for (i, curve) in curves.iter().enumerate() {
        match curve.check() {
            Ok(()) => series.push(Series {
                label: curve.label.clone(),
                points: curve.points(),
                color: curve_color(i, total),
                marker: Marker::Circle,
            }),
            Err(issue) => match &curve.origin {
                Some(origin) => warn!(
                    module = %origin.module,
                    test_no = %origin.test_no,
                    %issue,
                    "Skipping {}",
                    curve.identity()
                ),
                None => warn!(curve = %curve.label, %issue, "Skipping curve"),
            },
        }
    }

    for (i, reference) in references.iter().enumerate() {
        match reference.check() {
            Ok(()) => series.push(Series {
                label: reference.label.clone(),
                points: reference.points(),
                color: reference_color(i),
                marker: Marker::Square,
            }),
            Err(issue) => warn!(reference = %reference.label, %issue, "Skipping reference curve"),
        }
    }

    series
}

/// Chart title for a MAC comparison
pub fn comparison_title(mac: &str, modules: Option<&str>, reference_site: Option<&str>) -> String {
    match (modules, reference_site) {
        (None, _) => "IV Curves for All Module Tests".to_string(),
        (Some(m), Some(site)) => format!("IV Curves for {} vs {} for {}", mac, site, m),
        (Some(m), None) => format!("IV Curves for {} for {}", mac, m),
    }
}

pub fn comparison_file_name(mac: &str, modules: &str, scale: YScale) -> String {
    match scale {
        YScale::Log => format!("iv_curves_{}_{}_logscale.png", mac, modules),
        YScale::Linear => format!("iv_curves_{}_{}.png", mac, modules),
    }
}
