//! Visualization utilities for backtest results.
//!
//! - ASCII sparklines for a quick look at an equity curve in the terminal
//! - PNG chart of the strategy and market curves with buy/sell markers
//!
//! Chart text needs a font backend; build with the `chart-labels` feature to
//! render the title, axis labels and legend text.
//!
//! # Example
//!
//! ```ignore
//! use quant_backtester::viz::{equity_sparkline, SignalChart};
//!
//! println!("Equity: {}", equity_sparkline(&curves, 40));
//! SignalChart::new("AAPL", &series, &curves).render_png(Path::new("AAPL_pnl_signals.png"))?;
//! ```

use crate::engine::{AugmentedSeries, CumulativeCurves};
use crate::error::{BacktestError, Result};
use crate::types::Signal;
use chrono::{TimeZone, Utc};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

/// Characters used for sparkline rendering, ordered from low to high.
const SPARKLINE_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Generate an ASCII sparkline at most `width` characters wide.
///
/// ```ignore
/// let spark = sparkline(&[1.0, 1.02, 1.01, 1.05, 1.08], 5);
/// assert_eq!(spark.chars().count(), 5);
/// ```
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }

    let sampled = if values.len() > width {
        downsample(values, width)
    } else {
        values.to_vec()
    };

    let min_val = sampled.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = sampled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max_val - min_val;

    sampled
        .iter()
        .map(|&val| {
            let normalized = if range > 0.0 {
                ((val - min_val) / range).clamp(0.0, 1.0)
            } else {
                0.5
            };
            SPARKLINE_CHARS[((normalized * 7.0).round() as usize).min(7)]
        })
        .collect()
}

/// Downsample a slice of values to a target length using averaging.
fn downsample(values: &[f64], target_len: usize) -> Vec<f64> {
    let chunk_size = values.len() as f64 / target_len as f64;
    let mut result = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let start = (i as f64 * chunk_size).floor() as usize;
        let end = (((i + 1) as f64 * chunk_size).ceil() as usize).min(values.len());
        if start < end {
            let sum: f64 = values[start..end].iter().sum();
            result.push(sum / (end - start) as f64);
        }
    }

    result
}

/// Sparkline of the strategy equity curve.
pub fn equity_sparkline(curves: &CumulativeCurves, width: usize) -> String {
    sparkline(&curves.strategy(), width)
}

/// Chart size in pixels.
const CHART_SIZE: (u32, u32) = (1200, 600);
const MARKER_SIZE: i32 = 7;
/// Dash pattern of the market curve: the time axis is cut into this many
/// slices and every other slice is drawn.
const DASH_SEGMENTS: usize = 120;

const STRATEGY_COLOR: RGBColor = RGBColor(31, 119, 180);
const MARKET_COLOR: RGBColor = RGBColor(128, 128, 128);
const BUY_COLOR: RGBColor = RGBColor(44, 160, 44);
const SELL_COLOR: RGBColor = RGBColor(214, 39, 40);

type ChartResult<DB> = std::result::Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

/// Cumulative-return chart for one ticker.
///
/// The strategy curve is solid, the market curve dashed. Every bar whose
/// signal is long gets an up-triangle and every short bar a down-triangle,
/// both placed on the strategy curve. Times are unix seconds as `f64`.
#[derive(Debug, Clone)]
pub struct SignalChart {
    title: String,
    strategy: Vec<(f64, f64)>,
    market: Vec<(f64, f64)>,
    buys: Vec<(f64, f64)>,
    sells: Vec<(f64, f64)>,
}

impl SignalChart {
    pub fn new(ticker: &str, series: &AugmentedSeries, curves: &CumulativeCurves) -> Self {
        let points = curves.points();
        let mut chart = Self {
            title: format!("{} Strategy with Buy/Sell Signals", ticker),
            strategy: Vec::with_capacity(points.len()),
            market: Vec::with_capacity(points.len()),
            buys: Vec::new(),
            sells: Vec::new(),
        };

        for (row, point) in series.rows().iter().zip(points) {
            let ts = point.timestamp.timestamp() as f64;
            chart.strategy.push((ts, point.strategy));
            chart.market.push((ts, point.market));
            match row.signal {
                Signal::Long => chart.buys.push((ts, point.strategy)),
                Signal::Short => chart.sells.push((ts, point.strategy)),
                Signal::Flat => {}
            }
        }
        chart
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn buys(&self) -> &[(f64, f64)] {
        &self.buys
    }

    pub fn sells(&self) -> &[(f64, f64)] {
        &self.sells
    }

    /// Render the chart to a PNG file at `path`.
    pub fn render_png(&self, path: &Path) -> Result<()> {
        if self.strategy.len() < 2 {
            return Err(BacktestError::ChartError(format!(
                "need at least 2 curve points, got {}",
                self.strategy.len()
            )));
        }

        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        self.draw(&root)
            .map_err(|e| BacktestError::ChartError(e.to_string()))
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> ChartResult<DB> {
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, ("sans-serif", 22).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(self.time_range(), self.value_range())?;

        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(8)
            .x_desc("Date")
            .y_desc("Cumulative Returns")
            .x_label_formatter(&|ts| timestamp_to_date_str(*ts))
            .y_label_formatter(&|v| format!("{:.2}", v))
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                self.strategy.iter().copied(),
                STRATEGY_COLOR.stroke_width(2),
            ))?
            .label("Strategy")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], STRATEGY_COLOR.stroke_width(2))
            });

        // plotters has no dashed stroke; draw alternating pieces instead.
        for piece in dash_pieces(&self.market, DASH_SEGMENTS) {
            chart.draw_series(LineSeries::new(piece, MARKET_COLOR.stroke_width(2)))?;
        }
        chart
            .draw_series(LineSeries::new(
                std::iter::empty::<(f64, f64)>(),
                MARKET_COLOR.stroke_width(2),
            ))?
            .label("Market")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 8, y)], MARKET_COLOR.stroke_width(2))
            });

        chart
            .draw_series(PointSeries::of_element(
                self.buys.iter().copied(),
                MARKER_SIZE,
                BUY_COLOR.filled(),
                &|coord, size, style| {
                    EmptyElement::at(coord) + TriangleMarker::new((0, 0), size, style)
                },
            ))?
            .label("Buy")
            .legend(|(x, y)| TriangleMarker::new((x + 10, y), MARKER_SIZE, BUY_COLOR.filled()));

        chart
            .draw_series(PointSeries::of_element(
                self.sells.iter().copied(),
                MARKER_SIZE,
                SELL_COLOR.filled(),
                &|coord, size, style| {
                    EmptyElement::at(coord) + TriangleMarker::new((0, 0), -size, style)
                },
            ))?
            .label("Sell")
            .legend(|(x, y)| {
                TriangleMarker::new((x + 10, y), -MARKER_SIZE, SELL_COLOR.filled())
            });

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn time_range(&self) -> Range<f64> {
        match (self.strategy.first(), self.strategy.last()) {
            (Some(first), Some(last)) if last.0 > first.0 => first.0..last.0,
            (Some(first), _) => first.0..first.0 + 86_400.0,
            _ => 0.0..86_400.0,
        }
    }

    fn value_range(&self) -> Range<f64> {
        let (lo, hi) = self
            .strategy
            .iter()
            .chain(&self.market)
            .map(|p| p.1)
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if lo.is_finite() && hi > lo {
            let margin = (hi - lo) * 0.05;
            (lo - margin)..(hi + margin)
        } else if lo.is_finite() {
            (lo - 0.05)..(lo + 0.05)
        } else {
            0.95..1.05
        }
    }
}

/// Split a polyline into the drawn pieces of a dash pattern along the x
/// axis. Each piece starts and ends on the line, interpolated where needed.
fn dash_pieces(points: &[(f64, f64)], segments: usize) -> Vec<Vec<(f64, f64)>> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let width = (last.0 - first.0) / segments.max(1) as f64;
    if width <= 0.0 {
        return vec![points.to_vec()];
    }

    (0..segments)
        .step_by(2)
        .map(|i| {
            let lo = first.0 + width * i as f64;
            let hi = lo + width;
            let mut piece = vec![(lo, interpolate(points, lo))];
            piece.extend(points.iter().copied().filter(|p| p.0 > lo && p.0 < hi));
            piece.push((hi, interpolate(points, hi)));
            piece
        })
        .collect()
}

/// Linear interpolation on points sorted by x; clamps outside the range.
fn interpolate(points: &[(f64, f64)], x: f64) -> f64 {
    let idx = points.partition_point(|p| p.0 < x);
    match (idx.checked_sub(1).and_then(|i| points.get(i)), points.get(idx)) {
        (Some(a), Some(b)) if b.0 > a.0 => a.1 + (b.1 - a.1) * (x - a.0) / (b.0 - a.0),
        (_, Some(b)) => b.1,
        (Some(a), None) => a.1,
        (None, None) => f64::NAN,
    }
}

fn timestamp_to_date_str(ts: f64) -> String {
    Utc.timestamp_opt(ts as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run;
    use crate::frame::SignalFrame;
    use crate::types::Bar;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn backtest(closes: &[f64], signals: &[i8]) -> (AugmentedSeries, CumulativeCurves) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_close(start + Duration::days(i as i64), c))
            .collect();
        let signals = signals
            .iter()
            .map(|&s| Signal::try_from(s).unwrap())
            .collect();
        run(&SignalFrame::new(bars).with_signals(signals).unwrap()).unwrap()
    }

    #[test]
    fn test_sparkline_basic() {
        let spark = sparkline(&[1.0, 2.0, 3.0, 4.0, 5.0], 5);
        assert_eq!(spark.chars().count(), 5);
        assert!(spark.starts_with('▁'));
        assert!(spark.ends_with('█'));
    }

    #[test]
    fn test_sparkline_downsamples_and_handles_flat() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(sparkline(&values, 20).chars().count(), 20);
        assert_eq!(sparkline(&[2.0; 4], 10), "▅▅▅▅");
        assert!(sparkline(&[], 10).is_empty());
    }

    #[test]
    fn test_chart_has_markers_for_every_positioned_bar() {
        let (series, curves) = backtest(
            &[100.0, 102.0, 101.0, 105.0, 103.0, 104.0],
            &[0, 1, 1, -1, 0, -1],
        );
        let chart = SignalChart::new("TEST", &series, &curves);

        assert_eq!(chart.title(), "TEST Strategy with Buy/Sell Signals");
        // Retained signals: 1, 1, -1, 0, -1.
        assert_eq!(chart.buys().len(), 2);
        assert_eq!(chart.sells().len(), 2);

        // Markers sit on the strategy curve.
        let strategy = curves.strategy();
        assert_eq!(chart.buys()[0].1, strategy[0]);
        assert_eq!(chart.sells()[1].1, strategy[4]);
    }

    #[test]
    fn test_render_png() {
        let (series, curves) = backtest(
            &[100.0, 102.0, 101.0, 105.0, 103.0, 104.0],
            &[0, 1, 1, -1, 0, -1],
        );
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("TEST_pnl_signals.png");

        SignalChart::new("TEST", &series, &curves)
            .render_png(&path)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn test_render_needs_two_points() {
        let chart = SignalChart {
            title: "ONE".to_string(),
            strategy: vec![(0.0, 1.0)],
            market: vec![(0.0, 1.0)],
            buys: Vec::new(),
            sells: Vec::new(),
        };
        let dir = TempDir::new().unwrap();
        let err = chart.render_png(&dir.path().join("ONE.png")).unwrap_err();
        assert_eq!(err.kind(), "ChartError");
    }

    #[test]
    fn test_dash_pieces_alternate() {
        let line = [(0.0, 0.0), (10.0, 10.0)];
        let pieces = dash_pieces(&line, 10);

        assert_eq!(pieces.len(), 5);
        assert_eq!(pieces[0], vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(pieces[1], vec![(2.0, 2.0), (3.0, 3.0)]);
        // Gaps between pieces.
        for pair in pieces.windows(2) {
            assert!(pair[1][0].0 > pair[0].last().unwrap().0);
        }
        assert!(dash_pieces(&[], 10).is_empty());
    }

    #[test]
    fn test_interpolate_clamps() {
        let points = [(0.0, 1.0), (2.0, 3.0), (4.0, 1.0)];
        assert_eq!(interpolate(&points, 1.0), 2.0);
        assert_eq!(interpolate(&points, 3.0), 2.0);
        assert_eq!(interpolate(&points, -1.0), 1.0);
        assert_eq!(interpolate(&points, 9.0), 1.0);
    }
}
