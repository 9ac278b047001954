//! Terminal chart for `stim graph`.
//!
//! The chart is drawn into an off-screen ratatui buffer and printed as plain
//! text, so no terminal backend or alternate screen is involved.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::symbols::Marker;
use ratatui::widgets::{Axis, Block, Chart, Dataset, GraphType, Widget};
use stim_core::clock::{to_epoch_seconds, to_local, SECONDS_PER_HOUR};
use stim_core::projection::next_occurrence;
use stim_core::{DoseStore, ReferenceTime, Result};

pub const WIDTH: u16 = 120;
pub const HEIGHT: u16 = 30;

/// Plot one projected dot per this many samples
const PROJECTED_DOT_EVERY: usize = 15;
const X_LABELS: usize = 5;

/// Chart data with x in hours relative to now
#[derive(Debug, Default)]
pub struct GraphSeries {
    pub hours_back: u32,
    pub projection_hours: u32,
    pub now: f64,
    pub historical: Vec<(f64, f64)>,
    pub projected: Vec<(f64, f64)>,
    /// Levels at the next evening and morning reference times inside the window
    pub targets: Vec<(f64, f64)>,
}

impl GraphSeries {
    pub fn current_level(&self) -> f64 {
        self.historical.last().map(|&(_, level)| level).unwrap_or(0.0)
    }

    pub fn max_level(&self) -> f64 {
        self.historical
            .iter()
            .chain(self.projected.iter())
            .map(|&(_, level)| level)
            .fold(0.0, f64::max)
    }
}

pub fn build_series(
    store: &DoseStore,
    hours_back: u32,
    projection_hours: u32,
    resolution_minutes: f64,
) -> Result<GraphSeries> {
    let now = store.now();
    let start = now - f64::from(hours_back) * SECONDS_PER_HOUR;
    let end = now + f64::from(projection_hours) * SECONDS_PER_HOUR;
    let to_x = |ts: f64| (ts - now) / SECONDS_PER_HOUR;

    let points = store.timeseries(Some(start), Some(end), resolution_minutes)?;
    let (past, future): (Vec<_>, Vec<_>) = points.iter().partition(|p| p.timestamp <= now);

    let historical = past.iter().map(|p| (to_x(p.timestamp), p.level)).collect();
    let projected = future
        .iter()
        .step_by(PROJECTED_DOT_EVERY)
        .map(|p| (to_x(p.timestamp), p.level))
        .collect();

    let local_now = to_local(now);
    let mut targets = Vec::new();
    for reference in [ReferenceTime::Evening, ReferenceTime::Morning] {
        let (hour, minute) = reference.clock_time();
        let ts = to_epoch_seconds(&next_occurrence(&local_now, hour, minute));
        if (start..=end).contains(&ts) {
            targets.push((to_x(ts), store.level_at(ts)?));
        }
    }

    Ok(GraphSeries {
        hours_back,
        projection_hours,
        now,
        historical,
        projected,
        targets,
    })
}

/// Upper bound and tick step for the level axis
///
/// Always shows at least 50mg, with 10% headroom above the peak.
pub fn level_axis(max_level: f64) -> (f64, f64) {
    let top = (max_level * 1.1).max(50.0);
    let step = if top > 500.0 {
        100.0
    } else if top > 200.0 {
        50.0
    } else if top > 100.0 {
        25.0
    } else {
        10.0
    };
    ((top / step).ceil() * step, step)
}

fn time_labels(series: &GraphSeries) -> Vec<String> {
    let start = -f64::from(series.hours_back);
    let span = f64::from(series.hours_back + series.projection_hours);
    (0..X_LABELS)
        .map(|i| {
            let hours = start + span * i as f64 / (X_LABELS - 1) as f64;
            let label = to_local(series.now + hours * SECONDS_PER_HOUR)
                .format("%H:%M")
                .to_string();
            if hours > 0.0 {
                format!("*{}", label)
            } else {
                label
            }
        })
        .collect()
}

/// Render the chart as lines of text
pub fn render(series: &GraphSeries, width: u16, height: u16) -> String {
    let (top, step) = level_axis(series.max_level());
    let level_labels: Vec<String> = (0..=(top / step) as usize)
        .map(|i| format!("{}", i as f64 * step))
        .collect();

    let current = series.current_level();
    let now_line = [(0.0, 0.0), (0.0, current)];

    let mut datasets = vec![
        Dataset::default()
            .name("history")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .data(&series.historical),
        Dataset::default()
            .name("projected")
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .data(&series.projected),
        Dataset::default()
            .name("6 PM / 8 AM")
            .marker(Marker::Block)
            .graph_type(GraphType::Scatter)
            .data(&series.targets),
    ];
    if current > 0.0 {
        datasets.push(
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .data(&now_line),
        );
    }

    let title = format!(
        "Caffeine Levels (Past {}h + Next {}h)",
        series.hours_back, series.projection_hours
    );
    let chart = Chart::new(datasets)
        .block(Block::bordered().title(title))
        .x_axis(
            Axis::default()
                .title("Time (* = projected)")
                .bounds([
                    -f64::from(series.hours_back),
                    f64::from(series.projection_hours),
                ])
                .labels(time_labels(series)),
        )
        .y_axis(
            Axis::default()
                .title("Caffeine (mg)")
                .bounds([0.0, top])
                .labels(level_labels),
        );

    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    chart.render(area, &mut buf);
    buffer_to_string(&buf)
}

fn buffer_to_string(buf: &Buffer) -> String {
    let area = buf.area;
    let mut out = String::new();
    for y in area.top()..area.bottom() {
        let line: String = (area.left()..area.right())
            .map(|x| buf[(x, y)].symbol())
            .collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
