use std::collections::BTreeMap;

use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoints, PlotUi, Points};

use rusty_till::query::pages::DiscountPoint;
use rusty_till::query::result::AggregationResult;

use crate::color::{ACCENT, ColorMap, generate_palette};

const CHART_HEIGHT: f32 = 260.0;

/// Plot with category labels on integer x positions.
fn show_labelled(
    ui: &mut Ui,
    id: &str,
    labels: Vec<String>,
    y_label: &str,
    add_items: impl FnOnce(&mut PlotUi),
) {
    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .y_axis_label(y_label.to_string())
        .allow_scroll(false)
        .x_axis_formatter(move |mark: GridMark, _range| {
            let pos = mark.value;
            if pos.fract().abs() > f64::EPSILON || pos < 0.0 {
                return String::new();
            }
            labels.get(pos as usize).cloned().unwrap_or_default()
        })
        .show(ui, add_items);
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// One bar per row of a single-key result.
pub fn bar_chart(
    ui: &mut Ui,
    id: &str,
    result: &AggregationResult,
    column: &str,
    colors: Option<&ColorMap>,
) {
    let Some(idx) = result.value_index(column) else {
        return;
    };
    let labels: Vec<String> = result.rows.iter().map(|r| r.keys[0].to_string()).collect();

    let bars: Vec<Bar> = result
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let value = row.values[idx].value()?;
            let label = &labels[i];
            let color = colors.map_or(ACCENT, |c| c.color_for(label));
            Some(Bar::new(i as f64, value).name(label).fill(color).width(0.6))
        })
        .collect();

    show_labelled(ui, id, labels, column, |plot_ui| {
        plot_ui.bar_chart(BarChart::new(bars).name(column));
    });
}

/// Side-by-side bars for a two-key result: x from the first key, one
/// series per value of the second key.
pub fn grouped_bar_chart(
    ui: &mut Ui,
    id: &str,
    result: &AggregationResult,
    column: &str,
    colors: &ColorMap,
) {
    let Some(idx) = result.value_index(column) else {
        return;
    };

    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    let mut series: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for row in &result.rows {
        let (Some(x), Some(group)) = (row.keys.first(), row.keys.get(1)) else {
            continue;
        };
        let x = x.to_string();
        let next = positions.len();
        positions.entry(x.clone()).or_insert(next);
        if let Some(value) = row.values[idx].value() {
            series.entry(group.to_string()).or_default().push((x, value));
        }
    }

    let n_series = series.len().max(1);
    let width = 0.8 / n_series as f64;
    let mut labels = vec![String::new(); positions.len()];
    for (label, pos) in &positions {
        labels[*pos] = label.clone();
    }

    show_labelled(ui, id, labels, column, |plot_ui| {
        for (s, (group, values)) in series.iter().enumerate() {
            let offset = (s as f64 - (n_series as f64 - 1.0) / 2.0) * width;
            let bars: Vec<Bar> = values
                .iter()
                .map(|(x, v)| Bar::new(positions[x] as f64 + offset, *v).width(width))
                .collect();
            plot_ui.bar_chart(
                BarChart::new(bars)
                    .name(group)
                    .color(colors.color_for(group)),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Line chart
// ---------------------------------------------------------------------------

/// One line per value column over the (ordered) keys of a one-key result.
pub fn line_chart(ui: &mut Ui, id: &str, result: &AggregationResult, columns: &[&str]) {
    let palette = match columns.len() {
        0 => return,
        1 => vec![ACCENT],
        n => generate_palette(n),
    };
    let labels: Vec<String> = result.rows.iter().map(|r| r.keys[0].to_string()).collect();
    let lines: Vec<Line> = columns
        .iter()
        .zip(palette)
        .filter_map(|(column, color)| {
            let idx = result.value_index(column)?;
            let points: PlotPoints = result
                .rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| row.values[idx].value().map(|v| [i as f64, v]))
                .collect();
            Some(Line::new(points).name(*column).color(color).width(1.5))
        })
        .collect();

    show_labelled(ui, id, labels, &columns.join(" / "), |plot_ui| {
        for line in lines {
            plot_ui.line(line);
        }
    });
}

// ---------------------------------------------------------------------------
// Scatter
// ---------------------------------------------------------------------------

/// `x_col` against `y_col`, one point per row, coloured and grouped in the
/// legend by the first key (the category).
pub fn scatter(
    ui: &mut Ui,
    id: &str,
    result: &AggregationResult,
    x_col: &str,
    y_col: &str,
    colors: &ColorMap,
) {
    let (Some(xi), Some(yi)) = (result.value_index(x_col), result.value_index(y_col)) else {
        return;
    };
    let mut series: BTreeMap<String, Vec<[f64; 2]>> = BTreeMap::new();
    for row in &result.rows {
        let (Some(group), Some(x), Some(y)) = (row.keys.first(), row.values[xi].value(), row.values[yi].value()) else {
            continue;
        };
        series.entry(group.to_string()).or_default().push([x, y]);
    }

    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label(x_col.to_string())
        .y_axis_label(y_col.to_string())
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (group, coords) in series {
                plot_ui.points(
                    Points::new(PlotPoints::from(coords))
                        .radius(4.0)
                        .color(colors.color_for(&group))
                        .name(group),
                );
            }
        });
}

const SIZE_CLASSES: usize = 4;

/// Discount against profit margin, marker size growing with sales.
/// Orders with an undefined margin are not drawn.
pub fn discount_scatter(ui: &mut Ui, id: &str, points: &[DiscountPoint]) {
    let max_sales = points.iter().map(|p| p.sales.abs()).fold(0.0, f64::max);
    let mut classes: Vec<Vec<[f64; 2]>> = vec![Vec::new(); SIZE_CLASSES];
    for point in points {
        let Some(margin) = point.profit_margin.value() else {
            continue;
        };
        let share = if max_sales > 0.0 { (point.sales.abs() / max_sales).sqrt() } else { 0.0 };
        let class = ((share * SIZE_CLASSES as f64) as usize).min(SIZE_CLASSES - 1);
        classes[class].push([point.discount, margin]);
    }

    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Discount")
        .y_axis_label("Profit Margin")
        .show(ui, |plot_ui| {
            for (class, coords) in classes.into_iter().enumerate() {
                if coords.is_empty() {
                    continue;
                }
                let radius = 2.0 + 2.0 * class as f32;
                let alpha = 200 - 30 * class as u8;
                plot_ui.points(
                    Points::new(PlotPoints::from(coords))
                        .radius(radius)
                        .color(Color32::from_rgba_unmultiplied(66, 133, 244, alpha))
                        .name(format!("sales band {}", class + 1)),
                );
            }
        });
}
