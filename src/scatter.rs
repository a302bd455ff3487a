use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::RGBAColor;
use std::ops::Range;
use std::path::Path;

use crate::compare::AlignedTable;

/// Both axes span this range whatever the data looks like.
pub const AXIS_LIMIT: f64 = 1.1;

/// Canvas edge the font and marker sizes below are tuned for (6 in at 300 dpi).
const REFERENCE_PX: f64 = 1800.0;

/// Steel blue at half opacity, drawn without outline.
const POINT_COLOR: RGBAColor = RGBAColor(52, 115, 178, 0.5);

/// Pixel sizes for one canvas, scaled from the 1800px reference.
#[derive(Debug, Clone, Copy)]
struct Layout {
    title_px: f64,
    desc_px: f64,
    label_px: f64,
    point_radius: u32,
    margin: u32,
}

impl Layout {
    fn for_canvas(width: u32, height: u32) -> Self {
        let scale = (width.min(height) as f64 / REFERENCE_PX).max(0.1);
        Layout {
            title_px: 54.0 * scale,
            desc_px: 44.0 * scale,
            label_px: 36.0 * scale,
            point_radius: ((5.0 * scale).round() as u32).max(1),
            margin: ((30.0 * scale).round() as u32).max(4),
        }
    }
}

/// Draw the two-line title and the scatter of `table` onto `root`.
/// Returns the x and y ranges the chart was built with.
fn draw_comparison<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    table: &AlignedTable,
    layout: Layout,
) -> Result<(Range<f64>, Range<f64>)>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let line_h = (layout.title_px * 1.25).round() as i32;
    let title_h = (line_h * 2) as u32 + layout.margin * 2;
    let (title_area, plot_area) = root.split_vertically(title_h);

    let (tw, _) = title_area.dim_in_pixel();
    let title_style = ("sans-serif", layout.title_px)
        .into_text_style(&title_area)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    let cx = tw as i32 / 2;
    let top = layout.margin as i32;
    title_area.draw(&Text::new(
        "Pearson R Comparison".to_string(),
        (cx, top),
        title_style.clone(),
    ))?;
    title_area.draw(&Text::new(
        format!("{} vs {}", table.x_label, table.y_label),
        (cx, top + line_h),
        title_style,
    ))?;

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(layout.margin)
        .x_label_area_size((layout.desc_px * 2.6) as u32)
        .y_label_area_size((layout.desc_px * 3.2) as u32)
        .build_cartesian_2d(-AXIS_LIMIT..AXIS_LIMIT, -AXIS_LIMIT..AXIS_LIMIT)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc(table.x_label.as_str())
        .y_desc(table.y_label.as_str())
        .x_label_formatter(&|v: &f64| format!("{:.1}", v))
        .y_label_formatter(&|v: &f64| format!("{:.1}", v))
        .label_style(("sans-serif", layout.label_px))
        .axis_desc_style(("sans-serif", layout.desc_px))
        .draw()?;

    chart.draw_series(
        table
            .points()
            .into_iter()
            .map(|xy| Circle::new(xy, layout.point_radius, POINT_COLOR.filled())),
    )?;

    Ok((chart.x_range(), chart.y_range()))
}

/// Render the aligned table as a PNG scatter plot at `output_path`.
pub fn render(table: &AlignedTable, output_path: &Path, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("image size must be non-zero (got {}x{})", width, height);
    }
    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    draw_comparison(&root, table, Layout::for_canvas(width, height))
        .with_context(|| format!("Failed to draw plot for {}", output_path.display()))?;
    root.present()
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    Ok(())
}
