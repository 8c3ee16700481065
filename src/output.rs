//! Files written at the end of a run: the count table, the chart and the
//! downloadable archive.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::aggregate::{AuthorCount, CountTable};
use crate::error::Result;

fn format_fraction(value: Option<f64>) -> String {
    value.map(|f| f.to_string()).unwrap_or_default()
}

/// Cell fractions per column, then the per-row totals. An undefined
/// fraction is written as an empty field.
pub fn write_count_table(path: &Path, table: &CountTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(table.column_labels.iter().cloned());
    header.extend(
        ["selected_count", "total_count", "selected_fraction"]
            .iter()
            .map(|s| s.to_string()),
    );
    writer.write_record(&header)?;

    for (index, label) in table.row_labels.iter().enumerate() {
        let summary = table.row_summary(index);
        let mut record = vec![label.clone()];
        record.extend(table.row(index).iter().map(|c| format_fraction(c.fraction)));
        record.push(summary.selected_count.to_string());
        record.push(summary.total_count.to_string());
        record.push(format_fraction(summary.selected_fraction));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_author_counts(path: &Path, counts: &[AuthorCount]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["", "articles_count"])?;
    for count in counts {
        let articles = count.articles_count.to_string();
        writer.write_record([count.author.as_str(), articles.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

const PALETTE: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

/// Percent-frequency-over-time line chart, one series per column. Cells
/// without a fraction break the line.
pub fn render_chart(table: &CountTable) -> String {
    const WIDTH: f64 = 800.0;
    const HEIGHT: f64 = 480.0;
    const LEFT: f64 = 60.0;
    const RIGHT: f64 = 180.0;
    const TOP: f64 = 40.0;
    const BOTTOM: f64 = 50.0;

    let plot_width = WIDTH - LEFT - RIGHT;
    let plot_height = HEIGHT - TOP - BOTTOM;

    let max_percent = (0..table.len())
        .flat_map(|r| table.row(r).iter().filter_map(|c| c.fraction))
        .fold(0.0_f64, f64::max)
        * 100.0;
    let y_max = if max_percent > 0.0 { max_percent * 1.1 } else { 1.0 };

    let x_of = |row: usize| {
        if table.len() <= 1 {
            LEFT + plot_width / 2.0
        } else {
            LEFT + plot_width * row as f64 / (table.len() - 1) as f64
        }
    };
    let y_of = |percent: f64| TOP + plot_height - plot_height * percent / y_max;

    let mut lines = vec![
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" font-family="sans-serif" font-size="12">"#
        ),
        r#"<rect width="100%" height="100%" fill="white"/>"#.to_string(),
        format!(
            r#"<text x="{}" y="24" text-anchor="middle" font-size="16">Percent frequency over time</text>"#,
            LEFT + plot_width / 2.0
        ),
        format!(
            r#"<line x1="{LEFT}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="black"/><line x1="{LEFT}" y1="{TOP}" x2="{LEFT}" y2="{bottom}" stroke="black"/>"#,
            bottom = TOP + plot_height,
            right = LEFT + plot_width
        ),
    ];

    lines.extend((0..=4).map(|tick| {
        let percent = y_max * tick as f64 / 4.0;
        format!(
            r#"<text x="{}" y="{:.1}" text-anchor="end">{:.1}</text>"#,
            LEFT - 6.0,
            y_of(percent) + 4.0,
            percent
        )
    }));
    lines.extend(table.row_labels.iter().enumerate().map(|(row, label)| {
        format!(
            r#"<text x="{:.1}" y="{}" text-anchor="middle">{}</text>"#,
            x_of(row),
            TOP + plot_height + 18.0,
            escape_xml(label)
        )
    }));
    lines.push(format!(
        r#"<text x="{}" y="{}" text-anchor="middle">Year</text><text x="16" y="{mid}" text-anchor="middle" transform="rotate(-90 16 {mid})">%</text>"#,
        LEFT + plot_width / 2.0,
        HEIGHT - 10.0,
        mid = TOP + plot_height / 2.0
    ));

    for (column, label) in table.column_labels.iter().enumerate() {
        let color = PALETTE[column % PALETTE.len()];
        let mut segments = Vec::new();
        let mut pen_down = false;
        for row in 0..table.len() {
            match table.cell(row, column).fraction {
                Some(f) => {
                    let command = if pen_down { 'L' } else { 'M' };
                    segments.push(format!("{}{:.1},{:.1}", command, x_of(row), y_of(f * 100.0)));
                    pen_down = true;
                }
                None => pen_down = false,
            }
        }
        if !segments.is_empty() {
            lines.push(format!(
                r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                segments.join(" "),
                color
            ));
        }
        let legend_y = TOP + 16.0 * column as f64;
        lines.push(format!(
            r#"<rect x="{}" y="{}" width="12" height="12" fill="{}"/><text x="{}" y="{}">{}</text>"#,
            WIDTH - RIGHT + 16.0,
            legend_y,
            color,
            WIDTH - RIGHT + 34.0,
            legend_y + 10.0,
            escape_xml(label)
        ));
    }

    lines.push("</svg>".to_string());
    let mut svg = lines.join("\n");
    svg.push('\n');
    svg
}

pub fn write_chart(path: &Path, table: &CountTable) -> Result<()> {
    fs::write(path, render_chart(table))?;
    Ok(())
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Zips the regular files directly inside `folder`.
pub fn archive_folder(folder: &Path, archive_path: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<_> = fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        zip.start_file(name, options)?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}
