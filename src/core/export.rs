//! Chart-ready series and flattened tables built from a `BatchReport`.

use serde::Serialize;

use crate::core::series::{AudiometricSeries, ProbeSeries};
use crate::core::targets::TargetTable;
use crate::domain::model::{BatchReport, Ear, ProbeCurve};
use crate::utils::error::{HitboxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    Linear,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    pub scale: AxisScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Circle,
    Star,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub marker: Marker,
    pub reference: bool,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub series: Vec<ChartSeries>,
}

impl Chart {
    fn frequency_chart(title: &str, y_label: &str) -> Self {
        Self {
            title: title.to_string(),
            x_axis: Axis {
                label: "Frequency (Hz)".to_string(),
                scale: AxisScale::Log,
            },
            y_axis: Axis {
                label: y_label.to_string(),
                scale: AxisScale::Linear,
            },
            series: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    pub audiogram: Chart,
    pub insertion_gain: Chart,
}

/// Probe curve label: the plain display label for single-run files, with
/// the REM number appended otherwise.
fn curve_name(label: &str, curve: &ProbeCurve, total: usize) -> String {
    if total > 1 {
        format!("{} - {}", label, curve.rem_label())
    } else {
        label.to_string()
    }
}

pub fn build_charts(report: &BatchReport) -> ChartSet {
    let mut audiogram = Chart::frequency_chart("Audiometric Thresholds", "Hearing Level (dB HL)");
    let mut insertion_gain = Chart::frequency_chart("HIT Probe Curves", "Insertion Gain (dB)");

    for entry in &report.entries {
        if let Some(points) = &entry.result.audiometric {
            let series = AudiometricSeries::from_points(points);
            for ear in [Ear::Right, Ear::Left] {
                let trace = series.trace(ear);
                if trace.frequencies.is_empty() {
                    continue;
                }
                audiogram.series.push(ChartSeries {
                    name: format!("{} - {} Ear", entry.label, ear),
                    marker: Marker::Circle,
                    reference: false,
                    points: trace
                        .frequencies
                        .iter()
                        .zip(&trace.levels)
                        .map(|(f, l)| [*f, *l])
                        .collect(),
                });
            }
        }

        if let Some(curves) = &entry.result.probe_curves {
            for curve in curves.iter().filter(|c| !c.points.is_empty()) {
                insertion_gain.series.push(ChartSeries {
                    name: curve_name(&entry.label, curve, curves.len()),
                    marker: Marker::Star,
                    reference: false,
                    points: curve
                        .insertion_gain()
                        .iter()
                        .map(|g| [g.frequency_hz, g.gain_db])
                        .collect(),
                });
            }
        }
    }

    if let Some(targets) = &report.targets {
        for (index, column) in targets.columns.iter().enumerate() {
            insertion_gain.series.push(ChartSeries {
                name: column.label.clone(),
                marker: Marker::Star,
                reference: true,
                points: targets
                    .points(index)
                    .into_iter()
                    .map(|(f, g)| [f, g])
                    .collect(),
            });
        }
    }

    ChartSet {
        audiogram,
        insertion_gain,
    }
}

/// A flat table ready to be written as CSV or TSV.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| HitboxError::ProcessingError {
            message: format!("Failed to flush table '{}': {}", self.name, e),
        })?;
        String::from_utf8(bytes).map_err(|e| HitboxError::ProcessingError {
            message: format!("Table '{}' is not valid UTF-8: {}", self.name, e),
        })
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn audiogram_table(report: &BatchReport) -> Table {
    let mut table = Table::new(
        "audiogram",
        &["file_name", "label", "frequency_hz", "right_db_hl", "left_db_hl"],
    );

    for entry in &report.entries {
        let Some(points) = &entry.result.audiometric else {
            continue;
        };
        let series = AudiometricSeries::from_points(points);
        for slot in series.grid() {
            table.rows.push(vec![
                entry.file_name.clone(),
                entry.label.clone(),
                slot.frequency_hz.to_string(),
                cell(series.level_at(Ear::Right, slot)),
                cell(series.level_at(Ear::Left, slot)),
            ]);
        }
    }
    table
}

pub fn probe_table(report: &BatchReport) -> Result<Table> {
    let mut table = Table::new(
        "probe_curves",
        &[
            "file_name",
            "label",
            "run",
            "frequency_hz",
            "input_db",
            "output_db",
            "gain_db",
        ],
    );

    for entry in &report.entries {
        let Some(curves) = &entry.result.probe_curves else {
            continue;
        };
        for curve in curves {
            let series = ProbeSeries::from_curve(curve)?;
            for i in 0..series.frequencies.len() {
                table.rows.push(vec![
                    entry.file_name.clone(),
                    entry.label.clone(),
                    curve.rem_label(),
                    series.frequencies[i].to_string(),
                    series.inputs[i].to_string(),
                    series.outputs[i].to_string(),
                    series.gains[i].to_string(),
                ]);
            }
        }
    }
    Ok(table)
}

/// Measured insertion gain against every target column at each probe frequency.
pub fn deviation_table(report: &BatchReport, targets: &TargetTable) -> Table {
    let mut table = Table::new(
        "target_deviation",
        &[
            "file_name",
            "label",
            "run",
            "target",
            "frequency_hz",
            "measured_gain_db",
            "target_gain_db",
            "deviation_db",
        ],
    );

    for entry in &report.entries {
        let Some(curves) = &entry.result.probe_curves else {
            continue;
        };
        for curve in curves {
            for (index, column) in targets.columns.iter().enumerate() {
                for gain in curve.insertion_gain() {
                    // 超出目標表頻率範圍的點不比較
                    let Some(target) = targets.gain_at(index, gain.frequency_hz) else {
                        continue;
                    };
                    table.rows.push(vec![
                        entry.file_name.clone(),
                        entry.label.clone(),
                        curve.rem_label(),
                        column.label.clone(),
                        gain.frequency_hz.to_string(),
                        gain.gain_db.to_string(),
                        target.to_string(),
                        (gain.gain_db - target).to_string(),
                    ]);
                }
            }
        }
    }
    table
}

pub fn build_tables(report: &BatchReport) -> Result<Vec<Table>> {
    let mut tables = vec![audiogram_table(report), probe_table(report)?];
    if let Some(targets) = &report.targets {
        tables.push(deviation_table(report, targets));
    }
    Ok(tables)
}

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    processed: Vec<&'a str>,
    failures: &'a [crate::domain::model::FileFailure],
    warnings: Vec<WarningEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct WarningEntry<'a> {
    file_name: &'a str,
    label: &'a str,
    message: String,
}

/// Failures and warnings as JSON, for display next to the charts.
pub fn report_json(report: &BatchReport) -> Result<String> {
    let document = ReportDocument {
        processed: report.entries.iter().map(|e| e.label.as_str()).collect(),
        failures: &report.failures,
        warnings: report
            .warnings
            .iter()
            .map(|w| WarningEntry {
                file_name: &w.file_name,
                label: &w.label,
                message: w.warning.to_string(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}
