//! Parallel component lists and their reconstruction into plottable series.

use serde::Serialize;

use crate::domain::model::{AudiometricPoint, Ear, ProbeCurve, ProbePoint, SeriesId};
use crate::utils::error::{HitboxError, Result};

/// Component lists of one ear, filled independently per field. `points`
/// counts the points that contributed at least one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarColumns {
    pub points: usize,
    pub frequencies: Vec<f64>,
    pub levels: Vec<f64>,
}

impl EarColumns {
    pub fn push(&mut self, frequency: Option<f64>, level: Option<f64>) {
        if frequency.is_none() && level.is_none() {
            return;
        }
        self.points += 1;
        self.frequencies.extend(frequency);
        self.levels.extend(level);
    }

    /// Every contributing point carried every field.
    pub fn is_aligned(&self) -> bool {
        self.frequencies.len() == self.points && self.levels.len() == self.points
    }

    pub fn describe_lengths(&self) -> String {
        format!(
            "points={}, frequency={}, level={}",
            self.points,
            self.frequencies.len(),
            self.levels.len()
        )
    }

    /// Zip into points; callers check `is_aligned` first.
    pub fn into_points(self, ear: Ear) -> Vec<AudiometricPoint> {
        self.frequencies
            .into_iter()
            .zip(self.levels)
            .map(|(frequency_hz, level_db_hl)| AudiometricPoint {
                frequency_hz,
                level_db_hl,
                ear,
            })
            .collect()
    }
}

/// Component lists of one probe run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeColumns {
    pub points: usize,
    pub frequencies: Vec<f64>,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
}

impl ProbeColumns {
    pub fn push(&mut self, frequency: Option<f64>, input: Option<f64>, output: Option<f64>) {
        if frequency.is_none() && input.is_none() && output.is_none() {
            return;
        }
        self.points += 1;
        self.frequencies.extend(frequency);
        self.inputs.extend(input);
        self.outputs.extend(output);
    }

    pub fn is_aligned(&self) -> bool {
        [self.frequencies.len(), self.inputs.len(), self.outputs.len()]
            .iter()
            .all(|len| *len == self.points)
    }

    pub fn describe_lengths(&self) -> String {
        format!(
            "points={}, frequency={}, input={}, output={}",
            self.points,
            self.frequencies.len(),
            self.inputs.len(),
            self.outputs.len()
        )
    }

    pub fn into_curve(self, run: usize) -> ProbeCurve {
        let points = self
            .frequencies
            .into_iter()
            .zip(self.inputs)
            .zip(self.outputs)
            .map(|((frequency_hz, input_db), output_db)| ProbePoint {
                frequency_hz,
                input_db,
                output_db,
            })
            .collect();
        ProbeCurve { run, points }
    }
}

/// Insertion gain (`output - input`) of index-aligned level lists.
pub fn insertion_gain(inputs: &[f64], outputs: &[f64]) -> Result<Vec<f64>> {
    if inputs.len() != outputs.len() {
        return Err(HitboxError::DimensionMismatch {
            series: "insertion gain".to_string(),
            details: format!("input={}, output={}", inputs.len(), outputs.len()),
        });
    }
    Ok(inputs
        .iter()
        .zip(outputs)
        .map(|(input, output)| output - input)
        .collect())
}

/// Per-ear trace of an audiogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EarTrace {
    pub frequencies: Vec<f64>,
    pub levels: Vec<f64>,
}

/// One row of the audiogram grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSlot {
    pub frequency_hz: f64,
    pub occurrence: usize,
}

/// Audiometric points regrouped by ear, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudiometricSeries {
    pub right: EarTrace,
    pub left: EarTrace,
}

impl AudiometricSeries {
    pub fn from_points(points: &[AudiometricPoint]) -> Self {
        let mut series = Self::default();
        for point in points {
            let trace = match point.ear {
                Ear::Right => &mut series.right,
                Ear::Left => &mut series.left,
            };
            trace.frequencies.push(point.frequency_hz);
            trace.levels.push(point.level_db_hl);
        }
        series
    }

    pub fn trace(&self, ear: Ear) -> &EarTrace {
        match ear {
            Ear::Right => &self.right,
            Ear::Left => &self.left,
        }
    }

    /// Row grid of both ears in first-seen order, right ear first. A
    /// frequency measured again on the same ear (a retest) gets its own slot.
    pub fn grid(&self) -> Vec<GridSlot> {
        let mut grid: Vec<GridSlot> = Vec::new();
        for trace in [&self.right, &self.left] {
            let mut seen: Vec<f64> = Vec::new();
            for frequency_hz in &trace.frequencies {
                let slot = GridSlot {
                    frequency_hz: *frequency_hz,
                    occurrence: seen.iter().filter(|f| *f == frequency_hz).count(),
                };
                seen.push(*frequency_hz);
                if !grid.contains(&slot) {
                    grid.push(slot);
                }
            }
        }
        grid
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.grid().iter().map(|slot| slot.frequency_hz).collect()
    }

    /// Level of the `occurrence`-th measurement at the slot's frequency.
    pub fn level_at(&self, ear: Ear, slot: GridSlot) -> Option<f64> {
        let trace = self.trace(ear);
        trace
            .frequencies
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == slot.frequency_hz)
            .nth(slot.occurrence)
            .and_then(|(i, _)| trace.levels.get(i).copied())
    }

    pub fn right_levels(&self) -> &[f64] {
        &self.right.levels
    }

    pub fn left_levels(&self) -> &[f64] {
        &self.left.levels
    }
}

/// Parallel arrays of one probe curve plus its derived gain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeSeries {
    pub id: SeriesId,
    pub frequencies: Vec<f64>,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
    pub gains: Vec<f64>,
}

impl ProbeSeries {
    pub fn from_curve(curve: &ProbeCurve) -> Result<Self> {
        let frequencies: Vec<f64> = curve.points.iter().map(|p| p.frequency_hz).collect();
        let inputs: Vec<f64> = curve.points.iter().map(|p| p.input_db).collect();
        let outputs: Vec<f64> = curve.points.iter().map(|p| p.output_db).collect();
        let gains = insertion_gain(&inputs, &outputs)?;
        Ok(Self {
            id: SeriesId::Probe { run: curve.run },
            frequencies,
            inputs,
            outputs,
            gains,
        })
    }
}
