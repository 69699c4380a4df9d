//! Prescription-target tables (e.g. NL3) and a content-addressed cache for them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::utils::error::{HitboxError, Result};

pub const MAX_TARGET_COLUMNS: usize = 3;

/// Which columns of the target sheet hold what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetColumns {
    pub frequency: usize,
    pub gains: Vec<usize>,
    pub labels: Vec<String>,
    pub has_headers: bool,
    pub delimiter: Option<char>,
}

impl Default for TargetColumns {
    fn default() -> Self {
        Self {
            frequency: 0,
            gains: vec![4, 5, 6],
            labels: Vec::new(),
            has_headers: true,
            delimiter: None,
        }
    }
}

impl TargetColumns {
    pub fn validate(&self) -> Result<()> {
        if self.gains.is_empty() || self.gains.len() > MAX_TARGET_COLUMNS {
            return Err(HitboxError::InvalidConfigValueError {
                field: "targets.gain_columns".to_string(),
                value: format!("{:?}", self.gains),
                reason: format!("Between 1 and {} gain columns are supported", MAX_TARGET_COLUMNS),
            });
        }
        if self.gains.contains(&self.frequency) {
            return Err(HitboxError::InvalidConfigValueError {
                field: "targets.gain_columns".to_string(),
                value: format!("{:?}", self.gains),
                reason: "Gain columns must differ from the frequency column".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetColumn {
    pub label: String,
    pub gains: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetTable {
    pub frequencies: Vec<f64>,
    pub columns: Vec<TargetColumn>,
}

impl TargetTable {
    pub fn from_csv_reader<R: Read>(reader: R, layout: &TargetColumns) -> Result<Self> {
        layout.validate()?;

        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(layout.has_headers).flexible(true);
        if let Some(delimiter) = layout.delimiter {
            builder.delimiter(delimiter as u8);
        }
        let mut csv_reader = builder.from_reader(reader);

        let headers = if layout.has_headers {
            Some(csv_reader.headers()?.clone())
        } else {
            None
        };

        let mut frequencies = Vec::new();
        let mut gains: Vec<Vec<Option<f64>>> = vec![Vec::new(); layout.gains.len()];

        for record in csv_reader.records() {
            let record = record?;
            // 頻率欄位空白或非數字的列（例如備註列）略過
            let Some(frequency) = parse_cell(record.get(layout.frequency)).filter(|f| *f > 0.0)
            else {
                continue;
            };
            frequencies.push(frequency);
            for (column, index) in gains.iter_mut().zip(&layout.gains) {
                column.push(parse_cell(record.get(*index)));
            }
        }

        if frequencies.is_empty() {
            return Err(HitboxError::TargetError {
                message: "Target table contains no rows with a numeric frequency".to_string(),
            });
        }

        let columns = gains
            .into_iter()
            .enumerate()
            .map(|(n, gains)| {
                let label = layout
                    .labels
                    .get(n)
                    .cloned()
                    .or_else(|| {
                        headers
                            .as_ref()
                            .and_then(|h| h.get(layout.gains[n]))
                            .map(|h| h.trim().to_string())
                            .filter(|h| !h.is_empty())
                    })
                    .unwrap_or_else(|| format!("Target {}", n + 1));
                TargetColumn { label, gains }
            })
            .collect();

        Ok(Self {
            frequencies,
            columns,
        })
    }

    pub fn from_bytes(bytes: &[u8], layout: &TargetColumns) -> Result<Self> {
        let bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
        Self::from_csv_reader(bytes, layout)
    }

    /// Points of one column with its missing cells dropped.
    pub fn points(&self, column: usize) -> Vec<(f64, f64)> {
        let Some(column) = self.columns.get(column) else {
            return Vec::new();
        };
        self.frequencies
            .iter()
            .zip(&column.gains)
            .filter_map(|(f, g)| g.map(|g| (*f, g)))
            .collect()
    }

    /// Target gain at `frequency_hz`, interpolated linearly on a log-frequency
    /// axis. `None` outside the table's frequency range.
    pub fn gain_at(&self, column: usize, frequency_hz: f64) -> Option<f64> {
        if frequency_hz <= 0.0 {
            return None;
        }
        let mut points = self.points(column);
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let x = frequency_hz.log10();
        for pair in points.windows(2) {
            let (f0, g0) = pair[0];
            let (f1, g1) = pair[1];
            if frequency_hz == f0 {
                return Some(g0);
            }
            if frequency_hz > f0 && frequency_hz <= f1 {
                let t = (x - f0.log10()) / (f1.log10() - f0.log10());
                return Some(g0 + t * (g1 - g0));
            }
        }
        match points.as_slice() {
            [(f, g)] if *f == frequency_hz => Some(*g),
            _ => None,
        }
    }
}

fn parse_cell(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Same content read through a different column layout is a different table.
fn cache_key(bytes: &[u8], layout: &TargetColumns) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(format!("{:?}", layout).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Loaded target tables keyed by content hash. Re-loading a source identity
/// with different content drops the stale table.
#[derive(Debug, Default)]
pub struct TargetCache {
    tables: HashMap<String, Arc<TargetTable>>,
    sources: HashMap<String, String>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        identity: &str,
        bytes: &[u8],
        layout: &TargetColumns,
    ) -> Result<Arc<TargetTable>> {
        let hash = cache_key(bytes, layout);

        if let Some(previous) = self.sources.get(identity) {
            if *previous != hash {
                tracing::info!("🔄 Target table '{}' changed, invalidating cached copy", identity);
                self.invalidate(identity);
            }
        }

        if let Some(table) = self.tables.get(&hash) {
            tracing::debug!("Target table '{}' served from cache ({})", identity, &hash[..12]);
            self.sources.insert(identity.to_string(), hash);
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(TargetTable::from_bytes(bytes, layout)?);
        tracing::info!(
            "🎯 Loaded target table '{}' ({} frequencies, {} columns)",
            identity,
            table.frequencies.len(),
            table.columns.len()
        );
        self.tables.insert(hash.clone(), Arc::clone(&table));
        self.sources.insert(identity.to_string(), hash);
        Ok(table)
    }

    /// Forget the table behind `identity`, unless another identity still
    /// points at the same content.
    pub fn invalidate(&mut self, identity: &str) -> bool {
        let Some(hash) = self.sources.remove(identity) else {
            return false;
        };
        if !self.sources.values().any(|h| *h == hash) {
            self.tables.remove(&hash);
        }
        true
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.sources.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS_CSV: &str = "\
Frequency,Soft,Medium,Loud,NL3 Soft,NL3 Medium,NL3 Loud
250,1,2,3,5,4,2
500,1,2,3,10,8,5
1000,1,2,3,20,16,10
note,,,,,,
2000,1,2,3,,20,14
";

    #[test]
    fn test_load_default_columns_with_headers() {
        let table = TargetTable::from_bytes(TARGETS_CSV.as_bytes(), &TargetColumns::default()).unwrap();
        assert_eq!(table.frequencies, vec![250.0, 500.0, 1000.0, 2000.0]);
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[0].label, "NL3 Soft");
        assert_eq!(table.columns[0].gains[3], None);
        assert_eq!(table.points(0).len(), 3);
        assert_eq!(table.columns[2].label, "NL3 Loud");
    }

    #[test]
    fn test_labels_override_headers() {
        let layout = TargetColumns {
            gains: vec![5],
            labels: vec!["NL3 Targets".to_string()],
            ..TargetColumns::default()
        };
        let table = TargetTable::from_bytes(TARGETS_CSV.as_bytes(), &layout).unwrap();
        assert_eq!(table.columns[0].label, "NL3 Targets");
    }

    #[test]
    fn test_too_many_gain_columns_rejected() {
        let layout = TargetColumns {
            gains: vec![1, 2, 3, 4],
            ..TargetColumns::default()
        };
        assert!(TargetTable::from_bytes(TARGETS_CSV.as_bytes(), &layout).is_err());
    }

    #[test]
    fn test_gain_interpolation_on_log_axis() {
        let table = TargetTable::from_bytes(TARGETS_CSV.as_bytes(), &TargetColumns::default()).unwrap();
        assert_eq!(table.gain_at(0, 500.0), Some(10.0));
        let mid = table.gain_at(0, 707.1067811865476).unwrap();
        assert!((mid - 15.0).abs() < 1e-6);
        assert_eq!(table.gain_at(0, 125.0), None);
        assert_eq!(table.gain_at(0, 8000.0), None);
    }

    #[test]
    fn test_cache_reuses_identical_content() {
        let mut cache = TargetCache::new();
        let layout = TargetColumns::default();
        let first = cache.load("Targets.csv", TARGETS_CSV.as_bytes(), &layout).unwrap();
        let second = cache.load("copy.csv", TARGETS_CSV.as_bytes(), &layout).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_invalidates_on_reupload() {
        let mut cache = TargetCache::new();
        let layout = TargetColumns::default();
        cache.load("Targets.csv", TARGETS_CSV.as_bytes(), &layout).unwrap();

        let updated = TARGETS_CSV.replace("250,1,2,3,5,4,2", "250,1,2,3,6,4,2");
        let table = cache.load("Targets.csv", updated.as_bytes(), &layout).unwrap();
        assert_eq!(table.columns[0].gains[0], Some(6.0));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate("Targets.csv"));
        assert!(cache.is_empty());
        assert!(!cache.invalidate("Targets.csv"));
    }

    #[test]
    fn test_cache_separates_column_layouts() {
        let mut cache = TargetCache::new();
        let all = TargetColumns::default();
        let single = TargetColumns {
            gains: vec![5],
            ..TargetColumns::default()
        };
        let first = cache.load("Targets.csv", TARGETS_CSV.as_bytes(), &all).unwrap();
        let second = cache.load("Targets.csv", TARGETS_CSV.as_bytes(), &single).unwrap();
        assert_eq!(first.columns.len(), 3);
        assert_eq!(second.columns.len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
