//! CSV gradient dataset loading
//!
//! Reads rows of `feature1,...,featureN,grad,hess`. An empty feature cell (or
//! `NA`/`nan`) marks a missing value. Lines starting with `#` are comments.

use anyhow::{Context, Result};
use std::path::Path;

use crate::search::ColumnEntry;
use crate::stats::GradStats;

/// Rows of feature values with their gradient pairs
#[derive(Clone, Debug, Default)]
pub struct GradientDataset {
    pub features: Vec<Vec<Option<f32>>>,
    pub gradients: Vec<f64>,
    pub hessians: Vec<f64>,
    pub feature_count: usize,
}

fn parse_feature(cell: &str) -> Result<Option<f32>> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f32 = cell.parse().context("invalid feature value")?;
    Ok(Some(value))
}

impl GradientDataset {
    /// Load dataset from CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).context("Failed to read CSV file")?;
        Self::from_csv_str(&content)
    }

    /// Parse dataset from CSV text
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut dataset = GradientDataset::default();

        for (line_idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
            if parts.len() < 3 {
                anyhow::bail!(
                    "Line {}: expected at least one feature plus grad and hess columns",
                    line_idx + 1
                );
            }

            let feature_count = parts.len() - 2;
            if dataset.features.is_empty() {
                dataset.feature_count = feature_count;
            } else if feature_count != dataset.feature_count {
                anyhow::bail!(
                    "Line {}: expected {} features, got {}",
                    line_idx + 1,
                    dataset.feature_count,
                    feature_count
                );
            }

            let row = parts[..feature_count]
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    parse_feature(cell)
                        .with_context(|| format!("Line {}, column {}", line_idx + 1, i + 1))
                })
                .collect::<Result<Vec<_>>>()?;

            let grad: f64 = parts[feature_count]
                .parse()
                .with_context(|| format!("Line {}: invalid gradient", line_idx + 1))?;
            let hess: f64 = parts[feature_count + 1]
                .parse()
                .with_context(|| format!("Line {}: invalid hessian", line_idx + 1))?;
            if !(hess >= 0.0) {
                anyhow::bail!("Line {}: hessian must be non-negative, got {}", line_idx + 1, hess);
            }

            dataset.features.push(row);
            dataset.gradients.push(grad);
            dataset.hessians.push(hess);
        }

        if dataset.features.is_empty() {
            anyhow::bail!("Dataset is empty");
        }
        Ok(dataset)
    }

    /// Get number of rows
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Gradient statistics of all rows
    pub fn total(&self) -> GradStats {
        let mut stats = GradStats::default();
        for (&g, &h) in self.gradients.iter().zip(&self.hessians) {
            stats.add(g, h);
        }
        stats
    }

    /// Present values of every feature, sorted ascending
    pub fn columns(&self) -> Vec<Vec<ColumnEntry>> {
        let mut columns = vec![Vec::new(); self.feature_count];
        for (row, (&g, &h)) in self
            .features
            .iter()
            .zip(self.gradients.iter().zip(&self.hessians))
        {
            for (column, value) in columns.iter_mut().zip(row) {
                if let Some(v) = value {
                    column.push(ColumnEntry::new(*v, g, h));
                }
            }
        }
        for column in &mut columns {
            column.sort_by(|a, b| a.value.total_cmp(&b.value));
        }
        columns
    }

    /// Min/max of present values per feature, `None` when a feature is
    /// entirely missing
    pub fn feature_stats(&self) -> Vec<Option<(f32, f32)>> {
        let mut stats: Vec<Option<(f32, f32)>> = vec![None; self.feature_count];
        for row in &self.features {
            for (slot, value) in stats.iter_mut().zip(row) {
                if let Some(v) = *value {
                    *slot = Some(match *slot {
                        Some((min, max)) => (min.min(v), max.max(v)),
                        None => (v, v),
                    });
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# f0,f1,grad,hess")?;
        writeln!(file, "3.0,1.0,-1.0,1.0")?;
        writeln!(file, "1.0,,0.5,1.0")?;
        writeln!(file, "2.0,NA,2.0,0.5")?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> Result<()> {
        let file = create_test_csv()?;
        let dataset = GradientDataset::from_csv(file.path())?;

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.feature_count, 2);
        assert_eq!(dataset.features[0], vec![Some(3.0), Some(1.0)]);
        assert_eq!(dataset.features[1], vec![Some(1.0), None]);
        assert_eq!(dataset.total(), GradStats::new(1.5, 2.5));

        Ok(())
    }

    #[test]
    fn test_columns_sorted_without_missing() -> Result<()> {
        let file = create_test_csv()?;
        let dataset = GradientDataset::from_csv(file.path())?;
        let columns = dataset.columns();

        let values: Vec<f32> = columns[0].iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(columns[0][0].grad, 0.5);
        assert_eq!(columns[1].len(), 1);

        Ok(())
    }

    #[test]
    fn test_feature_stats() -> Result<()> {
        let dataset = GradientDataset::from_csv_str("1.0,,0.0,1.0\n4.0,,0.0,1.0\n")?;
        let stats = dataset.feature_stats();
        assert_eq!(stats, vec![Some((1.0, 4.0)), None]);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(GradientDataset::from_csv_str("1.0,2.0\n").is_err());
        assert!(GradientDataset::from_csv_str("1.0,0.5,1.0\n1.0,2.0,0.5,1.0\n").is_err());
        assert!(GradientDataset::from_csv_str("x,0.5,1.0\n").is_err());
        assert!(GradientDataset::from_csv_str("1.0,0.5,-1.0\n").is_err());
        assert!(GradientDataset::from_csv_str("# only a comment\n").is_err());
    }
}
