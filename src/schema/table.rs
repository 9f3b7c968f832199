//! The normalized distance table.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Stratum, Transect, columns};
use crate::schema::SchemaError;

/// One row of the canonical table.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRecord {
    /// Perpendicular distance; `None` on effort-only rows.
    pub distance: Option<f64>,
    pub sample_label: String,
    pub effort: f64,
    /// Cluster size; `None` on effort-only rows.
    pub size: Option<u32>,

    pub date: Option<NaiveDate>,
    pub replicate: Option<u32>,
    pub angle_deg: Option<f64>,
    pub radial_distance: Option<f64>,
    pub extras: BTreeMap<String, String>,
}

/// Column values read back by name.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Real(Vec<Option<f64>>),
    Count(Vec<Option<u32>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Real(v) => v.len(),
            ColumnValues::Count(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render one cell for CSV export (`""` when missing).
    pub fn cell(&self, row: usize) -> String {
        match self {
            ColumnValues::Real(v) => v.get(row).copied().flatten().map(|x| x.to_string()).unwrap_or_default(),
            ColumnValues::Count(v) => v.get(row).copied().flatten().map(|x| x.to_string()).unwrap_or_default(),
            ColumnValues::Text(v) => v.get(row).cloned().flatten().unwrap_or_default(),
        }
    }
}

/// Survey rows in the canonical schema, with a single stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    records: Vec<DistanceRecord>,
    stratum: Stratum,
    extra_columns: Vec<String>,
    visits_applied: Option<u32>,
}

impl DistanceTable {
    /// Build a table with base (unscaled) effort.
    pub fn new(records: Vec<DistanceRecord>, stratum: Stratum, extra_columns: Vec<String>) -> Result<Self, SchemaError> {
        if stratum.label.trim().is_empty() {
            return Err(SchemaError::EmptyRegionLabel);
        }
        if !(stratum.area.is_finite() && stratum.area > 0.0) {
            return Err(SchemaError::InvalidArea(stratum.area));
        }
        if records.is_empty() {
            return Err(SchemaError::NoSamples);
        }
        // An unmapped input column named like a table column would be exported
        // under the same header and shadowed on lookup.
        for extra in &extra_columns {
            if columns::CANONICAL
                .iter()
                .chain(columns::RETAINED.iter())
                .any(|c| c.eq_ignore_ascii_case(extra))
            {
                return Err(SchemaError::DuplicateColumn(extra.clone()));
            }
        }
        for r in &records {
            if !(r.effort.is_finite() && r.effort > 0.0) {
                return Err(SchemaError::InvalidEffort {
                    sample: r.sample_label.clone(),
                    effort: r.effort,
                });
            }
        }
        Ok(Self {
            records,
            stratum,
            extra_columns,
            visits_applied: None,
        })
    }

    /// Multiply every row's effort by the number of repeated visits.
    ///
    /// Effort is cumulative survey length; scaling twice would double count, so
    /// a second call fails and leaves the table untouched.
    pub fn scale_effort(&mut self, visits: u32) -> Result<(), SchemaError> {
        if let Some(applied) = self.visits_applied {
            return Err(SchemaError::EffortAlreadyScaled { visits: applied });
        }
        if visits == 0 {
            return Err(SchemaError::InvalidVisits);
        }
        let factor = f64::from(visits);
        for r in &mut self.records {
            r.effort *= factor;
        }
        self.visits_applied = Some(visits);
        Ok(())
    }

    /// Visit multiplier already applied to effort, if any.
    pub fn visits_applied(&self) -> Option<u32> {
        self.visits_applied
    }

    pub fn records(&self) -> &[DistanceRecord] {
        &self.records
    }

    pub fn stratum(&self) -> &Stratum {
        &self.stratum
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical columns, then retained columns, then unmapped input columns.
    pub fn column_names(&self) -> Vec<String> {
        columns::CANONICAL
            .iter()
            .chain(columns::RETAINED.iter())
            .map(|s| s.to_string())
            .chain(self.extra_columns.iter().cloned())
            .collect()
    }

    /// Read a column back by name.
    pub fn column(&self, name: &str) -> Result<ColumnValues, SchemaError> {
        let rows = &self.records;
        let values = match name {
            columns::DISTANCE => ColumnValues::Real(rows.iter().map(|r| r.distance).collect()),
            columns::SAMPLE_LABEL => ColumnValues::Text(rows.iter().map(|r| Some(r.sample_label.clone())).collect()),
            columns::EFFORT => ColumnValues::Real(rows.iter().map(|r| Some(r.effort)).collect()),
            columns::REGION_LABEL => ColumnValues::Text(vec![Some(self.stratum.label.clone()); rows.len()]),
            columns::AREA => ColumnValues::Real(vec![Some(self.stratum.area); rows.len()]),
            columns::SIZE => ColumnValues::Count(rows.iter().map(|r| r.size).collect()),
            columns::DATE => ColumnValues::Text(rows.iter().map(|r| r.date.map(|d| d.to_string())).collect()),
            columns::REPLICATE => ColumnValues::Count(rows.iter().map(|r| r.replicate).collect()),
            columns::ANGLE => ColumnValues::Real(rows.iter().map(|r| r.angle_deg).collect()),
            columns::RADIAL_DISTANCE => ColumnValues::Real(rows.iter().map(|r| r.radial_distance).collect()),
            other if self.extra_columns.iter().any(|c| c == other) => {
                ColumnValues::Text(rows.iter().map(|r| r.extras.get(other).cloned()).collect())
            }
            other => return Err(SchemaError::UnknownColumn(other.to_string())),
        };
        Ok(values)
    }

    /// Distinct transects in order of first appearance.
    ///
    /// Every row of a transect carries the same effort (checked during
    /// normalization), so the first row's value is the transect's effort.
    pub fn transects(&self) -> Vec<Transect> {
        let mut out: Vec<Transect> = Vec::new();
        for r in &self.records {
            if !out.iter().any(|t| t.label == r.sample_label) {
                out.push(Transect {
                    label: r.sample_label.clone(),
                    effort: r.effort,
                });
            }
        }
        out
    }

    /// Total effort `L` over distinct transects.
    pub fn total_effort(&self) -> f64 {
        self.transects().iter().map(|t| t.effort).sum()
    }

    /// `(sample label, distance, size)` for every detection row.
    pub fn detections(&self) -> impl Iterator<Item = (&str, f64, u32)> {
        self.records.iter().filter_map(|r| match (r.distance, r.size) {
            (Some(d), Some(s)) => Some((r.sample_label.as_str(), d, s)),
            _ => None,
        })
    }

    pub fn max_distance(&self) -> Option<f64> {
        self.detections().map(|(_, d, _)| d).fold(None, |acc, d| match acc {
            Some(m) if m >= d => Some(m),
            _ => Some(d),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, distance: Option<f64>, effort: f64) -> DistanceRecord {
        DistanceRecord {
            distance,
            sample_label: label.to_string(),
            effort,
            size: distance.map(|_| 1),
            date: None,
            replicate: None,
            angle_deg: None,
            radial_distance: None,
            extras: BTreeMap::new(),
        }
    }

    fn table() -> DistanceTable {
        DistanceTable::new(
            vec![record("A", Some(10.0), 5.0), record("A", Some(20.0), 5.0), record("B", None, 2.5)],
            Stratum {
                label: "GPNP".to_string(),
                area: 10.8,
            },
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn scale_effort_applies_exactly_once() {
        let mut t = table();
        t.scale_effort(8).unwrap();
        assert_eq!(t.total_effort(), 40.0 + 20.0);
        assert_eq!(t.visits_applied(), Some(8));

        let err = t.scale_effort(8).unwrap_err();
        assert_eq!(err, SchemaError::EffortAlreadyScaled { visits: 8 });
        // Untouched by the rejected call.
        assert_eq!(t.records()[0].effort, 40.0);
    }

    #[test]
    fn zero_visits_is_rejected() {
        let mut t = table();
        assert_eq!(t.scale_effort(0).unwrap_err(), SchemaError::InvalidVisits);
        assert_eq!(t.visits_applied(), None);
    }

    #[test]
    fn constant_columns_repeat_per_row() {
        let t = table();
        assert_eq!(
            t.column("Region.Label").unwrap(),
            ColumnValues::Text(vec![Some("GPNP".to_string()); 3])
        );
        assert_eq!(t.column("Area").unwrap(), ColumnValues::Real(vec![Some(10.8); 3]));
        assert!(matches!(t.column("Distance"), Err(SchemaError::UnknownColumn(_))));
    }

    #[test]
    fn transects_and_detections() {
        let t = table();
        let labels: Vec<String> = t.transects().into_iter().map(|tr| tr.label).collect();
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(t.detections().count(), 2);
        assert_eq!(t.max_distance(), Some(20.0));
    }

    #[test]
    fn rejects_non_positive_area() {
        let err = DistanceTable::new(
            vec![record("A", Some(1.0), 1.0)],
            Stratum {
                label: "R".to_string(),
                area: -1.0,
            },
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::InvalidArea(-1.0));
    }

    #[test]
    fn extra_columns_may_not_shadow_table_columns() {
        let stratum = Stratum {
            label: "GPNP".to_string(),
            area: 10.8,
        };
        for name in ["date", "Distance", "radial_distance", "sample.label"] {
            let err = DistanceTable::new(vec![record("A", Some(1.0), 1.0)], stratum.clone(), vec![name.to_string()])
                .unwrap_err();
            assert_eq!(err, SchemaError::DuplicateColumn(name.to_string()));
        }

        let t = DistanceTable::new(vec![record("A", Some(1.0), 1.0)], stratum, vec!["Observer".to_string()]).unwrap();
        assert_eq!(t.column_names().last().map(String::as_str), Some("Observer"));
    }
}
