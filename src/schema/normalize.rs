//! Loaded survey → canonical distance table.

use std::collections::HashMap;

use crate::config::DesignConfig;
use crate::domain::{Stratum, SurveyData};
use crate::schema::{DistanceRecord, DistanceTable, SchemaError};

/// Rename the loaded survey into the canonical schema, attach the stratum and
/// scale effort by the visit count.
///
/// Every sighting must already carry a derived distance
/// (see [`SurveyData::derive_distances`]).
pub fn normalize(survey: &SurveyData, design: &DesignConfig) -> Result<DistanceTable, SchemaError> {
    if survey.observations.is_empty() {
        return Err(SchemaError::NoSamples);
    }

    let mut base_effort: HashMap<&str, f64> = HashMap::new();
    for obs in &survey.observations {
        match base_effort.get(obs.sample_label.as_str()) {
            Some(&first) if (first - obs.base_effort).abs() > 1e-9 * first.abs().max(1.0) => {
                return Err(SchemaError::InconsistentEffort {
                    sample: obs.sample_label.clone(),
                    first,
                    second: obs.base_effort,
                });
            }
            Some(_) => {}
            None => {
                base_effort.insert(obs.sample_label.as_str(), obs.base_effort);
            }
        }
    }

    let records = survey
        .observations
        .iter()
        .map(|obs| {
            let (distance, size, angle_deg, radial_distance) = match &obs.sighting {
                Some(s) => {
                    let d = s.distance.ok_or(SchemaError::MissingDistance { line: obs.line })?;
                    (Some(d), Some(s.size), Some(s.angle_deg), Some(s.radial_distance))
                }
                None => (None, None, None, None),
            };
            Ok(DistanceRecord {
                distance,
                sample_label: obs.sample_label.clone(),
                effort: obs.base_effort,
                size,
                date: obs.date,
                replicate: obs.replicate,
                angle_deg,
                radial_distance,
                extras: obs.extras.clone(),
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    let stratum = Stratum {
        label: design.region_label.clone(),
        area: design.area,
    };
    let mut table = DistanceTable::new(records, stratum, survey.extra_columns.clone())?;
    table.scale_effort(design.visits)?;

    log::info!(
        "normalized {} rows over {} transects (effort × {} visits)",
        table.len(),
        table.transects().len(),
        design.visits
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{AnglePolicy, Observation, Sighting};
    use crate::schema::ColumnValues;

    fn survey() -> SurveyData {
        let mut extras = BTreeMap::new();
        extras.insert("observer".to_string(), "JD".to_string());
        let mut data = SurveyData {
            observations: vec![
                Observation {
                    line: 2,
                    date: NaiveDate::from_ymd_opt(2019, 3, 14),
                    sample_label: "T1".to_string(),
                    replicate: Some(1),
                    sighting: Some(Sighting::raw(30.0, 100.0, 2)),
                    base_effort: 5.0,
                    extras: extras.clone(),
                },
                Observation {
                    line: 3,
                    date: None,
                    sample_label: "T2".to_string(),
                    replicate: Some(1),
                    sighting: None,
                    base_effort: 3.0,
                    extras: BTreeMap::new(),
                },
            ],
            row_errors: Vec::new(),
            extra_columns: vec!["observer".to_string()],
            rows_read: 2,
        };
        data.derive_distances(AnglePolicy::Reject);
        data
    }

    #[test]
    fn rename_round_trip_preserves_values() {
        let table = normalize(&survey(), &DesignConfig::default()).unwrap();

        let ColumnValues::Real(distance) = table.column("distance").unwrap() else {
            panic!("distance should be real-valued");
        };
        assert!((distance[0].unwrap() - 86.6025).abs() < 1e-3);
        assert_eq!(distance[1], None);

        assert_eq!(
            table.column("Sample.Label").unwrap(),
            ColumnValues::Text(vec![Some("T1".to_string()), Some("T2".to_string())])
        );
        assert_eq!(table.column("size").unwrap(), ColumnValues::Count(vec![Some(2), None]));
        assert_eq!(table.column("Effort").unwrap(), ColumnValues::Real(vec![Some(40.0), Some(24.0)]));
        assert_eq!(table.column("Area").unwrap(), ColumnValues::Real(vec![Some(10.8); 2]));
        assert_eq!(
            table.column("observer").unwrap(),
            ColumnValues::Text(vec![Some("JD".to_string()), None])
        );
        assert_eq!(table.column("date").unwrap().cell(0), "2019-03-14");
        assert_eq!(table.visits_applied(), Some(8));
    }

    #[test]
    fn normalized_table_cannot_be_rescaled() {
        let mut table = normalize(&survey(), &DesignConfig::default()).unwrap();
        assert_eq!(
            table.scale_effort(8).unwrap_err(),
            SchemaError::EffortAlreadyScaled { visits: 8 }
        );
    }

    #[test]
    fn inconsistent_base_effort_is_rejected() {
        let mut data = survey();
        let mut extra = data.observations[1].clone();
        extra.line = 4;
        extra.base_effort = 4.0;
        data.observations.push(extra);

        let err = normalize(&data, &DesignConfig::default()).unwrap_err();
        assert!(matches!(err, SchemaError::InconsistentEffort { ref sample, .. } if sample == "T2"));
    }

    #[test]
    fn underived_sighting_is_rejected() {
        let mut data = survey();
        data.observations[0].sighting = Some(Sighting::raw(10.0, 50.0, 1));
        let err = normalize(&data, &DesignConfig::default()).unwrap_err();
        assert_eq!(err, SchemaError::MissingDistance { line: 2 });
    }

    #[test]
    fn empty_survey_has_no_samples() {
        let err = normalize(&SurveyData::default(), &DesignConfig::default()).unwrap_err();
        assert_eq!(err, SchemaError::NoSamples);
    }
}
