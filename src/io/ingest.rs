//! CSV ingest for survey observation files.
//!
//! This module turns a delimited survey file into `Observation`s. It does not
//! derive distances or rename anything; that happens in later pipeline steps.
//!
//! Design goals:
//! - **Explicit schema**: every input role is looked up by header name through
//!   `ColumnMapping`, never by position (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::config::{ColumnMapping, InputConfig};
use crate::domain::{Observation, RowError, Sighting, SurveyData};
use crate::error::AppError;
use crate::schema::SchemaError;

/// Resolved header positions for each input role.
#[derive(Debug, Clone)]
struct ColumnIndex {
    date: Option<usize>,
    sample_label: usize,
    replicate: Option<usize>,
    angle: usize,
    radial_distance: usize,
    size: usize,
    effort: usize,
    /// `(header as written, position)` of every unmapped column.
    extras: Vec<(String, usize)>,
}

/// Load a survey file from disk.
pub fn load_survey(path: &Path, input: &InputConfig) -> Result<SurveyData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open survey file '{}': {e}", path.display())))?;
    read_survey(file, input)
}

/// Load survey observations from any reader (file, buffer, stdin).
pub fn read_survey<R: Read>(reader: R, input: &InputConfig) -> Result<SurveyData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(input.delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read survey headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers)?;
    let index = resolve_columns(&headers, &header_map, &input.columns)?;
    log::debug!("resolved survey columns: {index:?}");

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    sample: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &index, line) {
            Ok((obs, sighting_error)) => {
                if let Some(message) = sighting_error {
                    row_errors.push(RowError {
                        line,
                        sample: Some(obs.sample_label.clone()),
                        message: format!("{message} Sighting dropped, effort kept."),
                    });
                }
                observations.push(obs);
            }
            Err(message) => row_errors.push(RowError {
                line,
                sample: get_optional(&record, index.sample_label).map(str::to_string),
                message,
            }),
        }
    }

    if !row_errors.is_empty() {
        log::warn!("{} of {rows_read} survey rows could not be parsed", row_errors.len());
    }

    Ok(SurveyData {
        observations,
        row_errors,
        extra_columns: index.extras.iter().map(|(name, _)| name.clone()).collect(),
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> Result<HashMap<String, usize>, SchemaError> {
    let mut map = HashMap::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        let key = normalize_header_name(name);
        if map.insert(key.clone(), idx).is_some() {
            return Err(SchemaError::DuplicateColumn(key));
        }
    }
    Ok(map)
}

/// Header as written, minus surrounding whitespace.
fn header_name(name: &str) -> &str {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM; left in
    // place it would make that column look missing.
    name.trim().trim_start_matches('\u{feff}')
}

/// Lookup key for a header: matching is case-insensitive.
fn normalize_header_name(name: &str) -> String {
    header_name(name).to_ascii_lowercase()
}

fn resolve_columns(
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
    mapping: &ColumnMapping,
) -> Result<ColumnIndex, SchemaError> {
    let required = |role: &'static str, column: &str| -> Result<usize, SchemaError> {
        header_map
            .get(&normalize_header_name(column))
            .copied()
            .ok_or_else(|| SchemaError::MissingColumn {
                role,
                column: column.to_string(),
            })
    };
    // Optional roles absent from the header are simply not recorded.
    let optional = |role: &'static str, column: &Option<String>| -> Result<Option<usize>, SchemaError> {
        let Some(column) = column.as_deref() else {
            return Ok(None);
        };
        let idx = header_map.get(&normalize_header_name(column)).copied();
        if idx.is_none() {
            log::debug!("optional {role} column `{column}` not in header");
        }
        Ok(idx)
    };

    let index = ColumnIndex {
        date: optional("date", &mapping.date)?,
        sample_label: required("sample label", &mapping.sample_label)?,
        replicate: optional("replicate", &mapping.replicate)?,
        angle: required("angle", &mapping.angle)?,
        radial_distance: required("radial distance", &mapping.radial_distance)?,
        size: required("cluster size", &mapping.size)?,
        effort: required("effort", &mapping.effort)?,
        extras: Vec::new(),
    };

    let mapped = [
        index.date,
        Some(index.sample_label),
        index.replicate,
        Some(index.angle),
        Some(index.radial_distance),
        Some(index.size),
        Some(index.effort),
    ];
    let mut seen = Vec::with_capacity(mapped.len());
    for pos in mapped.into_iter().flatten() {
        if seen.contains(&pos) {
            let name = header_map
                .iter()
                .find(|(_, i)| **i == pos)
                .map(|(n, _)| n.clone())
                .unwrap_or_default();
            return Err(SchemaError::DuplicateColumn(name));
        }
        seen.push(pos);
    }

    let extras: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| !seen.contains(idx))
        .map(|(idx, name)| (header_name(name).to_string(), idx))
        .collect();

    Ok(ColumnIndex { extras, ..index })
}

/// Parse one row.
///
/// Errors in the transect label, date, replicate or effort drop the row. Once
/// those parse, the row records survey effort, so a bad sighting only clears
/// the sighting and is returned alongside the observation.
fn parse_row(
    record: &StringRecord,
    index: &ColumnIndex,
    line: usize,
) -> Result<(Observation, Option<String>), String> {
    let sample_label = get_required(record, index.sample_label, "sample label")?.to_string();

    let date = match index.date.and_then(|i| get_optional(record, i)) {
        Some(s) => Some(parse_date(s)?),
        None => None,
    };

    let replicate = match index.replicate.and_then(|i| get_optional(record, i)) {
        Some(s) => Some(
            s.parse::<u32>()
                .map_err(|_| format!("Invalid replicate '{s}' (expected a non-negative integer)."))?,
        ),
        None => None,
    };

    let base_effort = parse_f64(get_required(record, index.effort, "effort")?, "effort")?;
    if base_effort <= 0.0 {
        return Err(format!("Invalid effort {base_effort} (must be > 0)."));
    }

    let (sighting, sighting_error) = match parse_sighting(record, index) {
        Ok(s) => (s, None),
        Err(message) => (None, Some(message)),
    };

    let extras: BTreeMap<String, String> = index
        .extras
        .iter()
        .map(|(name, i)| (name.clone(), record.get(*i).unwrap_or("").trim().to_string()))
        .collect();

    let obs = Observation {
        line,
        date,
        sample_label,
        replicate,
        sighting,
        base_effort,
        extras,
    };
    Ok((obs, sighting_error))
}

fn parse_sighting(record: &StringRecord, index: &ColumnIndex) -> Result<Option<Sighting>, String> {
    let angle = get_optional(record, index.angle);
    let radial = get_optional(record, index.radial_distance);
    match (angle, radial) {
        // Transect walked, nothing seen.
        (None, None) => Ok(None),
        (Some(a), Some(r)) => {
            let angle_deg = parse_f64(a, "angle")?;
            let radial_distance = parse_f64(r, "distance")?;
            let size = parse_size(get_optional(record, index.size))?;
            Ok(Some(Sighting::raw(angle_deg, radial_distance, size)))
        }
        (Some(_), None) => Err("Angle present but radial distance missing.".to_string()),
        (None, Some(_)) => Err("Radial distance present but angle missing.".to_string()),
    }
}

fn parse_size(s: Option<&str>) -> Result<u32, String> {
    let s = s.ok_or_else(|| "Missing cluster size for a detection.".to_string())?;
    let size = s
        .parse::<u32>()
        .map_err(|_| format!("Invalid cluster size '{s}' (expected a positive integer)."))?;
    if size == 0 {
        return Err("Cluster size must be >= 1.".to_string());
    }
    Ok(size)
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))
}

/// Field value, treating empty cells and `NA` as missing.
fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("na"))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid {name} '{s}' (expected a number)."))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite {name} '{s}'."))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO dates are preferred, but field sheets often use day-first formats.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,transect,replicate,angle,distance,size,effort,observer
2021-03-01,T1,1,30,100,2,5,AB
2021-03-01,T1,1,0,12.5,1,5,AB
02/03/2021,T2,1,,,,4.5,CD
2021-03-02,T2,2,abc,10,1,4.5,CD
";

    fn load(text: &str) -> Result<SurveyData, AppError> {
        read_survey(text.as_bytes(), &InputConfig::default())
    }

    #[test]
    fn loads_detections_and_effort_only_rows() {
        let data = load(SAMPLE).unwrap();
        assert_eq!(data.rows_read, 4);
        // The unparseable sighting on line 5 leaves an effort-only row.
        assert_eq!(data.observations.len(), 4);
        assert_eq!(data.detection_count(), 2);

        let first = &data.observations[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.sample_label, "T1");
        assert_eq!(first.replicate, Some(1));
        assert_eq!(first.sighting, Some(Sighting::raw(30.0, 100.0, 2)));
        assert_eq!(first.extras.get("observer").map(String::as_str), Some("AB"));

        let empty = &data.observations[2];
        assert!(empty.sighting.is_none());
        assert_eq!(empty.date, NaiveDate::from_ymd_opt(2021, 3, 2));
        assert_eq!(data.extra_columns, vec!["observer".to_string()]);
    }

    #[test]
    fn bad_rows_are_reported_with_line_numbers() {
        let data = load(SAMPLE).unwrap();
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 5);
        assert_eq!(data.row_errors[0].sample.as_deref(), Some("T2"));
        assert!(data.row_errors[0].message.contains("angle"));

        let kept = &data.observations[3];
        assert_eq!(kept.line, 5);
        assert!(kept.sighting.is_none());
        assert_eq!(kept.base_effort, 4.5);
    }

    #[test]
    fn rows_without_effort_are_dropped() {
        let text = "transect,angle,distance,size,effort\nT1,10,20,1,\nT2,10,20,1,5\n";
        let data = load(text).unwrap();
        assert_eq!(data.observations.len(), 1);
        assert_eq!(data.observations[0].sample_label, "T2");
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 2);
    }

    #[test]
    fn extra_columns_keep_their_spelling() {
        let text = "Transect,Angle,Distance,Size,Effort,Observer\nT1,10,20,1,5,AB\n";
        let data = load(text).unwrap();
        assert_eq!(data.extra_columns, vec!["Observer".to_string()]);
        assert_eq!(data.observations[0].extras.get("Observer").map(String::as_str), Some("AB"));
    }

    #[test]
    fn missing_mapped_column_fails_before_any_row() {
        let text = "date,transect,replicate,angle,size,effort\n2021-03-01,T1,1,30,2,5\n";
        let err = load(text).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("distance"));
    }

    #[test]
    fn header_matching_ignores_case_and_bom() {
        let text = "\u{feff}Date,TRANSECT,Replicate,Angle,Distance,Size,Effort\n2021-03-01,T1,1,45,10,1,5\n";
        let data = load(text).unwrap();
        assert_eq!(data.observations.len(), 1);
    }

    #[test]
    fn columns_are_found_by_name_not_position() {
        let text = "effort,size,distance,angle,replicate,transect,date\n5,3,100,30,1,T9,2021-03-01\n";
        let data = load(text).unwrap();
        let obs = &data.observations[0];
        assert_eq!(obs.sample_label, "T9");
        assert_eq!(obs.base_effort, 5.0);
        assert_eq!(obs.sighting, Some(Sighting::raw(30.0, 100.0, 3)));
    }

    #[test]
    fn two_roles_on_one_column_is_rejected() {
        let mut input = InputConfig::default();
        input.columns.angle = "distance".to_string();
        let err = read_survey(SAMPLE.as_bytes(), &input).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn optional_roles_can_be_unmapped() {
        let mut input = InputConfig::default();
        input.columns.date = None;
        input.columns.replicate = None;
        let text = "transect,angle,distance,size,effort\nT1,10,20,1,3\n";
        let data = read_survey(text.as_bytes(), &input).unwrap();
        assert_eq!(data.observations[0].date, None);
        assert_eq!(data.observations[0].replicate, None);

        // Default mapping with the optional columns absent from the file.
        let data = load(text).unwrap();
        assert_eq!(data.observations.len(), 1);
        assert_eq!(data.observations[0].date, None);
    }

    #[test]
    fn zero_cluster_size_is_a_row_error() {
        let text = "date,transect,replicate,angle,distance,size,effort\n2021-03-01,T1,1,10,20,0,5\n";
        let data = load(text).unwrap();
        assert_eq!(data.observations.len(), 1);
        assert_eq!(data.detection_count(), 0);
        assert!(data.row_errors[0].message.contains("Cluster size"));
    }
}
