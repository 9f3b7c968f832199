//! Export the normalized table (CSV) and the analysis report (JSON).
//!
//! The CSV is meant to be easy to consume in spreadsheets or other
//! distance-sampling software: canonical column names first, then retained
//! columns, then any unmapped input columns.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::report::Report;
use crate::schema::DistanceTable;

/// Write the normalized table to a CSV file.
pub fn write_table_csv(path: &Path, table: &DistanceTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_table(file, table)
}

/// Write the normalized table as CSV to any writer.
pub fn write_table<W: Write>(writer: W, table: &DistanceTable) -> Result<(), AppError> {
    let names = table.column_names();
    let columns = names
        .iter()
        .map(|name| table.column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&names)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;
    for row in 0..table.len() {
        wtr.write_record(columns.iter().map(|c| c.cell(row)))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write the report as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &Report) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesignConfig, InputConfig};
    use crate::io::read_survey;
    use crate::schema::normalize;

    #[test]
    fn table_csv_has_canonical_header() {
        let csv = "date,transect,replicate,angle,distance,size,effort,observer\n\
                   2019-03-01,T1,1,30,100,2,5,JD\n\
                   2019-03-01,T2,1,,,,3,JD\n";
        let input = InputConfig::default();
        let mut survey = read_survey(csv.as_bytes(), &input).unwrap();
        survey.derive_distances(input.angle_policy);
        let table = normalize(&survey, &DesignConfig::default()).unwrap();

        let mut buf = Vec::new();
        write_table(&mut buf, &table).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "distance,Sample.Label,Effort,Region.Label,Area,size,date,replicate,angle,radial_distance,observer"
        );
        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert!(first[0].starts_with("86.60254"));
        assert_eq!(&first[1..6], &["T1", "40", "GPNP", "10.8", "2"]);
        assert_eq!(first[10], "JD");

        let effort_only: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(effort_only[0], "");
        assert_eq!(effort_only[2], "24");
        assert_eq!(effort_only[5], "");
    }
}
