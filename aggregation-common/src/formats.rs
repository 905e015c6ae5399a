//! Delimited text formats for parameters, initial conditions and concentration output.
//!
//! Mass curves carry their own format in [`crate::mass_curve`].

use crate::error::{Error, Result};
use crate::params::{ParamVector, PARAM_DIM};
use crate::state::KineticState;
use std::io::Write;

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn parse_fields(record: &csv::StringRecord, kind: &'static str, line: usize) -> Result<Vec<f64>> {
    record
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            field.parse::<f64>().map_err(|e| Error::Parse {
                kind,
                line,
                message: format!("field {} `{}`: {}", idx + 1, field, e),
            })
        })
        .collect()
}

/// One parameter vector per line: `n, r, f0, f1, f2, b0, b1, b2`.
pub fn parse_params(text: &str) -> Result<Vec<ParamVector>> {
    let mut params = Vec::new();
    for (idx, record) in reader(text).records().enumerate() {
        let record = record?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        let values = parse_fields(&record, "parameter", line)?;
        let values: [f64; PARAM_DIM] = values.try_into().map_err(|v: Vec<f64>| Error::Parse {
            kind: "parameter",
            line,
            message: format!("expected {} fields, found {}", PARAM_DIM, v.len()),
        })?;
        params.push(ParamVector::from_array(values));
    }
    Ok(params)
}

/// One initial state per line: `im, am, agg0, agg1, ...` with at least one aggregate bin.
pub fn parse_conditions(text: &str) -> Result<Vec<KineticState>> {
    let mut conditions = Vec::new();
    for (idx, record) in reader(text).records().enumerate() {
        let record = record?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        let values = parse_fields(&record, "initial condition", line)?;
        if values.len() < 3 {
            return Err(Error::DimensionMismatch {
                what: "fields in initial condition (im, am, at least one aggregate)",
                expected: 3,
                found: values.len(),
            });
        }
        conditions.push(KineticState::new(values[0], values[1], values[2..].to_vec()));
    }
    Ok(conditions)
}

/// Streams `time, im, am, agg0, ..., aggK` rows.
pub struct ConcentrationWriter<W: Write> {
    writer: csv::Writer<W>,
    max_bins: Option<usize>,
    row: Vec<String>,
}

impl<W: Write> ConcentrationWriter<W> {
    /// `max_bins` caps how many aggregate columns are written per row.
    pub fn new(writer: W, max_bins: Option<usize>) -> Self {
        ConcentrationWriter {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(writer),
            max_bins,
            row: Vec::new(),
        }
    }

    pub fn write_state(&mut self, time: f64, state: &KineticState) -> Result<()> {
        let bins = self
            .max_bins
            .map_or(state.aggregate_count(), |max| max.min(state.aggregate_count()));
        self.row.clear();
        self.row.push(time.to_string());
        self.row.push(state.inactive.to_string());
        self.row.push(state.active.to_string());
        self.row.extend(state.aggregates[..bins].iter().map(f64::to_string));
        self.writer.write_record(&self.row)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_file_field_order() {
        let params = parse_params("4, 2, 0.01, 1.5, 3000, 0.05, 1, 1000\n1,1,1,1,1,1,1,1\n").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].n, 4.0);
        assert_eq!(params[0].forward, [0.01, 1.5, 3000.0]);
        assert_eq!(params[0].backward, [0.05, 1.0, 1000.0]);
    }

    #[test]
    fn params_with_wrong_field_count_fail() {
        let err = parse_params("1,2,3\n").unwrap_err();
        assert!(matches!(err, Error::Parse { kind: "parameter", line: 1, .. }));
    }

    #[test]
    fn malformed_number_names_its_line() {
        let err = parse_params("1,1,1,1,1,1,1,1\n1,1,x,1,1,1,1,1\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn conditions_have_variable_length() {
        let conditions = parse_conditions("1,0,0,0\n0.5,0.1,0.2\n").unwrap();
        assert_eq!(conditions[0].aggregate_count(), 2);
        assert_eq!(conditions[1], KineticState::new(0.5, 0.1, vec![0.2]));
    }

    #[test]
    fn conditions_without_aggregates_are_rejected() {
        let err = parse_conditions("1,0\n").unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { found: 2, .. }));
    }

    #[test]
    fn concentration_rows_respect_bin_cap() {
        let state = KineticState::new(1.0, 0.5, vec![0.25, 0.125, 0.0625]);
        let mut writer = ConcentrationWriter::new(Vec::new(), Some(2));
        writer.write_state(0.5, &state).unwrap();
        let mut uncapped = ConcentrationWriter::new(writer.finish().unwrap(), None);
        uncapped.write_state(1.0, &state).unwrap();
        let text = String::from_utf8(uncapped.finish().unwrap()).unwrap();
        assert_eq!(text, "0.5,1,0.5,0.25,0.125\n1,1,0.5,0.25,0.125,0.0625\n");
    }
}
