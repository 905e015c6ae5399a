use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Separator between curves in a measured-data file.
pub const CURVE_SEPARATOR: char = '>';

/// Total aggregate mass sampled over time. `times` is non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MassCurve {
    pub times: Vec<f64>,
    pub masses: Vec<f64>,
}

impl MassCurve {
    pub fn new(times: Vec<f64>, masses: Vec<f64>) -> Result<Self> {
        if times.len() != masses.len() {
            return Err(Error::DimensionMismatch {
                what: "masses per time sample",
                expected: times.len(),
                found: masses.len(),
            });
        }
        Ok(MassCurve { times, masses })
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MassCurve {
            times: Vec::with_capacity(capacity),
            masses: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: f64, mass: f64) {
        self.times.push(time);
        self.masses.push(mass);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.masses.iter().copied())
    }

    /// Mass at `time`.
    ///
    /// An exact time match returns its mass. Otherwise the two masses around the
    /// insertion point are averaged, without weighting by position. Times outside the
    /// recorded range clamp to the first or last mass. `None` for an empty curve.
    pub fn lookup(&self, time: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        match self.times.binary_search_by(|t| t.total_cmp(&time)) {
            Ok(idx) => Some(self.masses[idx]),
            Err(0) => Some(self.masses[0]),
            Err(idx) if idx == self.len() => Some(self.masses[idx - 1]),
            Err(idx) => Some((self.masses[idx - 1] + self.masses[idx]) / 2.0),
        }
    }

    /// Divides every mass, in place, by the mass found at `time`.
    pub fn normalize(&mut self, time: f64) -> Result<()> {
        let value = self.lookup(time).ok_or(Error::EmptyCurve { index: 0 })?;
        if value == 0.0 || !value.is_finite() {
            return Err(Error::DegenerateNormalization { time, value });
        }
        self.masses.iter_mut().for_each(|m| *m /= value);
        Ok(())
    }

    /// Parses whitespace-separated `time,mass` records.
    pub fn parse(text: &str) -> Result<Self> {
        let mut curve = MassCurve::default();
        for (idx, token) in text.split_whitespace().enumerate() {
            let (time, mass) = token.split_once(',').ok_or_else(|| Error::Parse {
                kind: "mass curve",
                line: idx + 1,
                message: format!("expected `time,mass`, found `{token}`"),
            })?;
            curve.push(parse_number(time, idx + 1)?, parse_number(mass, idx + 1)?);
        }
        Ok(curve)
    }

    /// Parses a measured-data file holding one or more curves separated by `>`.
    pub fn parse_many(text: &str) -> Result<Vec<Self>> {
        text.split(CURVE_SEPARATOR)
            .filter(|record| !record.trim().is_empty())
            .map(MassCurve::parse)
            .collect()
    }

    /// Writes one `time,mass` line per sample.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        for (time, mass) in self.iter() {
            writer.write_record([time.to_string(), mass.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::InvalidSettings(e.to_string()))
    }
}

fn parse_number(field: &str, line: usize) -> Result<f64> {
    field.trim().parse::<f64>().map_err(|e| Error::Parse {
        kind: "mass curve",
        line,
        message: format!("`{field}`: {e}"),
    })
}
