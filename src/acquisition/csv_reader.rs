//! Pump dataset CSV loading
//!
//! Expected format (header row required, column order free):
//! `timestamp,Motor_RPM,Bearing_Temperature_C,...,Ambient_Temperature_C,machine_status`
//!
//! Channel columns may use either the dataset names or the snake_case ids.
//! Rows that fail to parse are skipped with a warning.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use super::payload::parse_timestamp;
use crate::types::{Channel, SensorReading, NUM_CHANNELS};

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} has no header row")]
    MissingHeader(String),

    #[error("{path}: missing column for channel '{}'", .channel.id())]
    MissingColumn { path: String, channel: Channel },
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone)]
struct ColumnMap {
    timestamp: Option<usize>,
    machine_status: Option<usize>,
    channels: [usize; NUM_CHANNELS],
}

impl ColumnMap {
    fn from_header(header: &[String], path: &str) -> Result<Self, CsvError> {
        let mut channels = [usize::MAX; NUM_CHANNELS];
        let mut timestamp = None;
        let mut machine_status = None;
        for (i, name) in header.iter().enumerate() {
            let name = name.trim();
            if name.eq_ignore_ascii_case("timestamp") {
                timestamp = Some(i);
            } else if name.eq_ignore_ascii_case("machine_status") {
                machine_status = Some(i);
            } else if let Some(ch) = Channel::from_name(name) {
                channels[ch.index()] = i;
            }
        }
        if let Some(channel) = Channel::ALL
            .into_iter()
            .find(|ch| channels[ch.index()] == usize::MAX)
        {
            return Err(CsvError::MissingColumn {
                path: path.to_string(),
                channel,
            });
        }
        Ok(Self {
            timestamp,
            machine_status,
            channels,
        })
    }
}

/// Load every parseable row of a pump CSV.
///
/// Rows without a timestamp column are stamped one second apart from now,
/// so replay ordering is preserved.
pub fn read_csv_readings(path: &Path, source: &str) -> Result<Vec<SensorReading>, CsvError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|e| CsvError::Io {
        path: path_str.clone(),
        source: e,
    })?;
    let mut lines = BufReader::new(file).lines();

    let header = loop {
        match lines.next() {
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => break csv_split(&line),
            Some(Err(e)) => {
                return Err(CsvError::Io {
                    path: path_str,
                    source: e,
                })
            }
            None => return Err(CsvError::MissingHeader(path_str)),
        }
    };
    let columns = ColumnMap::from_header(&header, &path_str)?;

    let base = chrono::Utc::now();
    let mut readings = Vec::new();
    let mut skipped = 0usize;

    for (idx, line_result) in lines.enumerate() {
        let line_num = idx + 2;
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error reading CSV line");
                skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&csv_split(&line), &columns, source, base, readings.len()) {
            Ok(r) => readings.push(r),
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error parsing CSV line");
                skipped += 1;
            }
        }
    }

    tracing::info!(count = readings.len(), skipped, path = %path_str, "Loaded pump readings from CSV");
    Ok(readings)
}

fn parse_row(
    fields: &[String],
    columns: &ColumnMap,
    source: &str,
    base: chrono::DateTime<chrono::Utc>,
    ordinal: usize,
) -> Result<SensorReading, String> {
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

    let timestamp = match columns.timestamp {
        Some(i) => parse_timestamp(field(i)).map_err(|e| e.to_string())?,
        None => base + chrono::Duration::seconds(ordinal as i64),
    };

    let mut values = [0.0; NUM_CHANNELS];
    for ch in Channel::ALL {
        let raw = field(columns.channels[ch.index()]);
        let v = raw
            .parse::<f64>()
            .map_err(|_| format!("Cannot parse {} as f64: '{}'", ch.column_name(), raw))?;
        if !v.is_finite() {
            return Err(format!("{} is not finite", ch.column_name()));
        }
        values[ch.index()] = v;
    }

    let machine_status = columns
        .machine_status
        .map(field)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(SensorReading {
        source: source.to_string(),
        timestamp,
        values,
        machine_status,
    })
}

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Write readings in the dataset format (used by the simulation binary).
pub fn write_csv_readings<W: std::io::Write>(out: &mut W, readings: &[SensorReading]) -> std::io::Result<()> {
    let mut header = vec!["timestamp".to_string()];
    header.extend(Channel::ALL.iter().map(|c| c.column_name().to_string()));
    header.push("machine_status".to_string());
    writeln!(out, "{}", header.join(","))?;

    for r in readings {
        let mut row = vec![r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        row.extend(r.values.iter().map(|v| format!("{v:.3}")));
        row.push(r.machine_status.clone().unwrap_or_default());
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "timestamp,Motor_RPM,Bearing_Temperature_C,Oil_Pressure_bar,Vibration_mm_s,Flow_Rate_L_min,Suction_Pressure_bar,Discharge_Pressure_bar,Motor_Current_A,Casing_Temperature_C,Ambient_Temperature_C,machine_status";

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_reads_dataset_format() {
        let f = write_file(&format!(
            "{HEADER}\n2024-01-01 00:00:00,1480,40.5,2.5,2.2,450,1.5,8.0,32,40,25,NORMAL\n2024-01-01 00:00:01,1482,41.0,2.4,2.3,451,1.5,8.1,32.5,40.2,25,NORMAL\n"
        ));
        let readings = read_csv_readings(f.path(), "pump-01").unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value(Channel::BearingTemperature), 40.5);
        assert_eq!(readings[1].value(Channel::MotorCurrent), 32.5);
        assert_eq!(readings[0].machine_status.as_deref(), Some("NORMAL"));
        assert!(readings[1].timestamp > readings[0].timestamp);
    }

    #[test]
    fn test_skips_bad_rows() {
        let f = write_file(&format!(
            "{HEADER}\n2024-01-01 00:00:00,1480,40.5,2.5,2.2,450,1.5,8.0,32,40,25,NORMAL\nbad,row\n\n2024-01-01 00:00:02,1480,abc,2.5,2.2,450,1.5,8.0,32,40,25,NORMAL\n"
        ));
        assert_eq!(read_csv_readings(f.path(), "p").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_column_is_error() {
        let f = write_file("timestamp,Motor_RPM\n2024-01-01 00:00:00,1480\n");
        assert!(matches!(
            read_csv_readings(f.path(), "p"),
            Err(CsvError::MissingColumn { channel: Channel::BearingTemperature, .. })
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(matches!(
            read_csv_readings(Path::new("/nonexistent/pump.csv"), "p"),
            Err(CsvError::Io { .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let f = write_file(&format!(
            "{HEADER}\n2024-01-01 00:00:00,1480,40.5,2.5,2.2,450,1.5,8.0,32,40,25,BROKEN\n"
        ));
        let readings = read_csv_readings(f.path(), "p").unwrap();
        let mut buf = Vec::new();
        write_csv_readings(&mut buf, &readings).unwrap();
        let out = write_file(std::str::from_utf8(&buf).unwrap());
        let again = read_csv_readings(out.path(), "p").unwrap();
        assert_eq!(again[0].values, readings[0].values);
        assert_eq!(again[0].machine_status.as_deref(), Some("BROKEN"));
    }

    #[test]
    fn test_csv_split_quotes() {
        assert_eq!(csv_split("a,\"b,c\",d"), vec!["a", "b,c", "d"]);
        assert_eq!(csv_split("\"x\"\"y\""), vec!["x\"y"]);
    }
}
