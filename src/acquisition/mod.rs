//! Sensor data acquisition
//!
//! Boundary parsing for readings entering the pipeline: JSON ingestion
//! payloads and the plant's CSV exports used for replay.

pub mod csv_reader;
pub mod payload;

pub use csv_reader::{read_csv_readings, write_csv_readings, CsvError};
pub use payload::{parse_payload, parse_timestamp, reading_from_value, to_payload, PayloadError};
