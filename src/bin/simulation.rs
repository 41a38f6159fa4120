//! Pump Sensor Simulation
//!
//! Generates plausible pump telemetry for exercising PUMPGUARD.
//! A run moves through three phases:
//! - Healthy operation around the fitted profile
//! - Bearing degradation (temperature and vibration ramp, current draw rises)
//! - Failure (values past the critical operating limits)
//!
//! # Usage
//! ```bash
//! # Write a dataset for replay
//! ./pump-simulation --readings 500 --output data/simulated.csv
//!
//! # Stream live to a running service at 5 readings per second
//! ./pump-simulation --readings 500 --url http://localhost:8080 --rate 5
//! ```

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use pumpguard::acquisition::{to_payload, write_csv_readings};
use pumpguard::types::{Channel, SensorReading, NUM_CHANNELS};

// ============================================================================
// Pump Constants
// ============================================================================

/// Healthy bearing temperature (°C)
const BASE_BEARING_TEMP: f64 = 40.0;
/// Bearing temperature at full degradation (°C)
const FAILED_BEARING_TEMP: f64 = 92.0;
/// Healthy vibration (mm/s)
const BASE_VIBRATION: f64 = 2.5;
/// Vibration at full degradation (mm/s)
const FAILED_VIBRATION: f64 = 9.0;
/// Healthy motor current (A)
const BASE_CURRENT: f64 = 32.0;
/// Healthy oil pressure (bar)
const BASE_OIL_PRESSURE: f64 = 2.5;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pump-simulation")]
#[command(about = "Pump telemetry simulation for PUMPGUARD testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of readings to generate
    #[arg(short = 'n', long, default_value = "500")]
    readings: u32,

    /// Fraction of the run spent healthy before degradation starts
    #[arg(long, default_value = "0.6")]
    healthy_fraction: f64,

    /// Fraction of the run spent degrading before failure
    #[arg(long, default_value = "0.3")]
    degradation_fraction: f64,

    /// Write CSV to this file (stdout when neither --output nor --url is set)
    #[arg(short, long, conflicts_with = "url")]
    output: Option<PathBuf>,

    /// Stream readings to a running service at this base URL
    #[arg(long)]
    url: Option<String>,

    /// Readings per second when streaming
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=1000))]
    rate: u32,

    /// Source id stamped on every reading
    #[arg(long, default_value = "pump-01")]
    source: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the phase log on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Simulation Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Healthy,
    Degradation,
    Failure,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Healthy => "Healthy Operation",
            Phase::Degradation => "Bearing Degradation",
            Phase::Failure => "Bearing Failure",
        }
    }

    fn machine_status(&self) -> &'static str {
        match self {
            Phase::Healthy => "NORMAL",
            Phase::Degradation => "NORMAL",
            Phase::Failure => "BROKEN",
        }
    }
}

// ============================================================================
// Simulation State
// ============================================================================

struct Simulator {
    rng: StdRng,
    total: u32,
    healthy_end: f64,
    degradation_end: f64,
    source: String,
    noise: Normal<f64>,
    generated: u32,
}

impl Simulator {
    fn new(args: &Args) -> Result<Self> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let healthy_end = args.healthy_fraction.clamp(0.0, 1.0);
        let degradation_end = (healthy_end + args.degradation_fraction.max(0.0)).min(1.0);
        Ok(Self {
            rng,
            total: args.readings.max(1),
            healthy_end,
            degradation_end,
            source: args.source.clone(),
            noise: Normal::new(0.0, 0.01).context("invalid noise distribution")?,
            generated: 0,
        })
    }

    fn progress(&self) -> f64 {
        self.generated as f64 / self.total as f64
    }

    fn phase(&self) -> Phase {
        match self.progress() {
            p if p < self.healthy_end => Phase::Healthy,
            p if p < self.degradation_end => Phase::Degradation,
            _ => Phase::Failure,
        }
    }

    /// Degradation severity in [0, 1].
    fn severity(&self) -> f64 {
        match self.phase() {
            Phase::Healthy => 0.0,
            Phase::Degradation => {
                let span = (self.degradation_end - self.healthy_end).max(f64::EPSILON);
                ((self.progress() - self.healthy_end) / span).clamp(0.0, 1.0)
            }
            Phase::Failure => 1.0,
        }
    }

    fn jitter(&mut self, base: f64) -> f64 {
        base * (1.0 + self.noise.sample(&mut self.rng))
    }

    fn next_reading(&mut self, start: chrono::DateTime<Utc>) -> SensorReading {
        let phase = self.phase();
        let s = self.severity();

        let mut values = [0.0; NUM_CHANNELS];
        values[Channel::MotorRpm.index()] = self.jitter(1_480.0 - 30.0 * s);
        values[Channel::BearingTemperature.index()] =
            self.jitter(BASE_BEARING_TEMP + (FAILED_BEARING_TEMP - BASE_BEARING_TEMP) * s);
        values[Channel::OilPressure.index()] = self.jitter(BASE_OIL_PRESSURE - 0.6 * s);
        values[Channel::Vibration.index()] =
            self.jitter(BASE_VIBRATION + (FAILED_VIBRATION - BASE_VIBRATION) * s * s);
        values[Channel::FlowRate.index()] = self.jitter(450.0 - 60.0 * s);
        values[Channel::SuctionPressure.index()] = self.jitter(1.5);
        values[Channel::DischargePressure.index()] = self.jitter(8.0 - 1.0 * s);
        values[Channel::MotorCurrent.index()] = self.jitter(BASE_CURRENT + 10.0 * s);
        values[Channel::CasingTemperature.index()] = self.jitter(40.0 + 15.0 * s);
        values[Channel::AmbientTemperature.index()] = self.jitter(25.0);

        let timestamp = start + ChronoDuration::seconds(self.generated as i64);
        self.generated += 1;

        let mut reading = SensorReading::new(self.source.clone(), timestamp, values);
        reading.machine_status = Some(phase.machine_status().to_string());
        reading
    }
}

// ============================================================================
// Output
// ============================================================================

fn generate(sim: &mut Simulator, quiet: bool) -> Vec<SensorReading> {
    let start = Utc::now();
    let mut readings = Vec::with_capacity(sim.total as usize);
    let mut last_phase = None;

    while sim.generated < sim.total {
        let phase = sim.phase();
        if !quiet && last_phase != Some(phase) {
            eprintln!("▶ [{:>5}] {}", sim.generated, phase.name());
            last_phase = Some(phase);
        }
        readings.push(sim.next_reading(start));
    }
    readings
}

async fn stream(readings: &[SensorReading], base_url: &str, rate: u32, quiet: bool) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("building HTTP client")?;
    let url = format!("{}/api/v2/ingest", base_url.trim_end_matches('/'));
    let mut ticker = tokio::time::interval(Duration::from_millis(1_000 / rate as u64));

    let mut accepted = 0u32;
    let mut rejected = 0u32;
    for reading in readings {
        ticker.tick().await;
        let response = client
            .post(&url)
            .json(&to_payload(reading))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        if response.status().is_success() {
            accepted += 1;
        } else {
            rejected += 1;
            if !quiet {
                eprintln!("⚠ {} rejected reading at {}", response.status(), reading.timestamp);
            }
        }
    }

    if !quiet {
        eprintln!("✓ Streamed {} readings ({} accepted, {} rejected)", readings.len(), accepted, rejected);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut sim = Simulator::new(&args)?;
    let readings = generate(&mut sim, args.quiet);

    if let Some(url) = args.url.as_deref() {
        return stream(&readings, url, args.rate, args.quiet).await;
    }

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut out = io::BufWriter::new(file);
            write_csv_readings(&mut out, &readings)?;
            out.flush()?;
            if !args.quiet {
                eprintln!("✓ Wrote {} readings to {}", readings.len(), path.display());
            }
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_csv_readings(&mut out, &readings)?;
            out.flush()?;
        }
    }

    Ok(())
}
