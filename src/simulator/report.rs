//! Outcome tally for a simulation run.

use std::fmt;
use std::time::Duration;

use dice_sdk::SdkError;

/// How one simulated request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    DieFailure,
    Unavailable,
    Timeout,
    ClientError,
    TransportError,
}

impl Outcome {
    /// Classify a gateway call result.
    pub fn of<T>(result: &Result<T, SdkError>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) if e.is_timeout() => Outcome::Timeout,
            Err(e) => match e.status() {
                Some(500) => Outcome::DieFailure,
                Some(504) => Outcome::Timeout,
                Some(status) if (400..500).contains(&status) => Outcome::ClientError,
                Some(_) => Outcome::Unavailable,
                None => Outcome::TransportError,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::DieFailure => "die_failure",
            Outcome::Unavailable => "unavailable",
            Outcome::Timeout => "timeout",
            Outcome::ClientError => "client_error",
            Outcome::TransportError => "transport_error",
        }
    }
}

/// Counts by outcome plus wall-clock duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub success: usize,
    pub die_failure: usize,
    pub unavailable: usize,
    pub timeout: usize,
    pub client_error: usize,
    pub transport_error: usize,
    pub single_rolls: usize,
    pub batch_rolls: usize,
    pub duration: Duration,
}

impl SimulationReport {
    pub fn record(&mut self, outcome: Outcome) {
        let slot = match outcome {
            Outcome::Success => &mut self.success,
            Outcome::DieFailure => &mut self.die_failure,
            Outcome::Unavailable => &mut self.unavailable,
            Outcome::Timeout => &mut self.timeout,
            Outcome::ClientError => &mut self.client_error,
            Outcome::TransportError => &mut self.transport_error,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.success + self.die_failure + self.unavailable + self.timeout + self.client_error + self.transport_error
    }

    /// Fold another user's tally into this one. Durations are not summed.
    pub fn merge(&mut self, other: &SimulationReport) {
        self.success += other.success;
        self.die_failure += other.die_failure;
        self.unavailable += other.unavailable;
        self.timeout += other.timeout;
        self.client_error += other.client_error;
        self.transport_error += other.transport_error;
        self.single_rolls += other.single_rolls;
        self.batch_rolls += other.batch_rolls;
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traffic generation complete in {:.2}s", self.duration.as_secs_f64())?;
        writeln!(
            f,
            "  requests: {} ({} single, {} batch)",
            self.total(),
            self.single_rolls,
            self.batch_rolls
        )?;
        writeln!(f, "  success:         {}", self.success)?;
        writeln!(f, "  die failure:     {}", self.die_failure)?;
        writeln!(f, "  unavailable:     {}", self.unavailable)?;
        writeln!(f, "  timeout:         {}", self.timeout)?;
        writeln!(f, "  client error:    {}", self.client_error)?;
        write!(f, "  transport error: {}", self.transport_error)
    }
}
