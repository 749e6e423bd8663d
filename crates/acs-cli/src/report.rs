//! Result file: `#` header lines, `Next Experiment` separators, one checkpoint per line and,
//! with interleaved exploitation, `Performance` lines.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use acs_core::{Agent, ModelTest};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const NEXT_EXPERIMENT: &str = "Next Experiment";
pub const PERFORMANCE: &str = "Performance";

/// Model test result and population statistics at one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub time: u64,
    /// Percentage of test transitions a reliable classifier anticipates.
    pub knowledge: f64,
    pub macro_size: usize,
    pub micro_size: u64,
    pub reliable: usize,
    pub specificity: f64,
}

impl Checkpoint {
    pub fn capture(agent: &Agent, test: ModelTest) -> Self {
        let stats = agent.stats();
        Self {
            time: agent.ctx.time,
            knowledge: test.knowledge(),
            macro_size: stats.macro_size,
            micro_size: stats.micro_size,
            reliable: stats.reliable,
            specificity: stats.specificity,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} {} {} {} {:.4}",
            self.time, self.knowledge, self.macro_size, self.micro_size, self.reliable, self.specificity
        )
    }
}

/// Steps-to-goal of the recent exploit trials interleaved with exploration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardPerformance {
    pub time: u64,
    pub trial: u64,
    /// Mean steps over the last `window` exploit trials.
    pub mean_steps: f64,
    pub macro_size: usize,
}

impl fmt::Display for RewardPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PERFORMANCE} {} {} {:.2} {}",
            self.time, self.trial, self.mean_steps, self.macro_size
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLineError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid {field}: {value:?}")]
    Field { field: &'static str, value: String },
}

fn field<T: FromStr>(name: &'static str, value: &str) -> Result<T, ParseLineError> {
    value.parse().map_err(|_| ParseLineError::Field {
        field: name,
        value: value.to_string(),
    })
}

impl FromStr for RewardPerformance {
    type Err = ParseLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [tag, time, trial, mean_steps, macro_size] = fields[..] else {
            return Err(ParseLineError::FieldCount {
                expected: 5,
                found: fields.len(),
            });
        };
        if tag != PERFORMANCE {
            return Err(ParseLineError::Field {
                field: "tag",
                value: tag.to_string(),
            });
        }
        Ok(Self {
            time: field("time", time)?,
            trial: field("trial", trial)?,
            mean_steps: field("mean_steps", mean_steps)?,
            macro_size: field("macro_size", macro_size)?,
        })
    }
}

impl FromStr for Checkpoint {
    type Err = ParseLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [time, knowledge, macro_size, micro_size, reliable, specificity] = fields[..] else {
            return Err(ParseLineError::FieldCount {
                expected: 6,
                found: fields.len(),
            });
        };
        Ok(Self {
            time: field("time", time)?,
            knowledge: field("knowledge", knowledge)?,
            macro_size: field("macro_size", macro_size)?,
            micro_size: field("micro_size", micro_size)?,
            reliable: field("reliable", reliable)?,
            specificity: field("specificity", specificity)?,
        })
    }
}

/// Checkpoints and reward performance of one experiment in a result file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentRecord {
    pub checkpoints: Vec<Checkpoint>,
    pub performance: Vec<RewardPerformance>,
}

impl ExperimentRecord {
    fn is_empty(&self) -> bool {
        self.checkpoints.is_empty() && self.performance.is_empty()
    }
}

/// Parse a result file into one record per experiment.
pub fn read_results(text: &str) -> Result<Vec<ExperimentRecord>, ParseLineError> {
    let mut experiments = vec![ExperimentRecord::default()];
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == NEXT_EXPERIMENT {
            experiments.push(ExperimentRecord::default());
            continue;
        }
        let Some(current) = experiments.last_mut() else {
            continue;
        };
        if line.starts_with(PERFORMANCE) {
            current.performance.push(line.parse()?);
        } else {
            current.checkpoints.push(line.parse()?);
        }
    }
    experiments.retain(|e| !e.is_empty());
    Ok(experiments)
}

pub struct ResultWriter<W: Write> {
    out: W,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Start time and every parameter, each line prefixed with `#`.
    pub fn header(&mut self, started: DateTime<Utc>, parameters: &str) -> io::Result<()> {
        writeln!(self.out, "# ACS2 run started {}", started.to_rfc3339())?;
        for line in parameters.lines() {
            writeln!(self.out, "# {line}")?;
        }
        writeln!(self.out, "# time knowledge macro micro reliable specificity")?;
        writeln!(self.out, "# {PERFORMANCE} time trial mean_steps macro")
    }

    pub fn next_experiment(&mut self) -> io::Result<()> {
        writeln!(self.out, "{NEXT_EXPERIMENT}")
    }

    pub fn checkpoint(&mut self, checkpoint: &Checkpoint) -> io::Result<()> {
        writeln!(self.out, "{checkpoint}")
    }

    pub fn performance(&mut self, performance: &RewardPerformance) -> io::Result<()> {
        writeln!(self.out, "{performance}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
