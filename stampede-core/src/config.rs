use crate::{Threshold, DEFAULT_GRACEFUL_STOP};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A single ramp segment: reach `target` VUs by the end of `duration`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub const fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StageParseError {
    #[error("Stage \"{0}\" must have the form <duration>:<target>, e.g. 10s:50")]
    Format(String),

    #[error("Invalid stage duration \"{0}\": {1}")]
    Duration(String, humantime::DurationError),

    #[error("Invalid stage target \"{0}\"")]
    Target(String),
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (duration, target) = s
            .split_once(':')
            .ok_or_else(|| StageParseError::Format(s.to_string()))?;

        let duration = duration.trim();
        let target = target.trim();

        let duration = humantime::parse_duration(duration)
            .map_err(|err| StageParseError::Duration(duration.to_string(), err))?;
        let target = target
            .parse()
            .map_err(|_| StageParseError::Target(target.to_string()))?;

        Ok(Self { duration, target })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            humantime::format_duration(self.duration),
            self.target
        )
    }
}

/// Ordered stages plus the VU count the first stage ramps from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RampProfile {
    pub start_vus: usize,
    pub stages: Vec<Stage>,
}

impl RampProfile {
    pub fn new(stages: &[Stage]) -> Self {
        Self {
            start_vus: 0,
            stages: stages.to_vec(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_target(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, usize::max)
    }

    /// Number of VUs that should be running `elapsed` into the run, linearly interpolated
    /// within the current stage. `None` once every stage has elapsed.
    pub fn target_at(&self, elapsed: Duration) -> Option<usize> {
        let (from, stage, offset) = self.locate(elapsed)?;

        let progress = (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
        let vus = from as f64 + (stage.target as f64 - from as f64) * progress;

        let (low, high) = (from.min(stage.target), from.max(stage.target));
        Some((vus.floor().max(0.) as usize).clamp(low, high))
    }

    /// The lowest and highest VU counts allowed `elapsed` into the run.
    pub fn bounds_at(&self, elapsed: Duration) -> Option<(usize, usize)> {
        let (from, stage, _) = self.locate(elapsed)?;
        Some((from.min(stage.target), from.max(stage.target)))
    }

    /// Highest VU count allowed at any point in `[from, to]`.
    ///
    /// VUs retired on a ramp-down finish their current iteration, so the number actually
    /// running at `to` is bounded by the peak over the preceding iteration length.
    pub fn peak_between(&self, from: Duration, to: Duration) -> usize {
        let mut origin = self.start_vus;
        let mut offset = Duration::ZERO;
        let mut peak = None;

        for stage in &self.stages {
            let end = offset + stage.duration;
            if offset <= to && from < end {
                peak = peak.max(Some(origin.max(stage.target)));
            }
            origin = stage.target;
            offset = end;
        }

        // Past the end of the profile only the final target applies.
        if to >= offset {
            peak = peak.max(Some(origin));
        }

        peak.unwrap_or(origin)
    }

    fn locate(&self, elapsed: Duration) -> Option<(usize, &Stage, Duration)> {
        let mut from = self.start_vus;
        let mut offset = Duration::ZERO;

        for stage in &self.stages {
            let end = offset + stage.duration;
            // NOTE: Zero-length stages are skipped, which makes them an instant jump.
            if elapsed < end {
                return Some((from, stage, offset));
            }
            from = stage.target;
            offset = end;
        }

        None
    }
}

#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub name: String,
    pub profile: RampProfile,
    pub thresholds: Vec<Threshold>,
    pub graceful_stop: Duration,
    pub max_rps: Option<NonZeroU32>,
}

impl ScenarioConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            profile: RampProfile::default(),
            thresholds: vec![],
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            max_rps: None,
        }
    }
}
