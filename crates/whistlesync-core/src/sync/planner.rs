//! Trim planning from detected event times
//!
//! Turns "the whistle is at t seconds in stream X" into "start stream X at
//! t - pre_roll", never asking a stream to start before its own beginning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::types::TimeOffset;
use crate::error::{Result, SyncError};

/// What to do when an event is closer to the start than the pre-roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreRollPolicy {
    /// Start at zero and flag the instruction as clamped
    #[default]
    Clamp,
    /// Fail with [`SyncError::InsufficientPreRoll`]
    Strict,
}

/// Where to cut one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimInstruction {
    /// Stream the instruction applies to
    pub stream: String,
    /// Start time in seconds, never negative
    pub start_secs: f64,
    /// `detection - pre_roll` before clamping
    pub requested_start_secs: f64,
    /// True when the full pre-roll could not be kept
    pub clamped: bool,
}

/// Stateless planner applying a pre-roll margin
///
/// # Example
/// ```
/// use whistlesync_core::{SyncPlanner, TimeOffset};
///
/// let planner = SyncPlanner::new(1.0).unwrap();
/// let plan = planner
///     .plan([("cam1", TimeOffset::from_secs(2.0)), ("cam2", TimeOffset::from_secs(0.5))])
///     .unwrap();
/// assert_eq!(plan["cam1"].start_secs, 1.0);
/// assert_eq!(plan["cam2"].start_secs, 0.0);
/// assert!(plan["cam2"].clamped);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPlanner {
    pre_roll_secs: f64,
    policy: PreRollPolicy,
}

impl SyncPlanner {
    /// Create a clamping planner
    ///
    /// # Errors
    /// [`SyncError::InvalidPreRoll`] for negative or non-finite values.
    pub fn new(pre_roll_secs: f64) -> Result<Self> {
        if !pre_roll_secs.is_finite() || pre_roll_secs < 0.0 {
            return Err(SyncError::InvalidPreRoll(pre_roll_secs));
        }
        Ok(Self {
            pre_roll_secs,
            policy: PreRollPolicy::default(),
        })
    }

    /// Use a different pre-roll policy
    pub fn with_policy(mut self, policy: PreRollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pre-roll in seconds
    pub fn pre_roll_secs(&self) -> f64 {
        self.pre_roll_secs
    }

    /// Active policy
    pub fn policy(&self) -> PreRollPolicy {
        self.policy
    }

    /// Plan a single stream
    pub fn plan_one(&self, stream: &str, detection: TimeOffset) -> Result<TrimInstruction> {
        let requested = detection.as_secs() - self.pre_roll_secs;
        let clamped = requested < 0.0;

        if clamped {
            match self.policy {
                PreRollPolicy::Strict => {
                    return Err(SyncError::InsufficientPreRoll {
                        stream: stream.to_string(),
                        detection_secs: detection.as_secs(),
                        pre_roll_secs: self.pre_roll_secs,
                    })
                }
                PreRollPolicy::Clamp => warn!(
                    stream,
                    detection_secs = detection.as_secs(),
                    pre_roll_secs = self.pre_roll_secs,
                    "Event too close to start, clip keeps less lead-in than requested"
                ),
            }
        }

        let start_secs = requested.max(0.0);
        debug!(stream, start_secs, clamped, "Planned trim");
        Ok(TrimInstruction {
            stream: stream.to_string(),
            start_secs,
            requested_start_secs: requested,
            clamped,
        })
    }

    /// Plan every stream in `detections`
    ///
    /// # Errors
    /// [`SyncError::DuplicateStream`] if a stream id appears twice, plus
    /// anything [`Self::plan_one`] returns.
    pub fn plan<I, S>(&self, detections: I) -> Result<BTreeMap<String, TrimInstruction>>
    where
        I: IntoIterator<Item = (S, TimeOffset)>,
        S: AsRef<str>,
    {
        let mut plan = BTreeMap::new();
        for (stream, detection) in detections {
            let stream = stream.as_ref();
            if plan.contains_key(stream) {
                return Err(SyncError::DuplicateStream(stream.to_string()));
            }
            let instruction = self.plan_one(stream, detection)?;
            plan.insert(stream.to_string(), instruction);
        }
        Ok(plan)
    }

    /// Plan two streams from one event time and a relative offset
    ///
    /// `offset` follows the cross-correlation convention: positive means the
    /// event happens later in `other` than in `reference`.
    pub fn plan_from_offset(
        &self,
        reference: &str,
        reference_event: TimeOffset,
        other: &str,
        offset: TimeOffset,
    ) -> Result<BTreeMap<String, TrimInstruction>> {
        let other_event = TimeOffset::from_secs(reference_event.as_secs() + offset.as_secs());
        self.plan([(reference, reference_event), (other, other_event)])
    }
}

/// Plan `detections` with a clamping planner
pub fn plan<I, S>(detections: I, pre_roll_secs: f64) -> Result<BTreeMap<String, TrimInstruction>>
where
    I: IntoIterator<Item = (S, TimeOffset)>,
    S: AsRef<str>,
{
    SyncPlanner::new(pre_roll_secs)?.plan(detections)
}

/// Trims that start two streams together, knowing only their offset
///
/// Whichever stream has the event later is cut by `|offset|` and the other
/// starts at zero. `offset` follows the cross-correlation convention.
pub fn align(
    reference: &str,
    other: &str,
    offset: TimeOffset,
) -> Result<BTreeMap<String, TrimInstruction>> {
    let reference_event = TimeOffset::from_secs((-offset.as_secs()).max(0.0));
    SyncPlanner::new(0.0)?.plan_from_offset(reference, reference_event, other, offset)
}
