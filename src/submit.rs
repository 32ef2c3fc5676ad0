//! Optimize submitter.
//!
//! Validates a submission against the current point selection, and keeps the
//! latest result (or failure) of the backend call. Identical submissions are
//! not deduplicated; each one is a fresh backend call.
//!
//! Every request is tagged with a submission number. A completion older than
//! one already applied is dropped, so a slow earlier call never overwrites a
//! newer result.

use tracing::{debug, info, warn};

use crate::error::{OptimizeRequestError, ValidationError};
use crate::model::{OptimizeRequest, OptimizeResult};
use crate::points::PointStore;

/// What happened to a completed optimize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Applied, and no newer request is outstanding.
    Current,
    /// Applied, but a newer request has been issued since.
    Overtaken,
    /// A newer completion already landed; this one was dropped.
    Superseded,
}

impl SubmitOutcome {
    /// Whether this completion should drive the session phase.
    pub fn is_current(self) -> bool {
        self == SubmitOutcome::Current
    }
}

/// Latest optimize outcome.
#[derive(Debug, Clone, Default)]
pub struct OptimizeSubmitter {
    result: Option<OptimizeResult>,
    last_error: Option<OptimizeRequestError>,
    submissions: u64,
    applied: u64,
}

impl OptimizeSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the request for a submission, or reject it without any call.
    pub fn prepare(
        &self,
        points: &PointStore,
        perishability: i32,
        city: Option<&str>,
    ) -> Result<OptimizeRequest, ValidationError> {
        OptimizeRequest::new(points.start(), points.end(), perishability, city)
    }

    /// Record that a request is about to go out.
    pub fn begin(&mut self, request: &OptimizeRequest) -> u64 {
        self.submissions += 1;
        info!(
            submission = self.submissions,
            perishability = request.perishability,
            city = request.city.as_deref().unwrap_or("-"),
            "Submitting optimize request"
        );
        self.submissions
    }

    /// Apply the backend's answer for `submission`.
    ///
    /// On failure the previous result is left as it was. A completion older
    /// than one already applied changes nothing.
    pub fn complete(
        &mut self,
        submission: u64,
        result: &Result<OptimizeResult, OptimizeRequestError>,
    ) -> SubmitOutcome {
        if submission <= self.applied {
            debug!(
                submission,
                applied = self.applied,
                "Dropping superseded optimize response"
            );
            return SubmitOutcome::Superseded;
        }
        self.applied = submission;

        match result {
            Ok(optimized) => {
                info!(
                    submission,
                    city = %optimized.city,
                    travel_time = optimized.travel_time_sec,
                    score = optimized.final_score,
                    "Optimize succeeded"
                );
                self.result = Some(optimized.clone());
                self.last_error = None;
            }
            Err(e) => {
                warn!(
                    submission,
                    kind = ?e.kind,
                    status = ?e.status,
                    error = %e.message,
                    "Optimize failed"
                );
                self.last_error = Some(e.clone());
            }
        }

        if submission == self.submissions {
            SubmitOutcome::Current
        } else {
            SubmitOutcome::Overtaken
        }
    }

    pub fn result(&self) -> Option<&OptimizeResult> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&OptimizeRequestError> {
        self.last_error.as_ref()
    }

    /// Number of requests sent so far.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }
}
