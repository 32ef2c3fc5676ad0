//! Session state machine.
//!
//! Every user action and every applied network completion is a named
//! [`Transition`]. [`Phase::advance`] is the only place that decides whether
//! a transition is legal, so tests can check legality directly.

use serde::Serialize;
use thiserror::Error;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing picked.
    #[default]
    NoPoints,
    /// Start picked, waiting for the destination.
    StartOnly,
    /// Both points picked; route not (yet) shown.
    BothPoints,
    /// Both points picked and the route is displayed.
    RouteLoaded,
    /// An optimize call is outstanding.
    Submitting,
    /// The last optimize call succeeded.
    Submitted,
}

/// Named events that move the session between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    PickStart,
    PickEnd,
    RouteLoaded,
    Submit,
    SubmitSucceeded,
    SubmitFailed,
    Reset,
}

/// A transition that is not allowed from the current phase.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize)]
#[error("cannot {transition:?} while in {from:?}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub transition: Transition,
}

impl Phase {
    /// Compute the phase after `transition`.
    ///
    /// Submit completions that land after a reset (outside `Submitting`) are
    /// legal and leave the phase as it is.
    pub fn advance(self, transition: Transition) -> Result<Phase, IllegalTransition> {
        use Phase::*;
        use Transition as T;

        let next = match (self, transition) {
            (_, T::Reset) => NoPoints,

            (NoPoints, T::PickStart) => StartOnly,
            (StartOnly, T::PickEnd) => BothPoints,

            (BothPoints, T::RouteLoaded) => RouteLoaded,
            (Submitting, T::RouteLoaded) => Submitting,
            (Submitted, T::RouteLoaded) => Submitted,

            (BothPoints | RouteLoaded | Submitted, T::Submit) => Submitting,

            (Submitting, T::SubmitSucceeded) => Submitted,
            (Submitting, T::SubmitFailed) => BothPoints,
            (phase, T::SubmitSucceeded | T::SubmitFailed) => phase,

            (from, transition) => return Err(IllegalTransition { from, transition }),
        };

        Ok(next)
    }

    /// Whether `transition` is legal from this phase.
    pub fn allows(self, transition: Transition) -> bool {
        self.advance(transition).is_ok()
    }
}
