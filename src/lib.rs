//! RouteMonk - pick two map points, see the live route, and score a
//! perishable delivery against travel time and weather.
//!
//! # Overview
//!
//! A session lets an operator click a start and a destination on a map. Once
//! both are set the route is fetched from the routing provider and coloured
//! by ETA. Submitting the form sends the pair, a perishability rating and an
//! optional city to the optimize backend; every success refreshes the
//! history list from the backend.
//!
//! # Ordering
//!
//! Network calls never hold the session lock. Route responses carry the
//! selection epoch they were requested under and are dropped if a reset has
//! happened since; history refreshes carry a tag so an older list never
//! replaces a newer one.
//!
//! # Modules
//!
//! - [`config`]: Endpoints, credentials and timeouts
//! - [`model`]: Points, routes, optimize payloads and history records
//! - [`error`]: Typed errors for every component boundary
//! - [`phase`]: The session state machine
//! - [`points`]: Start/end point store with the selection epoch
//! - [`routing`]: Routing provider client and route fetch state
//! - [`backend`]: Optimize/history backend client
//! - [`history`]: History normalization and store
//! - [`submit`]: Optimize submitter
//! - [`orchestrator`]: Session composition and read model
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod phase;
pub mod points;
pub mod routing;
pub mod submit;
