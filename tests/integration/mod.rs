//! Integration test suite for tandem.
//!
//! These tests exercise the full pipeline from goal to executed graph:
//! dual planning with judge arbitration, topological graph execution,
//! the verification override, retry-with-feedback, and escalation.
//!
//! # Test Categories
//!
//! - `planning_pipeline`: dual-planner loop, merges, planning failure
//! - `graph_execution`: graph runs, escalation policy, halt-on-failure
//!
//! # CI Compatibility
//!
//! Every backend interaction goes through a scripted mock; no test makes
//! a real API call.

mod fixtures;

mod graph_execution;
mod planning_pipeline;
