//! Integration tests for Preempt
//!
//! These tests drive whole replicates and replicated scenarios through the
//! public API of `preempt-sim`, checking scheduling rules, accounting
//! identities and agreement with queueing theory.

#[path = "integration/priority_ordering.rs"]
mod priority_ordering;

#[path = "integration/accounting.rs"]
mod accounting;

#[path = "integration/trace_and_switchover.rs"]
mod trace_and_switchover;

#[path = "integration/analytical_validation.rs"]
mod analytical_validation;

#[path = "integration/replication.rs"]
mod replication;
