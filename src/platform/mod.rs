//! platform
//!
//! Uniform access to git hosting providers.
//!
//! # Architecture
//!
//! The [`Platform`] trait is the single contract every provider adapter
//! implements: pull requests, branch status, issues, comments, file
//! retrieval, and repository discovery. Callers obtain an adapter from
//! [`create_platform`] and never name adapter types.
//!
//! Optional operations are declared through a [`CapabilitySet`] and reached
//! through accessors such as [`Platform::vulnerability_alerts`], which
//! return `None` when the adapter does not support them.
//!
//! # Modules
//!
//! - `traits`: the `Platform` trait, optional capability traits, `PlatformError`
//! - `types`: request and response types shared by adapters
//! - `labels`: label reconciliation
//! - `status`: branch status aggregation
//! - `capabilities`: `Capability` and `CapabilitySet`
//! - [`github`]: GitHub REST adapter
//! - [`mock`]: in-memory adapter for deterministic testing
//! - `factory`: adapter selection

mod capabilities;
mod factory;
pub mod github;
mod labels;
pub mod mock;
mod status;
mod traits;
mod types;

pub use capabilities::{Capability, CapabilitySet};
pub use factory::{
    create_configured_platform, create_platform, valid_platform_names, PlatformProvider,
};
pub use labels::{reconcile_labels, LabelPlan, LabelUpdate};
pub use status::aggregate_branch_status;
pub use traits::*;
pub use types::*;
