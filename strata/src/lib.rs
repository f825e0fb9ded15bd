//! # Strata - Declarative Schema Migrations
//!
//! Strata is a schema-migration engine for document databases. Migrations
//! declare collections, indexes, search views, and text analyzers together
//! with per-field validation rules; the engine compiles each declaration into
//! an ordered command list and a recursive validation document, then delivers
//! the commands to a pluggable executor.
//!
//! ## Key Features
//!
//! - **Declarative**: Authors describe the schema they want, not the calls to
//!   get there
//! - **Reversible**: A single `change` definition replays backward with every
//!   command inverted automatically
//! - **Validated**: Field declarations compile into a JSON-Schema-equivalent
//!   rule tree enforced by the backend
//! - **Scoped**: Targets are stamped with the tenant scope of the migration
//!   context, with conflicts rejected up front
//! - **Backend-agnostic**: A single [`Executor`](migration::Executor) trait
//!   separates command compilation from delivery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata::migration::{
//!     DefaultContext, Executor, FieldType, Migration, Subcommand, Target,
//! };
//! use strata::opts;
//!
//! let migration = Migration::change("create_users", |r| {
//!     r.create(Target::collection("users"), |r| {
//!         r.subcommand(Subcommand::add("email", FieldType::String, opts! {
//!             pattern: "@",
//!             null: false,
//!         }))?;
//!         r.timestamps()
//!     })?;
//!     r.create(Target::index("users", &["email"]), |_| Ok(()))
//! });
//!
//! // forward
//! migration.run(Arc::new(DefaultContext::forward()), &mut executor)?;
//! // backward, derived from the same definition
//! migration.run(Arc::new(DefaultContext::backward()), &mut executor)?;
//! ```

pub mod common;
pub mod errors;
pub mod migration;
