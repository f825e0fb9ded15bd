//! Declarative schema migrations for document databases.
//!
//! A migration declares the collections, indexes, search views, and text
//! analyzers a deployment should have, plus per-field validation rules. The
//! engine compiles each declaration into an ordered command list and, for
//! collections, a recursive validation document the backend enforces.
//!
//! # Replay Model
//!
//! A migration is written either as an explicit `up`/`down` pair or as a
//! single `change` definition. A change definition replays backward
//! automatically: the queued commands are inverted and delivered in reverse
//! order, and the run fails up front when any command has no inverse.
//!
//! # Writing Migrations
//!
//! ```rust,ignore
//! use strata::migration::{FieldType, Migration, Subcommand, Target};
//! use strata::opts;
//!
//! let migration = Migration::change("create_users", |r| {
//!     r.create(Target::collection("users"), |r| {
//!         r.subcommand(Subcommand::add("name", FieldType::String, opts! {
//!             min_length: 1,
//!             comment: "display name",
//!         }))?;
//!         r.subcommand(Subcommand::add("age", FieldType::Integer, opts! {
//!             minimum: 0,
//!         }))?;
//!         r.timestamps()
//!     })?;
//!     r.create(Target::index("users", &["name"]), |_| Ok(()))
//! });
//! ```
//!
//! # Delivery
//!
//! Commands accumulate in the runner's queue and reach the
//! [`Executor`](runner::Executor) only when the run finishes, or when the
//! author flushes explicitly during a forward replay.

mod command;
mod context;
mod definition;
mod options;
mod reverse;
mod runner;
mod schema;
mod target;

pub use command::{timestamp_fields, Command, FieldType, RawAction, Subcommand};
pub use context::{DefaultContext, Direction, MigrationContext, TimestampConfig};
pub use definition::Migration;
pub use options::FieldOptions;
pub use reverse::{reverse_command, reverse_subcommand, Irreversible};
pub use runner::{CommandOp, Executor, Runner};
pub use schema::{
    compile, type_to_node, NodeKind, ValidationDocument, ValidationLevel, ValidationNode,
    NAIVE_DATETIME_PATTERN, NAIVE_DATETIME_USEC_PATTERN, UUID_PATTERN,
};
pub use target::{
    default_index_name, Analyzer, AnalyzerFeature, AnalyzerKind, Collection, CollectionKind,
    CollectionOptions, Compression, Index, IndexKind, IndexOptions, StoredValues, Target, View,
    ViewLink, ViewOptions, ViewSort,
};
