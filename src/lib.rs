//! Consistency and query engine for GSN assurance-case models.
//!
//! A model is a flat list of typed nodes whose slash-delimited ids encode
//! containment. Everything here works on immutable snapshots:
//! - `model` / `graph`: ids, node records and derived parent/child structure
//! - `cycle`: acyclicity check over all relations
//! - `edit`: rename cascades, delete implications, the atomic apply step and
//!   the edit session
//! - `labels` / `view`: label groups and the view expression language
//! - `text`: the namespaced `.gsn` text form (both directions)
//! - `config` / `diagnostics`: output options, editor state files, logging

pub mod config;
pub mod cycle;
pub mod diagnostics;
pub mod edit;
pub mod graph;
pub mod labels;
pub mod model;
pub mod text;
pub mod view;

pub type Result<T> = anyhow::Result<T>;

pub use cycle::{count_cycles, find_cycles, has_cycles};
pub use edit::{ApplyError, Change, EditBatch, apply_batch, apply_changes, model_hash};
pub use graph::RelationGraph;
pub use labels::{Label, resolve_group_members};
pub use model::{Model, Node, NodeType, RelationType};
pub use view::{View, ViewExpression, apply_view, parse_view_expression};
