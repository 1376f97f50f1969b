//! SKOS vocabulary synchronisation
//!
//! This library keeps a controlled vocabulary editable as a spreadsheet while
//! publishing it as an RDF graph, and keeps the two sides consistent.
//!
//! # Overview
//!
//! Everything flows through the typed [`Model`]:
//!
//! 1. A workbook is read into [`table::Tables`] and decoded with
//!    [`codec::tables_to_model`], collecting every cell problem at once
//! 2. Turtle is parsed into a [`graph::Graph`], adapted from its
//!    [`SourceFormat`] and extracted into the same model
//! 3. The model is checked against its invariants, the configured ID ranges
//!    and a shape profile ([`validate::Orchestrator`])
//! 4. It is written back as canonical Turtle, as a workbook, or as a split
//!    tree with one file per concept or collection
//!
//! Placeholder IRIs entered by editors are replaced with permanent numeric
//! IDs by [`mint::mint_ids`]. The digit width of an ID is part of its
//! identity: with seven digits, `0012345` matches and `00012345` does not.
//!
//! # Usage
//!
//! ```ignore
//! use vocsync::{Config, Overrides, VocabContext, xlsx, codec};
//!
//! let config = Config::load("idranges.toml".as_ref())?;
//! let ctx = VocabContext::new("myvocab", &config, Overrides::default())?;
//! let tables = xlsx::read_workbook("myvocab.xlsx".as_ref())?;
//! let model = codec::tables_to_model(&tables, &ctx)?;
//! println!("{}", model.to_rdf_text(&ctx));
//! ```

pub mod allocator;
pub mod cell;
pub mod checks;
pub mod codec;
pub mod config;
pub mod convert;
pub mod emit;
pub mod error;
pub mod expand;
pub mod extract;
pub mod format;
pub mod graph;
pub mod hierarchy;
pub mod iri;
pub mod mint;
pub mod model;
pub mod provenance;
pub mod shapes;
pub mod split;
pub mod staging;
pub mod table;
pub mod turtle;
pub mod validate;
pub mod vocab;
pub mod xlsx;

pub use crate::config::{Config, OverrideSource, Overrides, VocabContext};
pub use crate::error::{ConfigError, VocabError};
pub use crate::format::SourceFormat;
pub use crate::model::{Collection, Concept, ConceptScheme, Model};
pub use crate::shapes::{BuiltinShapes, ShapeSet, ShapeValidator};
pub use crate::split::SplitLayout;
pub use crate::validate::{Severity, ValidationReport, Violation, ViolationKind};
