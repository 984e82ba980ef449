//! Domain core for versioned evaluation workbooks.
//!
//! A workbook definition is an ordered tree of sections holding typed leaf
//! items. Evaluators record one response per item per evaluation version;
//! versions move draft → finalised → superseded with exactly one active
//! version per (definition, subject). The crate exposes the structural CRUD,
//! the item-type registry, the response pipeline, and the version lifecycle,
//! plus an axum router mirroring the operations one-for-one.

pub mod checklist;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod responses;
pub mod router;
pub mod store;
pub mod telemetry;
pub mod types;
