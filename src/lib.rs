//! Bakery core library.
//!
//! Bakery reads toolset-independent project descriptions and writes native
//! build files for several backends from them. A parse tree ([`ast`]) is
//! turned into a typed project [`model`] whose values are [`expr`]essions
//! validated against the [`props`] registry; each [`toolset`] then lowers the
//! targets into build graphs and serializes them through its own formatter
//! into atomically committed [`output`] files.

pub mod ast;
pub mod cli;
pub mod expr;
pub mod guid;
pub mod model;
pub mod output;
pub mod props;
pub mod runner;
pub mod toolset;
