//! Pipeline configuration: YAML schema and parsing.

pub mod parser;
pub mod types;
