//! Component model: expressions, declarations, analysis and transforms.

pub mod analysis;
pub mod ast;
pub mod builder;
pub mod error;
pub mod expr;
pub mod functions;
pub mod namespace;
pub mod transform;
pub mod units;
pub mod visitor;
