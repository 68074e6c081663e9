//! Consumers of flat components.
//!
//! - `view`: the flat-component contract simulators and generators rely on
//! - `rhs`: ODE right-hand side evaluation into `ndarray` vectors
//! - `generator`: minijinja template rendering

pub mod generator;
pub mod rhs;
pub mod view;

pub use generator::{render_summary, render_template, render_template_file};
pub use rhs::RhsEvaluator;
pub use view::{Declaration, DeclarationKind, FlatView, Transition, Trigger};
