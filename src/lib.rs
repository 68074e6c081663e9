//! Validation and flattening of hierarchical hybrid-dynamics components.
//!
//! A [`ir::ast::Component`] describes a piecewise-continuous dynamical
//! system: regimes with time derivatives, algebraic aliases and
//! guarded or event-triggered transitions. Components nest through
//! subnodes wired by port connections. [`Compiler`] validates such a
//! hierarchy and flattens it into one component without subnodes, which
//! [`backend::FlatView`] then exposes to simulators and code generators.

use std::sync::Once;

pub mod backend;
pub mod compiler;
pub mod ir;

pub use compiler::{CompilationResult, CompileContext, Compiler};
pub use ir::ast::Component;
pub use ir::builder::ComponentBuilder;
pub use ir::error::{ErrorKind, ModelError};
pub use ir::transform::flatten::flatten;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::init();
    });
}
