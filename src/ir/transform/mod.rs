pub mod expand;
pub mod flatten;
pub mod rename;
