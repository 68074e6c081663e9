pub mod equivalence;
pub mod symbol_table;
pub mod validation;
