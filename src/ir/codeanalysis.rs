//! The analysis side of the IR: the type lattice, the typing environment
//! and the typer that walks the instruction stream.

pub mod environment;
pub mod signatures;
pub mod statestack;
pub mod typer;
pub mod types;
