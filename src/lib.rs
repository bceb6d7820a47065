//! `quagga` is the type inference engine behind a JavaScript fuzzer. The
//! program builder appends IR instructions one at a time and hands each of
//! them to the [`Typer`](ir::codeanalysis::typer::Typer); after every
//! instruction the current inferred type of any variable can be queried.
//! The typing is a best-effort approximation used to guide code generation:
//! it never fails on strange programs, it only widens to `Unknown`.

pub mod ir;

pub use ir::codeanalysis::environment::{StubEnvironment, TypeEnvironment};
pub use ir::codeanalysis::signatures::{FunctionSignature, Param};
pub use ir::codeanalysis::types::Type;
pub use ir::codeanalysis::typer::Typer;
pub use ir::instruction::Instruction;
pub use ir::variable::Variable;
