#[macro_use]
mod macros;
pub(crate) mod cli;
pub(crate) mod common;
pub(crate) mod cutils;
pub(crate) mod exec;
pub(crate) mod jobs;
pub(crate) mod log;
pub(crate) mod parse;
pub(crate) mod system;

mod shell;

pub use shell::main as tsh_main;
