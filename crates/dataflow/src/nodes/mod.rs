//! Standard node type implementations.

pub mod compound;
pub mod filters;
pub mod reader;
pub mod writer;
