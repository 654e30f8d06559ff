//! The framework side of a boundary: where objects are instantiated by name
//! and calls are serviced.

mod objects;
mod registry;
mod server;

pub use objects::{CreateArgs, Hosted, ObjectTable};
pub use registry::Registry;
pub use server::{serve, serve_stdio};
