//! runt-host discovers and runs tests implemented by a separately loaded,
//! versioned test framework, without linking against it.
//!
//! ## Model
//! A test assembly names the framework it was written against. runt-host
//! loads that framework behind an isolation [boundary], talks to it through
//! a [proxy], and aggregates the messages it streams back in a
//! [sink](sink::ExecutionSink) that publishes an
//! [ExecutionSummary](summary::ExecutionSummary) once the framework reports
//! that the assembly is finished.
//!
//! Test cases are opaque to the host. They cross the boundary in their
//! serialized form, produced and understood only by the framework (see
//! [codec]).
//!
//! ## Configuration
//! Each assembly may have a `<assembly>.runt-host.toml` next to it:
//! ```toml
//! # (Optional) runt-host version this file was written for.
//! ver = "0.1.0"
//!
//! [framework]
//! # Module and type the framework entry point is instantiated from.
//! module = "demo"
//! type_name = "TestFramework"
//! # (Optional) Framework version the assembly depends on. "3.0" accepts
//! # any 3.0.x framework.
//! version = "3.0"
//! # (Optional) Executable hosting the framework. Defaults to the assembly.
//! host = "bin/demo-host"
//! # required, ifavailable or denied.
//! isolation = "ifavailable"
//! shadow_copy = false
//!
//! # Passed through to the framework.
//! [discovery]
//! [execution]
//! ```
//!
//! ## Framework hosts
//! A framework host is an executable that registers its framework types in
//! a [Registry](host::Registry) and calls [serve_stdio](host::serve_stdio)
//! when started with `--runt-host-serve`:
//! ```no_run
//! # use std::sync::Arc;
//! # use runt_host::host::{self, Registry};
//! let registry = Registry::new();
//! // registry.register_framework("demo", "TestFramework", |args| ...);
//! if std::env::args().any(|arg| arg == runt_host::boundary::protocol::SERVE_FLAG) {
//!     host::serve_stdio(Arc::new(registry)).unwrap();
//! }
//! ```
//!
//! Set `RUNT_HOST_LOG=debug` to see boundary traffic.
pub mod boundary;
pub mod cli;
pub mod codec;
pub mod errors;
pub mod framework;
pub mod host;
pub mod message;
pub mod project;
pub mod proxy;
pub mod runner;
pub mod sink;
pub mod summary;
pub mod test_case;
