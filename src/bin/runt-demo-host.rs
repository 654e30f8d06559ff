//! A framework host executable serving the scripted demo framework that the
//! integration tests load in-process. Lets the tests reach the same
//! framework across a process boundary.
use runt_host::boundary::protocol::SERVE_FLAG;
use runt_host::host;
use std::sync::{atomic::AtomicUsize, Arc};

#[path = "../../tests/common/mod.rs"]
mod common;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::new().filter_or("RUNT_HOST_LOG", "warn"),
    )
    .init();

    if !std::env::args().any(|arg| arg == SERVE_FLAG) {
        eprintln!("usage: runt-demo-host {}", SERVE_FLAG);
        std::process::exit(2);
    }

    let registry = common::registry(&Arc::new(AtomicUsize::new(0)));
    if let Err(err) = host::serve_stdio(registry) {
        log::error!("demo host stopped: {}", err);
        std::process::exit(1);
    }
}
