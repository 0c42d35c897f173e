//! Binary entry point for `atomic-state`.

use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = atomic_state::run() {
        eprintln!("Error: {}", e.report());
        process::exit(1);
    }
}
