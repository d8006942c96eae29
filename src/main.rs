//! # Voxel World Demo Entry Point
//!
//! Calls into the library's `run()`, which walks a player across a world and
//! edits blocks along the way.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- config/world.example.json
//! ```

fn main() {
    if let Err(err) = voxel_world::run() {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
