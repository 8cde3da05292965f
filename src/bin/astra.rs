//! astra - webcam face recognition
//!
//! See `astra --help` for the available modes.

fn main() -> anyhow::Result<()> {
    astra_face::cli::run()
}
