use std::path::PathBuf;

use cumulus::{window::App, CloudConfig};

fn main() {
    env_logger::init();

    // Optional first argument: an equirectangular sky image.
    let environment_path = std::env::args().nth(1).map(PathBuf::from);

    let app = App::new(CloudConfig::new(), environment_path);
    if let Err(e) = app.run() {
        eprintln!("cumulus failed: {}", e);
        std::process::exit(1);
    }
}
