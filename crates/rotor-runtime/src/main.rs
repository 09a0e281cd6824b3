//! The `rotor` binary: load the configured plugins and run the lifecycle.
//!
//! Plugin shared objects come from the command line (one path per argument)
//! or, when no arguments are given, from the colon-separated
//! `ILLIXR_PLUGINS` environment variable.

use tracing::{error, info};

use rotor_runtime::logging;
use rotor_runtime::runtime::Runtime;

fn main() {
    logging::init_from_env();

    let mut runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to construct the runtime");
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let loaded = if args.is_empty() {
        match std::env::var("ILLIXR_PLUGINS") {
            Ok(list) => runtime.load_so_list(&list),
            Err(_) => {
                error!("no plugins: pass shared-object paths or set ILLIXR_PLUGINS");
                std::process::exit(1);
            }
        }
    } else {
        args.iter().try_for_each(|path| runtime.load_so(path))
    };

    if let Err(err) = loaded {
        error!(error = %err, "failed to load plugins");
        std::process::exit(1);
    }

    runtime.run();
    info!("exiting");
}
