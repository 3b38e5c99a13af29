mod args;
mod committee;

use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

use crate::args::Args;
use crate::committee::config_reader::SessionSettings;

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("args: {:?}", args);

    let res = SessionSettings::from_args(&args).and_then(|settings| committee::run_session(&settings));
    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
