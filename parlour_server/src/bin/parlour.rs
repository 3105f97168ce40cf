use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(rename_all = "kebab")]
struct Opts {
    /// Config file location
    #[structopt(short, long, env = "PARLOUR_CONFIG", default_value = "parlour.json5")]
    config: PathBuf,
}

/// Main entry point.
///
/// Startup failures are returned as errors, which exit with status 1. Once
/// the server has started, the exit status reports how shutdown went.
pub fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::from_args();

    let code = parlour_server::run::run_server(opts.config)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
