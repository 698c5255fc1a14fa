//! Sigsmith CLI: canonical signature solvers from player scripts.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "sigsmith",
    version,
    about = "Locate the signature decipher function in a player script and emit a canonical solver"
)]
struct Cli {
    #[command(subcommand)]
    command: sigsmith::cli::Commands,
}

fn main() {
    sigsmith::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = sigsmith::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
