#![allow(missing_docs)]

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "dumpwalk", about = "Managed heap snapshot queries")]
struct Cli {
	/// Raise log verbosity (`-v` debug, `-vv` trace).
	#[arg(short, long, action = ArgAction::Count, global = true)]
	verbose: u8,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print image-level statistics.
	Info(cmd::info::Args),
	/// Enumerate objects whose type matches a pattern.
	Query(cmd::query::Args),
	/// Render one object by address.
	Show(cmd::show::Args),
}

fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Err(err) = run(cli.command) {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run(command: Commands) -> dumpwalk::dump::Result<()> {
	match command {
		Commands::Info(args) => cmd::info::run(args),
		Commands::Query(args) => cmd::query::run(args),
		Commands::Show(args) => cmd::show::run(args),
	}
}

fn init_tracing(verbose: u8) {
	let filter = match verbose {
		0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::default().add_directive(Level::WARN.into())),
		1 => EnvFilter::default().add_directive(Level::DEBUG.into()),
		_ => EnvFilter::default().add_directive(Level::TRACE.into()),
	};

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
