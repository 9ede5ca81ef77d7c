use std::path::PathBuf;

use dumpwalk::dump::{Dump, Result};

use crate::cmd::util::{NodeJson, OpenArgs, RenderArgs, emit_json, parse_addr, parse_path, select};

#[derive(clap::Args)]
pub struct Args {
	pub image: PathBuf,
	/// Object address, decimal or `0x`-prefixed hex.
	#[arg(long)]
	pub addr: String,
	#[arg(long = "path")]
	pub path_expr: Option<String>,
	#[arg(long)]
	pub json: bool,
	#[command(flatten)]
	pub render: RenderArgs,
	#[command(flatten)]
	pub open: OpenArgs,
}

/// Render the object at an address, optionally following a field path.
pub fn run(args: Args) -> Result<()> {
	let Args {
		image: path,
		addr,
		path_expr,
		json,
		render,
		open,
	} = args;

	let address = parse_addr(&addr)?;
	let select_path = parse_path(path_expr.as_deref())?;
	let options = render.options();

	let dump = Dump::open_with(&path, &open.options())?;
	let node = select(dump.object_at(address)?, select_path.as_ref());

	if json {
		return emit_json(&NodeJson::new(address, &node, &options));
	}

	println!("{}", node.render(&options));
	Ok(())
}
