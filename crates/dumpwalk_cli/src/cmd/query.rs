use std::path::PathBuf;

use dumpwalk::dump::{Dump, DumpError, DumpObject, FieldPath, HeapObjects, Result};
use regex::Regex;
use tracing::debug;

use crate::cmd::util::{NodeJson, OpenArgs, RenderArgs, emit_json, parse_path, select};

#[derive(clap::Args)]
pub struct Args {
	pub image: PathBuf,
	/// Type-name glob (`*`, `?`), or a regular expression with `--regex`.
	pub pattern: String,
	#[arg(long)]
	pub regex: bool,
	/// Field path rendered for each match instead of the match itself.
	#[arg(long = "path")]
	pub path_expr: Option<String>,
	/// Keep matches where `PATH=TEXT` holds; an array at PATH matches when any item does.
	#[arg(long = "where")]
	pub filter: Option<String>,
	#[arg(long)]
	pub limit: Option<usize>,
	#[arg(long)]
	pub json: bool,
	#[command(flatten)]
	pub render: RenderArgs,
	#[command(flatten)]
	pub open: OpenArgs,
}

/// Enumerate heap objects by type pattern and render each match.
pub fn run(args: Args) -> Result<()> {
	let Args {
		image: path,
		pattern,
		regex,
		path_expr,
		filter,
		limit,
		json,
		render,
		open,
	} = args;

	let select_path = parse_path(path_expr.as_deref())?;
	let filter = filter.as_deref().map(parse_filter).transpose()?;
	let options = render.options();

	let dump = Dump::open_with(&path, &open.options())?;
	let matches = enumerate(&dump, &pattern, regex)?;

	let mut results = Vec::new();
	for root in matches {
		if limit.is_some_and(|limit| results.len() >= limit) {
			break;
		}
		if filter.as_ref().is_some_and(|filter| !filter.holds(&root)) {
			continue;
		}
		results.push(root);
	}
	debug!(pattern = %pattern, matched = results.len(), "query finished");

	if json {
		let payload = QueryJson {
			pattern,
			matched: results.len(),
			results: results
				.iter()
				.map(|root| NodeJson::new(root.address(), &select(root.clone(), select_path.as_ref()), &options))
				.collect(),
		};
		return emit_json(&payload);
	}

	for (idx, root) in results.iter().enumerate() {
		if idx > 0 {
			println!();
		}
		println!("{}", select(root.clone(), select_path.as_ref()).render(&options));
	}

	Ok(())
}

fn enumerate<'d>(dump: &'d Dump, pattern: &str, regex: bool) -> Result<HeapObjects<'d>> {
	if regex {
		Ok(dump.heap_objects_regex(Regex::new(pattern)?))
	} else {
		dump.heap_objects(pattern)
	}
}

/// Parsed `--where PATH=TEXT` condition.
#[derive(Debug)]
struct Filter {
	path: FieldPath,
	expected: String,
}

impl Filter {
	fn holds(&self, root: &DumpObject<'_>) -> bool {
		let target = root.navigate(&self.path);
		if target.is_array() {
			return target.array_items().any(|item| self.matches(&item));
		}
		self.matches(&target)
	}

	fn matches(&self, node: &DumpObject<'_>) -> bool {
		match node {
			DumpObject::String(_) => node.as_string(self.expected.len() + 1) == self.expected.as_str(),
			_ => node.render_value().is_some_and(|text| text == self.expected),
		}
	}
}

fn parse_filter(value: &str) -> Result<Filter> {
	let Some((path, expected)) = value.split_once('=') else {
		return Err(DumpError::InvalidFieldPath { path: value.to_owned() });
	};
	Ok(Filter {
		path: FieldPath::parse(path.trim())?,
		expected: expected.to_owned(),
	})
}

#[derive(serde::Serialize)]
struct QueryJson {
	pattern: String,
	matched: usize,
	results: Vec<NodeJson>,
}
