use std::collections::HashMap;
use std::path::PathBuf;

use dumpwalk::dump::{HeapImage, HeapProvider, Result};

use crate::cmd::util::{OpenArgs, emit_json};

#[derive(clap::Args)]
pub struct Args {
	pub image: PathBuf,
	/// Number of most frequent types listed.
	#[arg(long, default_value_t = 12)]
	pub top: usize,
	#[arg(long)]
	pub json: bool,
	#[command(flatten)]
	pub open: OpenArgs,
}

/// Print image-level statistics and the most frequent object types.
pub fn run(args: Args) -> Result<()> {
	let Args { image: path, top, json, open } = args;

	let image = HeapImage::open_with(&path, &open.options())?;
	let top_types = type_histogram(&image, top);

	if json {
		let payload = InfoJson {
			path: path.display().to_string(),
			compression: image.compression().as_str(),
			pointer_size: image.pointer_size(),
			type_count: image.type_count(),
			segment_count: image.segments().len(),
			heap_entries: image.object_count(),
			invalid_entries: image.invalid_count(),
			top_types: top_types
				.into_iter()
				.map(|(type_name, count)| TypeCountJson { type_name, count })
				.collect(),
		};
		return emit_json(&payload);
	}

	println!("path: {}", path.display());
	println!("compression: {}", image.compression().as_str());
	println!("pointer_size: {}", image.pointer_size());
	println!("type_count: {}", image.type_count());
	println!("segment_count: {}", image.segments().len());
	println!("heap_entries: {}", image.object_count());
	println!("invalid_entries: {}", image.invalid_count());
	println!("top_types:");
	for (type_name, count) in top_types {
		println!("  {type_name}: {count}");
	}

	Ok(())
}

fn type_histogram(image: &HeapImage, top: usize) -> Vec<(String, usize)> {
	let mut counts: HashMap<&str, usize> = HashMap::new();
	for entry in image.heap_objects().filter(|entry| entry.valid) {
		let Ok(type_id) = image.object_type(entry.address) else {
			continue;
		};
		if let Some(ty) = image.type_info(type_id) {
			*counts.entry(ty.name.as_str()).or_default() += 1;
		}
	}

	let mut entries: Vec<_> = counts.into_iter().collect();
	entries.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(right.0)));
	entries.into_iter().take(top).map(|(name, count)| (name.to_owned(), count)).collect()
}

#[derive(serde::Serialize)]
struct InfoJson {
	path: String,
	compression: &'static str,
	pointer_size: usize,
	type_count: usize,
	segment_count: usize,
	heap_entries: usize,
	invalid_entries: usize,
	top_types: Vec<TypeCountJson>,
}

#[derive(serde::Serialize)]
struct TypeCountJson {
	type_name: String,
	count: usize,
}
