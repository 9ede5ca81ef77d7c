use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, trace};

use crate::dump::{Dump, DumpObject, HeapEntry, Result, TypeId, factory};

/// Convert a type-name glob into an anchored regular expression.
///
/// `*` matches any run of characters and `?` matches exactly one; everything else is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
	let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
	Ok(Regex::new(&format!("^{escaped}$"))?)
}

/// Lazy walk over heap objects whose type name matches a pattern.
///
/// Match decisions are cached per type for the lifetime of the iterator. Entries the provider marks
/// invalid, or whose type cannot be resolved, are skipped.
pub struct HeapObjects<'d> {
	dump: &'d Dump,
	regex: Regex,
	entries: Box<dyn Iterator<Item = HeapEntry> + 'd>,
	matches: HashMap<TypeId, bool>,
	scanned: usize,
	yielded: usize,
	skipped: usize,
	finished: bool,
}

impl<'d> HeapObjects<'d> {
	pub(crate) fn new(dump: &'d Dump, regex: Regex) -> Self {
		Self {
			dump,
			regex,
			entries: dump.provider().heap_objects(),
			matches: HashMap::new(),
			scanned: 0,
			yielded: 0,
			skipped: 0,
			finished: false,
		}
	}

	/// Pattern the type names are matched against.
	pub fn pattern(&self) -> &Regex {
		&self.regex
	}

	fn type_matches(&mut self, type_id: TypeId) -> bool {
		if let Some(matched) = self.matches.get(&type_id) {
			return *matched;
		}
		let matched = self.dump.provider().type_info(type_id).is_some_and(|ty| self.regex.is_match(&ty.name));
		self.matches.insert(type_id, matched);
		matched
	}

	fn finish(&mut self) {
		if !self.finished {
			self.finished = true;
			debug!(
				pattern = self.regex.as_str(),
				scanned = self.scanned,
				matched = self.yielded,
				skipped = self.skipped,
				types = self.matches.len(),
				"heap walk finished"
			);
		}
	}
}

impl<'d> Iterator for HeapObjects<'d> {
	type Item = DumpObject<'d>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let Some(entry) = self.entries.next() else {
				self.finish();
				return None;
			};
			self.scanned += 1;

			if !entry.valid {
				self.skipped += 1;
				trace!(address = format_args!("0x{:016x}", entry.address), "skipping invalid heap entry");
				continue;
			}

			let type_id = match self.dump.provider().object_type(entry.address) {
				Ok(type_id) => type_id,
				Err(err) => {
					self.skipped += 1;
					trace!(address = format_args!("0x{:016x}", entry.address), %err, "skipping untyped heap entry");
					continue;
				}
			};

			if !self.type_matches(type_id) {
				continue;
			}
			let Some(ty) = self.dump.provider().type_info(type_id) else {
				continue;
			};

			self.yielded += 1;
			return Some(factory::classify_object(self.dump, entry.address, ty));
		}
	}
}
