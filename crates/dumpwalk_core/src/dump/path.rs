use std::fmt;

use crate::dump::{DumpError, Result};

/// One parsed operation in a field path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
	/// Select a named field.
	Field(String),
	/// Select an array element by zero-based position along each dimension.
	Index(Vec<usize>),
}

/// Parsed field path expression such as `_strings._items[2]` or `grid[1, 0].value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
	/// Ordered sequence of path steps.
	pub steps: Vec<PathStep>,
}

impl FieldPath {
	/// Parse dotted field syntax with optional `[i]` or `[i, j, ...]` selectors.
	///
	/// Field names may contain any character other than `.`, `[`, `]`, `,`, and whitespace, so
	/// compiler-generated names like `<Name>k__BackingField` parse as written.
	pub fn parse(input: &str) -> Result<Self> {
		let invalid = || DumpError::InvalidFieldPath { path: input.to_owned() };
		if input.trim().is_empty() {
			return Err(invalid());
		}

		let chars: Vec<char> = input.chars().collect();
		let mut idx = 0_usize;
		let mut steps = Vec::new();

		while idx < chars.len() {
			let start = idx;
			while idx < chars.len() && is_name_char(chars[idx]) {
				idx += 1;
			}
			if idx > start {
				steps.push(PathStep::Field(chars[start..idx].iter().collect()));
			} else if chars[idx] != '[' || !steps.is_empty() {
				return Err(invalid());
			}

			while idx < chars.len() && chars[idx] == '[' {
				idx += 1;
				let close = chars[idx..].iter().position(|ch| *ch == ']').ok_or_else(invalid)?;
				let body: String = chars[idx..idx + close].iter().collect();
				steps.push(PathStep::Index(parse_index(&body).ok_or_else(invalid)?));
				idx += close + 1;
			}

			if idx < chars.len() {
				if chars[idx] != '.' {
					return Err(invalid());
				}
				idx += 1;
				if idx >= chars.len() {
					return Err(invalid());
				}
			}
		}

		Ok(Self { steps })
	}

	/// Whether the path selects the node itself.
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}
}

fn is_name_char(ch: char) -> bool {
	!matches!(ch, '.' | '[' | ']' | ',') && !ch.is_whitespace()
}

fn parse_index(body: &str) -> Option<Vec<usize>> {
	let parts = body
		.split(',')
		.map(|part| part.trim().parse::<usize>().ok())
		.collect::<Option<Vec<_>>>()?;
	if parts.is_empty() { None } else { Some(parts) }
}

impl std::str::FromStr for FieldPath {
	type Err = DumpError;

	fn from_str(input: &str) -> Result<Self> {
		Self::parse(input)
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, step) in self.steps.iter().enumerate() {
			match step {
				PathStep::Field(name) => {
					if i > 0 {
						f.write_str(".")?;
					}
					f.write_str(name)?;
				}
				PathStep::Index(position) => {
					let parts: Vec<String> = position.iter().map(usize::to_string).collect();
					write!(f, "[{}]", parts.join(", "))?;
				}
			}
		}
		Ok(())
	}
}
