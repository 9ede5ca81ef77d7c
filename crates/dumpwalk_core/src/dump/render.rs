use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dump::{DEFAULT_MAX_STRING_LEN, DumpObject};

/// Depth and width limits for tree rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
	/// Levels of fields and items expanded below the root.
	pub depth: u32,
	/// Maximum array items printed per array.
	pub array_items: usize,
	/// Maximum UTF-16 units printed per string.
	pub max_string_len: usize,
}

impl Default for RenderOptions {
	fn default() -> Self {
		Self {
			depth: 3,
			array_items: 5,
			max_string_len: DEFAULT_MAX_STRING_LEN,
		}
	}
}

impl RenderOptions {
	/// Preset for one-screen summaries of many objects.
	pub fn compact() -> Self {
		Self {
			depth: 1,
			array_items: 3,
			max_string_len: 80,
		}
	}
}

/// Structured, serializable rendering of a node tree.
///
/// Renderable nodes and missing fields become leaves, `UnknownError` nodes become error leaves,
/// and everything else is expanded into named children until the depth budget runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeView {
	/// Rendered scalar, string, or formatted value.
	Value {
		/// Display text.
		text: String,
	},
	/// Read failure description.
	Error {
		/// Failure description.
		message: String,
	},
	/// Expanded object, value type, or array.
	Object {
		/// Type header.
		label: String,
		/// Node address.
		address: String,
		/// Field children in declaration order.
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		fields: Vec<TreeField>,
		/// Array item children, keyed by index tuple.
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		items: Vec<TreeField>,
		/// Items omitted by the width budget.
		#[serde(default, skip_serializing_if = "is_zero")]
		truncated: u64,
	},
	/// Node beyond the depth budget.
	Deferred {
		/// Type header.
		label: String,
		/// Node address.
		address: String,
	},
}

/// Named child of a [`TreeView::Object`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeField {
	/// Field name or index tuple.
	pub name: String,
	/// Child rendering.
	pub value: TreeView,
}

fn is_zero(value: &u64) -> bool {
	*value == 0
}

impl<'d> DumpObject<'d> {
	/// Append a bounded tree rendering of this node to `out`.
	///
	/// `depth` limits nested expansion, `array_items` caps printed elements per array, and `indent`
	/// is the nesting level of this node (0 for the root, which prints full sentinel diagnostics).
	pub fn build_string(&self, out: &mut String, depth: u32, array_items: usize, indent: usize) {
		self.write_tree(out, depth, array_items, indent, DEFAULT_MAX_STRING_LEN);
	}

	/// Render a bounded tree string with explicit limits.
	pub fn to_tree_string(&self, depth: u32, array_items: usize) -> String {
		let mut out = String::new();
		self.build_string(&mut out, depth, array_items, 0);
		out
	}

	/// Render a bounded tree string using [`RenderOptions`].
	pub fn render(&self, options: &RenderOptions) -> String {
		let mut out = String::new();
		self.write_tree(&mut out, options.depth, options.array_items, 0, options.max_string_len);
		out
	}

	/// Build a structured tree view using [`RenderOptions`].
	pub fn to_tree(&self, options: &RenderOptions) -> TreeView {
		if let Some(text) = self.leaf_text(options.max_string_len) {
			return TreeView::Value { text };
		}
		if let Some(message) = self.error() {
			return TreeView::Error { message };
		}
		if matches!(self, Self::NotFound(_)) {
			return TreeView::Value { text: self.describe() };
		}
		if options.depth == 0 {
			return TreeView::Deferred {
				label: self.header(),
				address: format!("0x{:016x}", self.address()),
			};
		}

		let nested = RenderOptions {
			depth: options.depth - 1,
			..*options
		};
		let fields = self
			.fields()
			.map(|field| TreeField {
				name: field.name.to_owned(),
				value: self.field(field.name).to_tree(&nested),
			})
			.collect();

		let mut items = Vec::new();
		let mut truncated = 0;
		if self.is_array() {
			let mut walk = self.array_items();
			while items.len() < options.array_items {
				let Some((name, node)) = walk.next_labeled() else {
					break;
				};
				items.push(TreeField {
					name,
					value: node.to_tree(&nested),
				});
			}
			truncated = walk.remaining();
		}

		TreeView::Object {
			label: self.header(),
			address: format!("0x{:016x}", self.address()),
			fields,
			items,
			truncated,
		}
	}

	fn leaf_text(&self, max_string_len: usize) -> Option<String> {
		match self {
			Self::String(_) => Some(self.string_text(max_string_len)),
			_ => self.render_value(),
		}
	}

	fn string_text(&self, max_string_len: usize) -> String {
		match self.as_string(max_string_len).into_result() {
			Ok(text) => text,
			Err(message) => format!("<unreadable: {message}>"),
		}
	}

	/// `Type @ 0x...` header for handle-backed nodes, diagnostic text for sentinels.
	fn header(&self) -> String {
		match self {
			Self::String(handle) | Self::Array(handle) | Self::ValueType(handle) | Self::Boxed(handle) | Self::Reference(handle) => {
				format!("{} @ 0x{:016x}", handle.ty.name, handle.address)
			}
			_ => self.to_tree_string(0, 0),
		}
	}

	fn write_tree(&self, out: &mut String, depth: u32, array_items: usize, indent: usize, max_string_len: usize) {
		match self {
			Self::Primitive(_) | Self::Pointer(_) | Self::Enum(_) => out.push_str(&self.render_value().unwrap_or_default()),
			Self::String(_) => {
				if indent == 0 {
					out.push_str(&self.header());
					out.push(' ');
				}
				out.push('"');
				out.push_str(&self.string_text(max_string_len));
				out.push('"');
			}
			Self::Array(_) => {
				out.push_str(&self.header());
				if depth == 0 {
					return;
				}
				let mut walk = self.array_items();
				let mut shown = 0;
				while shown < array_items {
					let Some((label, item)) = walk.next_labeled() else {
						break;
					};
					push_child(out, indent, &label);
					item.write_tree(out, depth - 1, array_items, indent + 1, max_string_len);
					shown += 1;
				}
				let more = walk.remaining();
				if more > 0 {
					push_child(out, indent, &format!("... {more} more"));
				}
			}
			Self::ValueType(_) => {
				if let Some(value) = self.render_value() {
					out.push_str(&value);
					return;
				}
				out.push_str(&self.header());
				self.write_fields(out, depth, array_items, indent, max_string_len);
			}
			Self::Boxed(_) => {
				out.push_str(&self.header());
				out.push_str(" (boxed)");
				if let Some(value) = self.render_value() {
					out.push_str(": ");
					out.push_str(&value);
					return;
				}
				self.write_fields(out, depth, array_items, indent, max_string_len);
			}
			Self::Reference(_) => {
				out.push_str(&self.header());
				self.write_fields(out, depth, array_items, indent, max_string_len);
			}
			Self::Null(sentinel) => {
				if indent == 0 {
					out.push_str("Field was null: ");
					out.push_str(&sentinel.path);
					out.push_str(" in ");
					sentinel.parent.write_tree(out, 0, 0, 0, max_string_len);
				} else {
					out.push_str("null");
				}
			}
			Self::NotFound(sentinel) => {
				out.push_str("Field not found: ");
				out.push_str(&sentinel.path);
				out.push_str(" in ");
				sentinel.parent.write_tree(out, 0, 0, 0, max_string_len);
			}
			Self::UnknownError(node) => {
				if indent == 0 {
					out.push_str("Unknown error reading ");
					out.push_str(&node.path);
					out.push_str(" in ");
					node.parent.write_tree(out, 0, 0, 0, max_string_len);
					out.push_str(": ");
				} else {
					out.push_str("Unknown error: ");
				}
				out.push_str(&node.message);
			}
		}
	}

	fn write_fields(&self, out: &mut String, depth: u32, array_items: usize, indent: usize, max_string_len: usize) {
		if depth == 0 {
			return;
		}
		for info in self.fields() {
			push_child(out, indent, info.name);
			self.field(info.name).write_tree(out, depth - 1, array_items, indent + 1, max_string_len);
		}
	}
}

fn push_child(out: &mut String, indent: usize, label: &str) {
	out.push('\n');
	out.push_str(&" ".repeat((indent + 1) * 2));
	out.push_str(label);
	if !label.starts_with("...") {
		out.push_str(": ");
	}
}

impl fmt::Display for DumpObject<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.render(&RenderOptions::default()))
	}
}
