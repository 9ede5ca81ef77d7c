use dumpwalk::dump::{Address, DumpError, DumpObject, FieldPath, OpenOptions, RenderOptions, Result, TreeView};

/// Image loading flags shared by every command.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct OpenArgs {
	/// Maximum decompressed size accepted from zstd images, in bytes.
	#[arg(long = "max-decompressed", default_value_t = OpenOptions::default().max_decompressed_bytes)]
	pub max_decompressed_bytes: usize,
}

impl OpenArgs {
	pub(crate) fn options(self) -> OpenOptions {
		OpenOptions {
			max_decompressed_bytes: self.max_decompressed_bytes,
		}
	}
}

/// Render-limit flags shared by `query` and `show`.
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RenderArgs {
	/// Levels of fields and items expanded below each root.
	#[arg(long, default_value_t = RenderOptions::default().depth)]
	pub depth: u32,
	/// Maximum array items printed per array.
	#[arg(long, default_value_t = RenderOptions::default().array_items)]
	pub items: usize,
	/// Maximum UTF-16 units printed per string.
	#[arg(long = "max-string", default_value_t = RenderOptions::default().max_string_len)]
	pub max_string_len: usize,
}

impl RenderArgs {
	pub(crate) fn options(self) -> RenderOptions {
		RenderOptions {
			depth: self.depth,
			array_items: self.items,
			max_string_len: self.max_string_len,
		}
	}
}

/// Parse decimal or `0x`-prefixed hex address literal.
pub(crate) fn parse_addr(value: &str) -> Result<Address> {
	let parsed = if let Some(stripped) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Address::from_str_radix(&stripped.replace('_', ""), 16)
	} else {
		value.parse::<Address>()
	};

	parsed.map_err(|_| DumpError::InvalidAddressLiteral { value: value.to_owned() })
}

/// Parse an optional field path flag.
pub(crate) fn parse_path(value: Option<&str>) -> Result<Option<FieldPath>> {
	value.map(FieldPath::parse).transpose()
}

/// Format an address the way node headers do.
pub(crate) fn addr_hex(address: Address) -> String {
	format!("0x{address:016x}")
}

/// Apply an optional path to a root node.
pub(crate) fn select<'d>(root: DumpObject<'d>, path: Option<&FieldPath>) -> DumpObject<'d> {
	match path {
		Some(path) => root.navigate(path),
		None => root,
	}
}

/// JSON record for one rendered node.
#[derive(serde::Serialize)]
pub(crate) struct NodeJson {
	pub(crate) root: String,
	pub(crate) type_name: String,
	pub(crate) address: String,
	pub(crate) tree: TreeView,
}

impl NodeJson {
	pub(crate) fn new(root: Address, node: &DumpObject<'_>, options: &RenderOptions) -> Self {
		Self {
			root: addr_hex(root),
			type_name: node.type_name().to_owned(),
			address: addr_hex(node.address()),
			tree: node.to_tree(options),
		}
	}
}

/// Print one pretty JSON document to stdout.
pub(crate) fn emit_json<T: serde::Serialize>(payload: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(payload)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::{addr_hex, parse_addr};

	#[test]
	fn parses_hex_and_decimal_addresses() {
		assert_eq!(parse_addr("0x10").expect("hex parses"), 16);
		assert_eq!(parse_addr("0X0200_0000").expect("hex with separators parses"), 0x0200_0000);
		assert_eq!(parse_addr("4096").expect("decimal parses"), 4096);
	}

	#[test]
	fn rejects_garbage_addresses() {
		for bad in ["", "0x", "0xzz", "-1", "12ab"] {
			let err = parse_addr(bad).expect_err("literal rejected");
			assert!(err.to_string().contains("invalid address literal"), "{bad}: {err}");
		}
	}

	#[test]
	fn hex_matches_node_headers() {
		assert_eq!(addr_hex(0x1234), "0x0000000000001234");
	}
}
