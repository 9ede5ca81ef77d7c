//! Shared test helpers for workspace crates.

use std::path::{Path, PathBuf};

pub mod sample;

/// Resolve the workspace root path.
pub fn workspace_root() -> PathBuf {
	let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
	manifest_dir
		.join("..")
		.join("..")
		.canonicalize()
		.unwrap_or_else(|_| manifest_dir.join("..").join(".."))
}

/// Resolve the workspace target directory.
pub fn target_dir() -> PathBuf {
	std::env::var_os("CARGO_TARGET_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root().join("target"))
}

/// Resolve a writable scratch path under the target directory, creating its parent.
pub fn scratch_path(name: &str) -> PathBuf {
	let dir = target_dir().join("dumpwalk-scratch");
	std::fs::create_dir_all(&dir).expect("scratch directory is creatable");
	dir.join(name)
}

/// Parse command stdout as one JSON document.
pub fn parse_json(stdout: &[u8]) -> serde_json::Value {
	serde_json::from_slice(stdout).unwrap_or_else(|err| panic!("stdout is not json ({err}): {}", String::from_utf8_lossy(stdout)))
}
