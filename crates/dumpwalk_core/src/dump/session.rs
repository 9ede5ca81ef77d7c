use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::rc::Rc;

use regex::Regex;
use tracing::debug;

use crate::dump::formatters;
use crate::dump::{
	Address, DumpError, DumpObject, HeapImage, HeapObjects, HeapProvider, OpenOptions, RawValue, Result, TypeId, TypeInfo, ValueReader,
	factory, glob_to_regex,
};

/// Display formatter for one value type, keyed by fully-qualified type name.
pub type Formatter = Rc<dyn Fn(&ValueReader<'_>) -> Result<String>>;

/// Open heap snapshot session.
///
/// Owns the snapshot provider and the value-formatter registry. Every [`DumpObject`] borrows the
/// session, so nodes cannot outlive it.
pub struct Dump {
	provider: Box<dyn HeapProvider>,
	formatters: RefCell<HashMap<String, Formatter>>,
}

impl Dump {
	/// Open a heap image file with default options.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		Self::open_with(path, &OpenOptions::default())
	}

	/// Open a heap image file with explicit options.
	pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
		let path = path.as_ref();
		let image = HeapImage::open_with(path, options)?;
		debug!(
			path = %path.display(),
			types = image.type_count(),
			objects = image.object_count(),
			pointer_size = image.pointer_size(),
			"opened heap image"
		);
		Ok(Self::new(image))
	}

	/// Wrap a provider and register the default value formatters.
	pub fn new(provider: impl HeapProvider + 'static) -> Self {
		let dump = Self::without_formatters(provider);
		formatters::register_defaults(&dump);
		dump
	}

	/// Wrap a provider with an empty formatter registry.
	pub fn without_formatters(provider: impl HeapProvider + 'static) -> Self {
		Self {
			provider: Box::new(provider),
			formatters: RefCell::new(HashMap::new()),
		}
	}

	/// Underlying snapshot provider.
	pub fn provider(&self) -> &dyn HeapProvider {
		self.provider.as_ref()
	}

	/// Look up type metadata, failing when the snapshot lacks it.
	pub fn type_info(&self, id: TypeId) -> Result<&TypeInfo> {
		self.provider.type_info(id).ok_or_else(|| DumpError::MissingTypeMetadata { context: format!("type {id}") })
	}

	/// Register or replace the formatter used to render values of `type_name`.
	pub fn register_formatter<F>(&self, type_name: impl Into<String>, formatter: F) -> &Self
	where
		F: Fn(&ValueReader<'_>) -> Result<String> + 'static,
	{
		let type_name = type_name.into();
		debug!(type_name = type_name.as_str(), "registered value formatter");
		self.formatters.borrow_mut().insert(type_name, Rc::new(formatter));
		self
	}

	/// Register a formatter that reads the value as `T` and prints it with [`Display`].
	pub fn register_value_formatter<T>(&self, type_name: impl Into<String>) -> &Self
	where
		T: RawValue + Display,
	{
		self.register_formatter(type_name, |reader| Ok(reader.read::<T>()?.to_string()))
	}

	/// Whether a formatter is registered for `type_name`.
	pub fn has_formatter(&self, type_name: &str) -> bool {
		self.formatters.borrow().contains_key(type_name)
	}

	/// Render a value with its registered formatter, if any.
	pub(crate) fn format_value(&self, type_name: &str, reader: &ValueReader<'_>) -> Option<String> {
		let formatter = self.formatters.borrow().get(type_name).cloned()?;
		Some(match formatter(reader) {
			Ok(text) => text,
			Err(err) => format!("<unreadable: {err}>"),
		})
	}

	/// Enumerate heap objects whose type name matches a glob (`*` and `?` wildcards).
	pub fn heap_objects(&self, pattern: &str) -> Result<HeapObjects<'_>> {
		Ok(self.heap_objects_regex(glob_to_regex(pattern)?))
	}

	/// Enumerate heap objects whose type name matches `regex`.
	pub fn heap_objects_regex(&self, regex: Regex) -> HeapObjects<'_> {
		HeapObjects::new(self, regex)
	}

	/// Classify the object at `address`.
	pub fn object_at(&self, address: Address) -> Result<DumpObject<'_>> {
		factory::classify_address(self, address)
	}

	/// Release the snapshot.
	pub fn close(self) {
		debug!("closed heap snapshot");
	}
}

impl std::fmt::Debug for Dump {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut names: Vec<String> = self.formatters.borrow().keys().cloned().collect();
		names.sort();
		f.debug_struct("Dump")
			.field("pointer_size", &self.provider.pointer_size())
			.field("formatters", &names)
			.finish()
	}
}
