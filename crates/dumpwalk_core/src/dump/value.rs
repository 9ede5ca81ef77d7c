use std::fmt;

use crate::dump::RawValue;

/// Outcome of a typed read from a [`DumpObject`](crate::dump::DumpObject).
///
/// Holds either the value or a message describing why the read failed. Check [`DumpValue::is_error`]
/// before calling [`DumpValue::value`]; unwrapping a failed read panics with the stored message.
#[derive(Clone, PartialEq)]
pub struct DumpValue<T> {
	inner: Result<T, String>,
}

impl<T> DumpValue<T> {
	pub(crate) fn ok(value: T) -> Self {
		Self { inner: Ok(value) }
	}

	pub(crate) fn failed(message: String) -> Self {
		Self { inner: Err(message) }
	}

	pub(crate) fn unsupported_read(type_name: &str) -> Self {
		Self::failed(format!(
			"read_as() can only be used on value types. The current DumpObject represents {type_name}."
		))
	}

	pub(crate) fn unsupported_string(type_name: &str) -> Self {
		Self::failed(format!(
			"as_string() can only be used on string or enum types. The current DumpObject represents {type_name}."
		))
	}

	pub(crate) fn from_failed_object(description: &str) -> Self {
		Self::failed(format!("Cannot read from failed DumpObject. Error: {description}"))
	}

	pub(crate) fn no_field_at_offset_zero(type_name: &str) -> Self {
		Self::failed(format!("Failed to find field at offset 0 for value type {type_name}"))
	}

	/// Whether the read failed.
	pub fn is_error(&self) -> bool {
		self.inner.is_err()
	}

	/// Failure message, if the read failed.
	pub fn error(&self) -> Option<&str> {
		self.inner.as_ref().err().map(String::as_str)
	}

	/// Borrow the value, if the read succeeded.
	pub fn as_ok(&self) -> Option<&T> {
		self.inner.as_ref().ok()
	}

	/// Return the read value.
	///
	/// # Panics
	///
	/// Panics with the failure message when [`DumpValue::is_error`] is true.
	pub fn value(self) -> T {
		match self.inner {
			Ok(value) => value,
			Err(message) => panic!("{message}"),
		}
	}

	/// Convert into a standard result carrying the failure message.
	pub fn into_result(self) -> Result<T, String> {
		self.inner
	}

	/// Return the value or a fallback when the read failed.
	pub fn unwrap_or(self, fallback: T) -> T {
		self.inner.unwrap_or(fallback)
	}
}

impl<T: RawValue> DumpValue<T> {
	pub(crate) fn size_mismatch(type_name: &str, size: usize) -> Self {
		Self::failed(format!(
			"read_as<{}>() failed due to size mismatch. Target type size: {} bytes. Underlying value type {type_name} size: {size} bytes.",
			T::type_label(),
			T::SIZE
		))
	}
}

impl<T: fmt::Debug> fmt::Debug for DumpValue<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.inner {
			Ok(value) => f.debug_tuple("Ok").field(value).finish(),
			Err(message) => f.debug_tuple("Error").field(message).finish(),
		}
	}
}

impl PartialEq<str> for DumpValue<String> {
	fn eq(&self, other: &str) -> bool {
		matches!(&self.inner, Ok(value) if value == other)
	}
}

impl PartialEq<&str> for DumpValue<String> {
	fn eq(&self, other: &&str) -> bool {
		matches!(&self.inner, Ok(value) if value == *other)
	}
}

impl<T> From<DumpValue<T>> for Result<T, String> {
	fn from(value: DumpValue<T>) -> Self {
		value.inner
	}
}

#[cfg(test)]
mod tests {
	use super::DumpValue;

	#[test]
	fn string_value_compares_with_text() {
		let value = DumpValue::ok("Bar".to_owned());
		assert!(value == "Bar");
		assert!(value != "Baz");

		let failed = DumpValue::<String>::unsupported_string("Sample.Foo");
		assert!(failed != "Bar");
	}

	#[test]
	fn size_mismatch_names_both_widths() {
		let value = DumpValue::<u64>::size_mismatch("System.Int32", 4);
		let message = value.error().expect("mismatch is an error");
		assert!(message.contains("Target type size: 8 bytes"));
		assert!(message.contains("System.Int32 size: 4 bytes"));
	}

	#[test]
	#[should_panic(expected = "Failed to find field at offset 0")]
	fn unwrapping_failed_value_panics_with_message() {
		let _ = DumpValue::<u32>::no_field_at_offset_zero("Sample.Empty").value();
	}
}
