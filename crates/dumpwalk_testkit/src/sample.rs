//! Synthetic heap snapshot modeled on a small managed program.
//!
//! Three `Sample.Foo` objects each own a `List<string>`-like `_strings` collection, a
//! `System.DateTime` `_created` value, and a `_name` string. Only one list contains `"Bar"`.

use std::path::PathBuf;

use dumpwalk::dump::{Address, Compression, ElementKind, FieldType, HeapImage, HeapImageBuilder};

use crate::scratch_path;

/// Type name of the sample objects.
pub const FOO_TYPE: &str = "Sample.Foo";
/// Type name of the string list held by each sample object.
pub const LIST_TYPE: &str = "System.Collections.Generic.List<System.String>";
/// `_created` tick count of the first object: 2024-01-15T10:30:00, UTC kind bit set.
pub const CREATED_TICKS: u64 = 638_409_114_000_000_000;
const UTC_KIND: u64 = 1 << 62;

/// Built sample image plus the addresses tests refer to.
#[derive(Debug, Clone)]
pub struct FooImage {
	/// Heap image holding the sample objects.
	pub image: HeapImage,
	/// `Sample.Foo` addresses in allocation order: empty list, no "Bar", with "Bar".
	pub foos: Vec<Address>,
	/// Address of the only object whose list contains "Bar".
	pub with_bar: Address,
	/// Address of a corrupt heap entry.
	pub corrupt: Address,
}

/// Names of the three sample objects, in allocation order.
pub const FOO_NAMES: [&str; 3] = ["Empty list", "No Bar", "With Bar"];

/// Build the sample image.
pub fn foo_image() -> FooImage {
	foo_image_with_pointer_size(8)
}

/// Build the sample image for a process with `pointer_size`-byte words.
pub fn foo_image_with_pointer_size(pointer_size: usize) -> FooImage {
	let mut builder = HeapImageBuilder::new(pointer_size);
	let string_ty = builder.string_type();
	let strings_ty = builder.array_type(string_ty).expect("string array type");
	let list_ty = builder
		.class_type(
			LIST_TYPE,
			&[
				("_items", FieldType::Of(strings_ty)),
				("_size", FieldType::Scalar(ElementKind::Int32)),
				("_version", FieldType::Scalar(ElementKind::Int32)),
			],
		)
		.expect("list type");
	let date_ty = builder
		.struct_type("System.DateTime", &[("_dateData", FieldType::Scalar(ElementKind::UInt64))])
		.expect("date type");
	let foo_ty = builder
		.class_type(
			FOO_TYPE,
			&[
				("_strings", FieldType::Of(list_ty)),
				("_created", FieldType::Of(date_ty)),
				("_name", FieldType::Of(string_ty)),
			],
		)
		.expect("foo type");

	let contents: [&[&str]; 3] = [&[], &["A", "B", "C"], &["A", "B", "C", "Bar"]];
	let mut foos = Vec::with_capacity(contents.len());
	let mut corrupt = 0;

	for (idx, items) in contents.iter().enumerate() {
		let foo = builder.alloc_object(foo_ty).expect("foo object");
		let list = builder.alloc_object(list_ty).expect("list object");
		let capacity = if items.is_empty() { 0 } else { 4 };
		let array = builder.alloc_array(strings_ty, capacity).expect("items array");
		for (slot, text) in items.iter().enumerate() {
			let item = builder.alloc_string(text).expect("item string");
			builder.set_element_reference(array, &[slot as i32], item).expect("item slot");
		}
		builder.set_reference(list, "_items", array).expect("list items");
		builder.set_field(list, "_size", items.len() as i32).expect("list size");
		builder.set_field(list, "_version", items.len() as i32).expect("list version");

		let name = builder.alloc_string(FOO_NAMES[idx]).expect("name string");
		builder.set_reference(foo, "_strings", list).expect("foo list");
		builder.set_reference(foo, "_name", name).expect("foo name");
		let created = builder.field_address(foo, "_created").expect("created address");
		let ticks = CREATED_TICKS + idx as u64 * 600_000_000;
		builder.set_value_field(created, date_ty, "_dateData", ticks | UTC_KIND).expect("created ticks");
		foos.push(foo);

		if idx == 0 {
			corrupt = builder.add_corrupt_entry().expect("corrupt entry");
		}
	}

	FooImage {
		image: builder.build().expect("sample image builds"),
		with_bar: foos[2],
		foos,
		corrupt,
	}
}

/// Write the sample image under the scratch directory and return its path.
pub fn write_foo_image(name: &str, compression: Compression) -> PathBuf {
	let path = scratch_path(name);
	foo_image().image.write(&path, compression).expect("sample image writes");
	path
}
