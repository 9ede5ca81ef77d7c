use super::{Compression, HeapImage, OpenOptions, Segment};
use crate::dump::{ArrayShape, Dump, DumpError, DumpObject, ElementKind, FieldType, HeapImageBuilder, HeapProvider, TypeId, TypeInfo};

fn plain_type(id: u64, name: &str) -> TypeInfo {
	TypeInfo {
		id: TypeId(id),
		name: name.to_owned(),
		element: ElementKind::Class,
		size: 0,
		fields: Vec::new(),
		component: None,
		rank: 0,
		enum_values: None,
	}
}

#[test]
fn reads_resolve_through_sorted_segments() {
	let image = HeapImage::from_parts(
		8,
		Vec::new(),
		vec![
			Segment {
				start: 0x2000,
				bytes: vec![5, 6, 7, 8],
			},
			Segment {
				start: 0x1000,
				bytes: vec![1, 2, 3, 4],
			},
		],
		Vec::new(),
	)
	.expect("image builds");

	let mut buf = [0_u8; 2];
	image.read_memory(0x1001, &mut buf).expect("inside first segment");
	assert_eq!(buf, [2, 3]);
	image.read_memory(0x2002, &mut buf).expect("inside second segment");
	assert_eq!(buf, [7, 8]);

	let err = image.read_memory(0x1003, &mut buf).expect_err("crosses segment end");
	assert!(matches!(err, DumpError::UnmappedRead { address: 0x1003, len: 2 }));
	assert!(image.read_memory(0x0fff, &mut buf).is_err());
	assert!(image.read_memory(0x3000, &mut buf).is_err());
}

#[test]
fn rejects_overlapping_segments() {
	let err = HeapImage::from_parts(
		8,
		Vec::new(),
		vec![
			Segment {
				start: 0x1000,
				bytes: vec![0; 16],
			},
			Segment {
				start: 0x1008,
				bytes: vec![0; 8],
			},
		],
		Vec::new(),
	)
	.expect_err("overlap rejected");
	assert!(matches!(err, DumpError::OverlappingSegments { address: 0x1008 }));
}

#[test]
fn rejects_duplicate_type_ids_and_bad_word_size() {
	let err = HeapImage::from_parts(8, vec![plain_type(1, "A"), plain_type(1, "B")], Vec::new(), Vec::new()).expect_err("duplicate rejected");
	assert!(matches!(err, DumpError::DuplicateTypeId { id: 1 }));

	let err = HeapImage::from_parts(2, Vec::new(), Vec::new(), Vec::new()).expect_err("word size rejected");
	assert!(matches!(err, DumpError::UnsupportedPointerSize { size: 2 }));
}

#[test]
fn builder_strings_and_arrays_decode() {
	let mut builder = HeapImageBuilder::new(8);
	let int_ty = builder.primitive_type(ElementKind::Int32);
	let ints = builder.array_type(int_ty).expect("array type");
	let grid_ty = builder.multi_array_type(int_ty, 2).expect("grid type");

	let text = builder.alloc_string("héllo").expect("string");
	let array = builder.alloc_array(ints, 3).expect("array");
	builder.set_element(array, &[2], 42_i32).expect("element");
	let grid = builder.alloc_multi_array(grid_ty, &[2, 3], &[1, -1]).expect("grid");
	builder.set_element(grid, &[2, 1], 7_i32).expect("grid element");
	let image = builder.build().expect("image builds");

	assert_eq!(image.read_string(text, 4096).expect("reads"), "héllo");
	assert_eq!(image.read_string(text, 2).expect("reads"), "hé");

	let shape = image.array_shape(array).expect("shape");
	assert_eq!(shape.lengths, vec![3]);
	assert_eq!(shape.lower_bounds, vec![0]);
	let mut buf = [0_u8; 4];
	image.read_memory(shape.data + 8, &mut buf).expect("element readable");
	assert_eq!(i32::from_le_bytes(buf), 42);

	let shape = image.array_shape(grid).expect("grid shape");
	assert_eq!(shape.lengths, vec![2, 3]);
	assert_eq!(shape.lower_bounds, vec![1, -1]);
	let linear = shape.linear_index(&[2, 1]).expect("in bounds");
	assert_eq!(linear, 5);
	image.read_memory(shape.data + linear * 4, &mut buf).expect("element readable");
	assert_eq!(i32::from_le_bytes(buf), 7);

	assert!(matches!(image.array_shape(text), Err(DumpError::NotAnArray { .. })));
	assert!(matches!(image.read_string(array, 8), Err(DumpError::NotAString { .. })));
}

#[test]
fn corrupt_entries_are_reported_invalid() {
	let mut builder = HeapImageBuilder::new(4);
	let class = builder.class_type("Sample.Node", &[("_next", FieldType::Object)]).expect("class");
	let good = builder.alloc_object(class).expect("object");
	let bad = builder.add_corrupt_entry().expect("corrupt entry");
	let image = builder.build().expect("image builds");

	let entries: Vec<_> = image.heap_objects().collect();
	assert_eq!(entries.len(), 2);
	assert_eq!(entries[0].address, good);
	assert!(entries[0].valid);
	assert_eq!(entries[1].address, bad);
	assert!(!entries[1].valid);
	assert_eq!(image.invalid_count(), 1);
	assert_eq!(image.object_type(good).expect("typed"), class);
}

#[test]
fn json_document_round_trips_with_hex_segments() {
	let mut builder = HeapImageBuilder::new(8);
	let text = builder.alloc_string("A").expect("string");
	let image = builder.build().expect("image builds");

	let json = image.to_json_vec().expect("serializes");
	let value: serde_json::Value = serde_json::from_slice(&json).expect("valid json");
	let bytes = value["segments"][0]["bytes"].as_str().expect("hex string");
	assert!(bytes.chars().all(|ch| ch.is_ascii_hexdigit()));

	let reloaded = HeapImage::from_bytes(json, &OpenOptions::default()).expect("reloads");
	assert_eq!(reloaded.compression(), Compression::None);
	assert_eq!(reloaded.read_string(text, 16).expect("reads"), "A");
}

#[test]
fn invalid_hex_is_a_json_error() {
	let document = br#"{"pointer_size":8,"types":[],"segments":[{"start":0,"bytes":"zz"}],"objects":[]}"#;
	let err = HeapImage::from_json_slice(document).expect_err("bad hex rejected");
	assert!(matches!(err, DumpError::Json(_)));
}

#[test]
fn overflowing_array_lengths_are_malformed() {
	let mut builder = HeapImageBuilder::new(8);
	let int_ty = builder.primitive_type(ElementKind::Int32);
	let cube_ty = builder.multi_array_type(int_ty, 3).expect("cube type");
	let cube = builder.alloc_multi_array(cube_ty, &[1, 1, 1], &[0, 0, 0]).expect("cube");
	let lengths = cube + 16;
	for dim in 0..3_u64 {
		builder.write(lengths + 4 * dim, &(1_u32 << 22).to_le_bytes()).expect("length overwritten");
	}
	let image = builder.build().expect("image builds");
	assert!(matches!(image.array_shape(cube), Err(DumpError::MalformedArray { address }) if address == cube));

	let dump = Dump::new(image);
	let node = dump.object_at(cube).expect("cube classifies");
	let length = node.field("Length");
	assert!(matches!(length, DumpObject::UnknownError(_)));
	assert!(length.error().is_some_and(|message| message.contains("malformed array header")));
	assert_eq!(node.array_items().count(), 0);
	assert!(matches!(node.array_item(&[0, 0, 0]), DumpObject::UnknownError(_)));
}

#[test]
fn linear_index_rejects_overflowing_positions() {
	let shape = ArrayShape {
		data: 0,
		lengths: vec![u32::MAX; 3],
		lower_bounds: vec![0; 3],
	};
	assert_eq!(shape.total_len(), None);
	let err = shape.linear_index(&[i32::MAX, i32::MAX, i32::MAX]).expect_err("overflow rejected");
	assert!(matches!(err, DumpError::IndexOutOfBounds { .. }));
}

#[test]
fn corrupt_string_length_is_rejected_before_reading() {
	let mut builder = HeapImageBuilder::new(8);
	let text = builder.alloc_string("A").expect("string");
	builder.write(text + 8, &u32::MAX.to_le_bytes()).expect("length overwritten");
	let image = builder.build().expect("image builds");

	let err = image.read_string(text, usize::MAX).expect_err("unmapped tail rejected");
	assert!(matches!(err, DumpError::UnmappedRead { len, .. } if len == u32::MAX as usize * 2));
	assert_eq!(image.read_string(text, 1).expect("prefix readable"), "A");
}
