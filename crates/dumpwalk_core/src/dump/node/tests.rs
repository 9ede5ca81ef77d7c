use crate::dump::{
	Address, Dump, DumpObject, ElementKind, FAILED_ADDRESS, FieldPath, FieldType, HeapImage, HeapImageBuilder, HeapProvider, RenderOptions,
	TreeView,
};

struct Fixture {
	image: HeapImage,
	holder: Address,
}

fn fixture() -> Fixture {
	let mut builder = HeapImageBuilder::new(8);
	let int_ty = builder.primitive_type(ElementKind::Int32);
	let string_ty = builder.string_type();
	let color_ty = builder.enum_type("Sample.Color", ElementKind::Int32, &[("Red", 0), ("Green", 1), ("Blue", 2)]);
	let point_ty = builder
		.struct_type(
			"Sample.Point",
			&[("X", FieldType::Scalar(ElementKind::Int32)), ("Y", FieldType::Scalar(ElementKind::Int32))],
		)
		.expect("point type");
	let marker_ty = builder.struct_type("Sample.Marker", &[]).expect("marker type");
	let guid_ty = builder
		.struct_type(
			"System.Guid",
			&[
				("_a", FieldType::Scalar(ElementKind::Int32)),
				("_b", FieldType::Scalar(ElementKind::Int16)),
				("_c", FieldType::Scalar(ElementKind::Int16)),
				("_d", FieldType::Scalar(ElementKind::UInt64)),
			],
		)
		.expect("guid type");
	let ints_ty = builder.array_type(int_ty).expect("int array type");
	let grid_ty = builder.multi_array_type(int_ty, 2).expect("grid type");
	let holder_ty = builder
		.class_type(
			"Sample.Holder",
			&[
				("count", FieldType::Scalar(ElementKind::Int32)),
				("ratio", FieldType::Scalar(ElementKind::Double)),
				("flag", FieldType::Scalar(ElementKind::Boolean)),
				("letter", FieldType::Scalar(ElementKind::Char)),
				("color", FieldType::Of(color_ty)),
				("shade", FieldType::Of(color_ty)),
				("origin", FieldType::Of(point_ty)),
				("name", FieldType::Of(string_ty)),
				("child", FieldType::Object),
				("dangling", FieldType::Object),
				("ptr", FieldType::Scalar(ElementKind::Pointer)),
				("numbers", FieldType::Of(ints_ty)),
				("grid", FieldType::Of(grid_ty)),
				("boxed", FieldType::Object),
				("marker", FieldType::Of(marker_ty)),
				("id", FieldType::Of(guid_ty)),
			],
		)
		.expect("holder type");

	let holder = builder.alloc_object(holder_ty).expect("holder");
	builder.set_field(holder, "count", 7_i32).expect("count");
	builder.set_field(holder, "ratio", 1.5_f64).expect("ratio");
	builder.set_field(holder, "flag", true).expect("flag");
	builder.set_field(holder, "letter", u16::from(b'Z')).expect("letter");
	builder.set_field(holder, "color", 2_i32).expect("color");
	builder.set_field(holder, "shade", 9_i32).expect("shade");
	let origin = builder.field_address(holder, "origin").expect("origin address");
	builder.set_value_field(origin, point_ty, "X", 3_i32).expect("origin x");
	builder.set_value_field(origin, point_ty, "Y", 4_i32).expect("origin y");
	let id = builder.field_address(holder, "id").expect("id address");
	builder
		.write(id, &[0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
		.expect("guid bytes");
	builder.set_field(holder, "ptr", 0x1234_u64).expect("ptr");
	builder.set_reference(holder, "dangling", 0x10).expect("dangling");

	let name = builder.alloc_string("Bar").expect("name");
	builder.set_reference(holder, "name", name).expect("name ref");

	let numbers = builder.alloc_array(ints_ty, 0).expect("numbers");
	builder.set_reference(holder, "numbers", numbers).expect("numbers ref");

	let grid = builder.alloc_multi_array(grid_ty, &[2, 3], &[0, 0]).expect("grid");
	for i in 0..2 {
		for j in 0..3 {
			builder.set_element(grid, &[i, j], 10 * i + j).expect("grid element");
		}
	}
	builder.set_reference(holder, "grid", grid).expect("grid ref");

	let boxed = builder.alloc_boxed(int_ty, &5_i32.to_le_bytes()).expect("boxed");
	builder.set_reference(holder, "boxed", boxed).expect("boxed ref");
	builder.add_corrupt_entry().expect("corrupt entry");

	Fixture {
		image: builder.build().expect("image builds"),
		holder,
	}
}

#[test]
fn scalar_fields_render_and_reinterpret() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	assert_eq!(holder.field("count").render_value().as_deref(), Some("7"));
	assert_eq!(holder.field("ratio").render_value().as_deref(), Some("1.5"));
	assert_eq!(holder.field("flag").render_value().as_deref(), Some("true"));
	assert_eq!(holder.field("letter").render_value().as_deref(), Some("Z"));
	assert_eq!(holder.field("count").read_as::<i32>().value(), 7);
	assert_eq!(holder.field("count").read_as::<u32>().value(), 7);
	assert_eq!(holder.field("ratio").read_as::<u64>().value(), 1.5_f64.to_bits());
	assert_eq!(holder.field("letter").read_as::<u16>().value(), u16::from(b'Z'));
	assert!(holder.field("letter").read_as::<u32>().is_error());
}

#[test]
fn width_mismatch_names_both_sizes() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let read = holder.field("count").read_as::<u64>();
	let message = read.error().expect("mismatch fails");
	assert!(message.contains("Target type size: 8 bytes"), "{message}");
	assert!(message.contains("System.Int32 size: 4 bytes"), "{message}");
}

#[test]
fn missing_fields_accumulate_path() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let missing = holder.field("a").field("b");
	assert!(matches!(missing, DumpObject::NotFound(_)));
	assert_eq!(missing.sentinel_path(), Some("a.b"));
	assert_eq!(missing.address(), FAILED_ADDRESS);
	assert!(missing.render_value().is_none());
	assert!(missing.error().is_none());
	assert!(missing.to_string().starts_with("Field not found: a.b in Sample.Holder @ 0x"));
	assert!(missing.array_items().next().is_none());
}

#[test]
fn null_references_are_sentinels() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let child = holder.field("child");
	assert!(matches!(child, DumpObject::Null(_)));
	assert_eq!(child.address(), 0);
	assert_eq!(child.render_value().as_deref(), Some("null"));
	assert_eq!(child.field("_items").field("Length").sentinel_path(), Some("child._items.Length"));

	let read = child.as_string(16);
	let message = read.error().expect("null read fails");
	assert!(message.starts_with("Cannot read from failed DumpObject. Error: Field was null: child in Sample.Holder @ 0x"));
}

#[test]
fn read_faults_become_terminal_errors() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let broken = holder.field("dangling");
	let error = broken.error().expect("dangling reference errors");
	assert!(error.contains("unmapped read"), "{error}");
	assert_eq!(broken.address(), FAILED_ADDRESS);
	assert!(broken.render_value().is_none());

	let next = broken.field("anything");
	assert_eq!(next.error(), broken.error());
	assert!(next.read_as::<u32>().is_error());
}

#[test]
fn enums_render_symbolic_names() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	assert!(holder.field("color").as_string(64) == "Blue");
	assert_eq!(holder.field("color").render_value().as_deref(), Some("Blue"));
	assert!(holder.field("shade").as_string(64) == "9");
	assert_eq!(holder.field("color").read_as::<i32>().value(), 2);
	assert!(holder.field("count").as_string(64).is_error());
}

#[test]
fn strings_truncate_and_quote() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let name = holder.field("name");
	assert!(name.as_string(4096) == "Bar");
	assert!(name.as_string(2) == "Ba");
	assert!(name.read_as::<u32>().is_error());
	assert!(name.to_tree_string(0, 0).ends_with(" \"Bar\""));
	assert!(holder.to_tree_string(1, 5).contains("\n  name: \"Bar\""));
}

#[test]
fn value_types_use_registered_formatters() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let origin = holder.field("origin");
	assert!(matches!(origin, DumpObject::ValueType(_)));
	assert_eq!(origin.field("Y").render_value().as_deref(), Some("4"));
	assert!(origin.render_value().is_none());
	assert_eq!(origin.read_as::<u64>().value(), 3 | (4 << 32));

	dump.register_formatter("Sample.Point", |reader| {
		Ok(format!("({}, {})", reader.read_at::<i32>(0)?, reader.read_at::<i32>(4)?))
	});
	assert_eq!(origin.render_value().as_deref(), Some("(3, 4)"));
	assert!(holder.to_tree_string(1, 5).contains("\n  origin: (3, 4)"));

	dump.register_value_formatter::<u64>("Sample.Point");
	assert_eq!(origin.render_value().as_deref(), Some(((4_u64 << 32) | 3).to_string().as_str()));
	assert!(dump.has_formatter("Sample.Point"));
}

#[test]
fn value_type_without_offset_zero_field_cannot_be_read() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let read = holder.field("marker").read_as::<u8>();
	assert_eq!(read.error(), Some("Failed to find field at offset 0 for value type Sample.Marker"));
}

#[test]
fn default_guid_formatter_renders_hyphenated() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	assert_eq!(holder.field("id").render_value().as_deref(), Some("00112233-4455-6677-8899-aabbccddeeff"));

	let bare = Dump::without_formatters(fixture().image);
	let holder = bare.object_at(fx.holder).expect("holder classifies");
	assert!(holder.field("id").render_value().is_none());
}

#[test]
fn empty_array_has_zero_length() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let numbers = holder.field("numbers");
	assert!(numbers.is_array());
	assert_eq!(numbers.array_items().count(), 0);
	assert_eq!(numbers.field("Length").render_value().as_deref(), Some("0"));
	assert!(matches!(numbers.field("Count"), DumpObject::NotFound(_)));
	let fields: Vec<_> = numbers.fields().map(|field| field.name).collect();
	assert_eq!(fields, vec!["Length"]);
}

#[test]
fn multi_dimensional_items_vary_first_dimension_fastest() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let grid = holder.field("grid");
	let values: Vec<i32> = grid.array_items().map(|item| item.read_as::<i32>().value()).collect();
	assert_eq!(values, vec![0, 10, 1, 11, 2, 12]);
	assert_eq!(grid.field("Length").render_value().as_deref(), Some("6"));

	let rendered = grid.to_tree_string(1, 2);
	assert!(rendered.contains("\n  [0, 0]: 0\n  [1, 0]: 10\n  ... 4 more"), "{rendered}");

	let path = FieldPath::parse("grid[1, 2]").expect("path parses");
	assert_eq!(holder.navigate(&path).render_value().as_deref(), Some("12"));
	let path = FieldPath::parse("grid[2, 0]").expect("path parses");
	assert_eq!(holder.navigate(&path).sentinel_path(), Some("[2, 0]"));
}

#[test]
fn boxed_primitives_render_inline() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let boxed = holder.field("boxed");
	assert!(matches!(boxed, DumpObject::Boxed(_)));
	assert_eq!(boxed.render_value().as_deref(), Some("5"));
	assert_eq!(boxed.read_as::<i32>().value(), 5);
	assert!(boxed.read_as::<i64>().is_error());
	let rendered = boxed.to_tree_string(0, 0);
	assert!(rendered.starts_with("System.Int32 @ 0x"), "{rendered}");
	assert!(rendered.ends_with(" (boxed): 5"), "{rendered}");
}

#[test]
fn pointers_render_as_hex() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let ptr = holder.field("ptr");
	assert!(matches!(ptr, DumpObject::Pointer(_)));
	assert_eq!(ptr.render_value().as_deref(), Some("0x0000000000001234"));
	assert_eq!(ptr.read_as::<u64>().value(), 0x1234);
	assert!(ptr.read_as::<u32>().is_error());
}

#[test]
fn depth_zero_shows_leaves_but_not_children() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	assert_eq!(holder.field("count").to_tree_string(0, 5), "7");
	let header = holder.to_tree_string(0, 5);
	assert!(!header.contains('\n'));
	assert_eq!(header, format!("Sample.Holder @ 0x{:016x}", fx.holder));

	let options = RenderOptions { depth: 0, ..RenderOptions::default() };
	assert!(matches!(holder.to_tree(&options), TreeView::Deferred { .. }));
	assert!(matches!(holder.field("count").to_tree(&options), TreeView::Value { ref text } if text == "7"));
}

#[test]
fn tree_view_expands_fields_and_items() {
	let fx = fixture();
	let dump = Dump::new(fx.image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let options = RenderOptions {
		depth: 2,
		array_items: 4,
		..RenderOptions::default()
	};
	let TreeView::Object { fields, .. } = holder.to_tree(&options) else {
		panic!("holder expands");
	};
	let count = fields.iter().find(|field| field.name == "count").expect("count present");
	assert_eq!(count.value, TreeView::Value { text: "7".into() });
	let dangling = fields.iter().find(|field| field.name == "dangling").expect("dangling present");
	assert!(matches!(dangling.value, TreeView::Error { .. }));

	let grid = fields.iter().find(|field| field.name == "grid").expect("grid present");
	let TreeView::Object { items, truncated, .. } = &grid.value else {
		panic!("grid expands");
	};
	assert_eq!(items.len(), 4);
	assert_eq!(items[1].name, "[1, 0]");
	assert_eq!(*truncated, 2);
}

#[test]
fn heap_walk_matches_glob_and_skips_corrupt_entries() {
	let fx = fixture();
	let dump = Dump::new(fx.image);

	let matches: Vec<_> = dump.heap_objects("Sample.H*").expect("glob compiles").collect();
	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].address(), fx.holder);

	let strings = dump.heap_objects("System.String").expect("glob compiles").count();
	assert_eq!(strings, 1);
	let everything = dump.heap_objects("*").expect("glob compiles").count();
	assert_eq!(everything, 5);
}

struct ArrayFixture {
	image: HeapImage,
	colors: Address,
	points: Address,
	pointers: Address,
	voids: Address,
	offset_grid: Address,
}

fn array_fixture() -> ArrayFixture {
	let mut builder = HeapImageBuilder::new(8);
	let int_ty = builder.primitive_type(ElementKind::Int32);
	let ptr_ty = builder.primitive_type(ElementKind::Pointer);
	let void_ty = builder.primitive_type(ElementKind::Void);
	let color_ty = builder.enum_type("Sample.Color", ElementKind::Int32, &[("Red", 0), ("Green", 1), ("Blue", 2)]);
	let point_ty = builder
		.struct_type(
			"Sample.Point",
			&[("X", FieldType::Scalar(ElementKind::Int32)), ("Y", FieldType::Scalar(ElementKind::Int32))],
		)
		.expect("point type");
	let colors_ty = builder.array_type(color_ty).expect("enum array type");
	let points_ty = builder.array_type(point_ty).expect("struct array type");
	let pointers_ty = builder.array_type(ptr_ty).expect("pointer array type");
	let voids_ty = builder.array_type(void_ty).expect("void array type");
	let grid_ty = builder.multi_array_type(int_ty, 2).expect("grid type");

	let colors = builder.alloc_array(colors_ty, 3).expect("colors");
	for (slot, value) in [0_i32, 2, 7].into_iter().enumerate() {
		builder.set_element(colors, &[slot as i32], value).expect("color element");
	}

	let points = builder.alloc_array(points_ty, 2).expect("points");
	for slot in 0..2 {
		let point = builder.element_address(points, &[slot]).expect("point address");
		builder.set_value_field(point, point_ty, "X", slot).expect("point x");
		builder.set_value_field(point, point_ty, "Y", 100 + slot).expect("point y");
	}

	let pointers = builder.alloc_array(pointers_ty, 2).expect("pointers");
	builder.set_element(pointers, &[1], 0xabc_u64).expect("pointer element");

	let voids = builder.alloc_array(voids_ty, 2).expect("voids");

	let offset_grid = builder.alloc_multi_array(grid_ty, &[2, 2], &[1, -1]).expect("offset grid");
	for i in 1..=2 {
		for j in -1..=0 {
			builder.set_element(offset_grid, &[i, j], 10 * i + j).expect("grid element");
		}
	}

	ArrayFixture {
		image: builder.build().expect("image builds"),
		colors,
		points,
		pointers,
		voids,
		offset_grid,
	}
}

#[test]
fn enum_arrays_yield_named_enum_items() {
	let fx = array_fixture();
	let dump = Dump::new(fx.image);
	let colors = dump.object_at(fx.colors).expect("colors classify");

	let items: Vec<_> = colors.array_items().collect();
	assert!(items.iter().all(|item| matches!(item, DumpObject::Enum(_))));
	let names: Vec<String> = items.iter().map(|item| item.as_string(16).value()).collect();
	assert_eq!(names, vec!["Red", "Blue", "7"]);
	assert_eq!(items[1].read_as::<i32>().value(), 2);
}

#[test]
fn struct_arrays_yield_inline_values() {
	let fx = array_fixture();
	let dump = Dump::new(fx.image);
	let points = dump.object_at(fx.points).expect("points classify");

	let items: Vec<_> = points.array_items().collect();
	assert_eq!(items.len(), 2);
	assert!(items.iter().all(|item| matches!(item, DumpObject::ValueType(_))));
	assert_eq!(items[1].field("Y").read_as::<i32>().value(), 101);
	assert_eq!(items[1].field("X").render_value().as_deref(), Some("1"));
	assert!(matches!(items[0].field("Z"), DumpObject::NotFound(_)));
}

#[test]
fn pointer_arrays_yield_pointer_items() {
	let fx = array_fixture();
	let dump = Dump::new(fx.image);
	let pointers = dump.object_at(fx.pointers).expect("pointers classify");

	let rendered: Vec<String> = pointers
		.array_items()
		.map(|item| {
			assert!(matches!(item, DumpObject::Pointer(_)));
			item.render_value().expect("pointer renders")
		})
		.collect();
	assert_eq!(rendered, vec!["0x0000000000000000", "0x0000000000000abc"]);
}

#[test]
fn unsupported_element_kinds_yield_not_found_items() {
	let fx = array_fixture();
	let dump = Dump::new(fx.image);
	let voids = dump.object_at(fx.voids).expect("voids classify");

	let paths: Vec<String> = voids
		.array_items()
		.map(|item| {
			assert!(matches!(item, DumpObject::NotFound(_)));
			item.sentinel_path().expect("sentinel path").to_owned()
		})
		.collect();
	assert_eq!(paths, vec!["[0]", "[1]"]);

	let item = voids.array_item(&[1]);
	assert!(matches!(item, DumpObject::NotFound(_)));
	assert_eq!(item.sentinel_path(), Some("[1]"));
}

#[test]
fn lower_bounds_shift_labels_but_not_order() {
	let fx = array_fixture();
	let dump = Dump::new(fx.image);
	let grid = dump.object_at(fx.offset_grid).expect("grid classifies");

	let mut items = grid.array_items();
	let mut labels = Vec::new();
	let mut values = Vec::new();
	while let Some((label, item)) = items.next_labeled() {
		labels.push(label);
		values.push(item.read_as::<i32>().value());
	}
	assert_eq!(labels, vec!["[1, -1]", "[2, -1]", "[1, 0]", "[2, 0]"]);
	assert_eq!(values, vec![9, 19, 10, 20]);

	let path = FieldPath::parse("[1, 0]").expect("path parses");
	assert_eq!(grid.navigate(&path).render_value().as_deref(), Some("19"));
}

#[test]
fn boxed_primitives_read_without_declared_size() {
	let fx = fixture();
	let mut types = fx.image.types().to_vec();
	for ty in types.iter_mut().filter(|ty| ty.name == "System.Int32") {
		ty.size = 0;
	}
	let objects = fx.image.heap_objects().map(|entry| entry.address).collect();
	let image = HeapImage::from_parts(8, types, fx.image.segments().to_vec(), objects).expect("image rebuilds");
	let dump = Dump::new(image);
	let holder = dump.object_at(fx.holder).expect("holder classifies");

	let boxed = holder.field("boxed");
	assert_eq!(boxed.render_value().as_deref(), Some("5"));
	assert_eq!(boxed.read_as::<i32>().value(), 5);
	assert!(boxed.read_as::<i64>().error().is_some_and(|message| message.contains("4 bytes")));
}
