use test_case::test_case;

use crate::{Buffer, DType, Error, MemoryType, Tensor, TensorTable};

fn table_with(names: &[&str]) -> TensorTable {
    let mut table = TensorTable::new();
    for name in names {
        table.declare_with_buffer(Tensor::new(*name, DType::Float32, [16]), MemoryType::Global).unwrap();
    }
    table
}

#[test]
fn test_declare_with_buffer_binds_default_buffer() {
    let table = table_with(&["A"]);

    let buffer = table.buffer_of("A").unwrap();
    assert_eq!(buffer.name, "_A");
    assert_eq!(buffer.memory, MemoryType::Global);
    assert_eq!(buffer.shape.as_slice(), &[16]);
    assert_eq!(table.aliases("_A").collect::<Vec<_>>(), vec!["A"]);
}

#[test]
fn test_declare_duplicate_tensor_fails() {
    let mut table = table_with(&["A"]);
    let err = table.declare(Tensor::new("A", DType::Float32, [4])).unwrap_err();
    assert_eq!(err, Error::TensorExists { name: "A".into() });
}

#[test]
fn test_declare_with_unknown_buffer_fails() {
    let mut table = TensorTable::new();
    let mut tensor = Tensor::new("A", DType::Float32, [4]);
    tensor.buffer = Some("_missing".into());
    assert_eq!(table.declare(tensor).unwrap_err(), Error::UnknownBuffer { name: "_missing".into() });
}

#[test]
fn test_unbound_tensor_has_no_buffer() {
    let mut table = TensorTable::new();
    table.declare(Tensor::new("X", DType::Int32, [2, 2])).unwrap();
    assert_eq!(table.buffer_of("X").unwrap_err(), Error::UnboundBuffer { tensor: "X".into() });
}

#[test]
fn test_bind_moves_reverse_index() {
    let mut table = table_with(&["A", "B"]);

    table.bind("B", "_A").unwrap();

    assert_eq!(table.aliases("_A").collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(table.aliases("_B").count(), 0, "old buffer should lose its only tensor");
    assert_eq!(table.tensor("B").unwrap().buffer.as_deref(), Some("_A"));
}

#[test]
fn test_rebind_all_skips_excepted_tensor() {
    let mut table = table_with(&["A", "B", "C"]);
    table.bind("B", "_A").unwrap();
    table.bind("C", "_A").unwrap();
    table.declare_buffer(Buffer::new("cache", MemoryType::Local, DType::Float32, [16])).unwrap();

    let moved = table.rebind_all("_A", "cache", Some("A")).unwrap();

    assert_eq!(moved, vec!["B".to_string(), "C".to_string()]);
    assert_eq!(table.buffer_of("A").unwrap().name, "_A");
    assert_eq!(table.buffer_of("B").unwrap().name, "cache");
    assert_eq!(table.buffer_of("C").unwrap().name, "cache");
}

#[test]
fn test_rebind_all_to_unknown_buffer_fails() {
    let mut table = table_with(&["A"]);
    assert_eq!(table.rebind_all("_A", "nope", None).unwrap_err(), Error::UnknownBuffer { name: "nope".into() });
    assert_eq!(table.buffer_of("A").unwrap().name, "_A", "failed rebind must not touch bindings");
}

#[test_case(&[], "A_shared", "A_shared"; "free_name")]
#[test_case(&["A_shared"], "A_shared", "A_shared_1"; "first_collision")]
#[test_case(&["A_shared", "A_shared_1"], "A_shared", "A_shared_2"; "second_collision")]
fn test_fresh_tensor_name(existing: &[&str], base: &str, expected: &str) {
    let table = table_with(existing);
    assert_eq!(table.fresh_tensor_name(base), expected);
}

#[test_case("global", MemoryType::Global)]
#[test_case("shared", MemoryType::Shared)]
#[test_case("local", MemoryType::Local)]
fn test_memory_type_round_trips_through_strings(text: &str, memory: MemoryType) {
    assert_eq!(text.parse::<MemoryType>().unwrap(), memory);
    assert_eq!(memory.to_string(), text);
}
