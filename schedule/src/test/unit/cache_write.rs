use cachet_ir::{DType, Expr, MemoryType, Module, Stmt, Store, Tensor, TensorTable};

use crate::test::helpers::{body, declare, declare_alias, loop_block, output, producer_consumer, ramp, row_sum};
use crate::{AccessKind, ErrorKind, Schedule, ScheduleError};

#[test]
fn test_cache_write_redirects_producer_and_copies_back() {
    let mut sch = Schedule::new(producer_consumer(16));

    let cache = sch.cache_write("A", 0, MemoryType::Local).unwrap();

    assert_eq!(cache, "A_local_temp_buffer");
    let expected = "\
ScheduleBlock(root) {
  for (i, 0, 16) {
    ScheduleBlock(A) {
      vi = axis.bind(i)
      A_local_temp_buffer[vi] = (X[vi] * 2.0)
    }
  }
  for (A_local_temp_buffer_ax0, 0, 16) {
    ScheduleBlock(A_local_temp_buffer) {
      A_local_temp_buffer_v0 = axis.bind(A_local_temp_buffer_ax0)
      A[A_local_temp_buffer_v0] = A_local_temp_buffer[A_local_temp_buffer_v0]
    }
  }
  for (j, 0, 16) {
    ScheduleBlock(B) {
      vj = axis.bind(j)
      B[vj] = (A[vj] + 1.0)
    }
  }
}
";
    assert_eq!(sch.module().root(0).unwrap().to_string(), expected);
    assert_eq!(sch.module().tensors.buffer_of(&cache).unwrap().memory, MemoryType::Local);
}

#[test]
fn test_cache_write_preserves_outputs() {
    let before = producer_consumer(16);
    let mut sch = Schedule::new(before.clone());
    sch.cache_write("A", 0, MemoryType::Local).unwrap();

    let inputs = [("X", ramp(16))];
    for tensor in ["A", "B"] {
        assert_eq!(output(sch.module(), &inputs, tensor), output(&before, &inputs, tensor), "{tensor} differs");
    }
}

#[test]
fn test_cache_write_leaves_other_programs_reading_original() {
    let mut module = producer_consumer(8);
    declare(&mut module.tensors, "E", &[8]);
    module.push_program(loop_block("m", 8, "E", |v| Store::new("E", [v.clone()], Expr::load("A", [v]) * Expr::float(3.0))));
    let before = module.clone();
    let mut sch = Schedule::new(module);

    sch.cache_write("A", 0, MemoryType::Local).unwrap();

    assert_eq!(sch.module().exprs[1], before.exprs[1]);
    let inputs = [("X", ramp(8))];
    assert_eq!(output(sch.module(), &inputs, "E"), output(&before, &inputs, "E"));
}

#[test]
fn test_cache_write_rebinds_aliases_across_programs() {
    // program 0: for i: A[vi] = X[vi] + 1.0
    // program 1: for j: Y[vj] = A_view[vj]      (A_view shares A's buffer)
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[8]);
    declare(&mut tensors, "A", &[8]);
    declare(&mut tensors, "Y", &[8]);
    declare_alias(&mut tensors, "A_view", "A");
    let mut module = Module::new(tensors);
    module.push_program(loop_block("i", 8, "A", |v| Store::new("A", [v.clone()], Expr::load("X", [v]) + Expr::float(1.0))));
    module.push_program(loop_block("j", 8, "Y", |v| Store::new("Y", [v.clone()], Expr::load("A_view", [v]))));
    let before = module.clone();
    let mut sch = Schedule::new(module);

    let cache = sch.cache_write("A", 0, MemoryType::Local).unwrap();

    let tensors = &sch.module().tensors;
    let cache_buffer = tensors.buffer_of(&cache).unwrap().name.clone();
    assert_eq!(tensors.buffer_of("A_view").unwrap().name, cache_buffer);
    assert_eq!(tensors.buffer_of("A").unwrap().name, "_A");
    assert_eq!(tensors.aliases(&cache_buffer).collect::<Vec<_>>(), vec![cache.as_str(), "A_view"]);

    let inputs = [("X", ramp(8))];
    assert_eq!(output(sch.module(), &inputs, "Y"), output(&before, &inputs, "Y"));
    assert_eq!(output(sch.module(), &inputs, "A"), output(&before, &inputs, "A"));
}

#[test]
fn test_cache_write_reduction_with_init_twin() {
    let before = row_sum(4, 8);
    let mut sch = Schedule::new(before.clone());

    let cache = sch.cache_write("C", 0, MemoryType::Local).unwrap();

    assert_eq!(cache, "C_local_temp_buffer");
    // The copy back runs once, after the whole row loop.
    let stmts = body(sch.module(), 0);
    assert_eq!(stmts.len(), 2);
    assert_eq!(stmts[0].as_for().unwrap().var.name, "i");
    assert_eq!(stmts[1].as_for().unwrap().var.name, "C_local_temp_buffer_ax0");

    let text = sch.module().root(0).unwrap().to_string();
    assert!(text.contains("C_local_temp_buffer[vi] = (C_local_temp_buffer[vi] + X[vi, vk])"), "{text}");
    assert!(text.contains("C__reduce_init[vi] = 0.0"), "{text}");

    let tensors = &sch.module().tensors;
    assert_eq!(tensors.buffer_of("C__reduce_init").unwrap().name, "_C_local_temp_buffer");
    assert_eq!(tensors.buffer_of("C").unwrap().name, "_C");

    let inputs = [("X", ramp(32))];
    assert_eq!(output(sch.module(), &inputs, "C"), output(&before, &inputs, "C"));
}

fn offset_writer(with_alias: bool) -> Module {
    // for i in 0..8: A[vi + 4] = X[vi]
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[8]);
    declare(&mut tensors, "A", &[16]);
    if with_alias {
        declare_alias(&mut tensors, "A__reduce_init", "A");
    }
    let mut module = Module::new(tensors);
    module.push_program(loop_block("i", 8, "A", |v| Store::new("A", [v.clone() + 4], Expr::load("X", [v]))));
    module
}

#[test]
fn test_cache_write_region_is_written_footprint() {
    let before = offset_writer(false);
    let mut sch = Schedule::new(before.clone());

    let cache = sch.cache_write("A", 0, MemoryType::Local).unwrap();

    assert_eq!(sch.module().tensors.tensor(&cache).unwrap().shape.as_slice(), &[8]);
    let copy = sch.get_block(&cache).unwrap();
    let store = copy.block.body.as_seq().unwrap()[0].as_store().unwrap();
    assert_eq!(store.to_string(), format!("A[({cache}_v0 + 4)] = {cache}[{cache}_v0]"));

    let inputs = [("X", ramp(8))];
    assert_eq!(output(sch.module(), &inputs, "A"), output(&before, &inputs, "A"));
}

#[test]
fn test_cache_write_partial_writer_with_alias_conflicts() {
    let module = offset_writer(true);
    let mut sch = Schedule::new(module.clone());

    let err = sch.cache_write("A", 0, MemoryType::Local).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralConflict);
    assert_eq!(sch.module(), &module);
}

#[test]
fn test_cache_write_aliased_partial_overwrite_keeps_earlier_values() {
    // for i in 0..16: A[vi] = X[vi]
    // for j in 0..8:  A[vj + 4] = Y[vj]
    // Caching the second writer would copy back elements it never wrote.
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[16]);
    declare(&mut tensors, "Y", &[8]);
    declare(&mut tensors, "A", &[16]);
    declare_alias(&mut tensors, "A__reduce_init", "A");
    let mut module = Module::new(tensors);
    module.push_program(Stmt::Seq(vec![
        loop_block("i", 16, "A0", |v| Store::new("A", [v.clone()], Expr::load("X", [v]))),
        loop_block("j", 8, "A1", |v| Store::new("A", [v.clone() + 4], Expr::load("Y", [v]))),
    ]));
    let mut sch = Schedule::new(module.clone());

    let err = sch.cache_write("A1", 0, MemoryType::Local).unwrap_err();

    assert!(matches!(&err, ScheduleError::StructuralConflict { tensor, .. } if tensor == "A"), "{err:?}");
    assert_eq!(sch.module(), &module);
}

#[test]
fn test_cache_write_partial_overwrite_without_alias_copies_footprint() {
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[16]);
    declare(&mut tensors, "Y", &[8]);
    declare(&mut tensors, "A", &[16]);
    let mut module = Module::new(tensors);
    module.push_program(Stmt::Seq(vec![
        loop_block("i", 16, "A0", |v| Store::new("A", [v.clone()], Expr::load("X", [v]))),
        loop_block("j", 8, "A1", |v| Store::new("A", [v.clone() + 4], Expr::load("Y", [v]))),
    ]));
    let before = module.clone();
    let mut sch = Schedule::new(module);

    let cache = sch.cache_write("A1", 0, MemoryType::Local).unwrap();

    assert_eq!(sch.module().tensors.tensor(&cache).unwrap().shape.as_slice(), &[8]);
    let inputs = [("X", ramp(16)), ("Y", ramp(8))];
    assert_eq!(output(sch.module(), &inputs, "A"), output(&before, &inputs, "A"));
}

#[test]
fn test_cache_write_later_consumer_reads_copied_back_tensor() {
    let before = producer_consumer(8);
    let mut sch = Schedule::new(before.clone());

    let cache = sch.cache_write("A", 0, MemoryType::Shared).unwrap();

    let consumer = sch.get_block("B").unwrap();
    let text = consumer.block.body.to_string();
    assert!(!text.contains(&cache), "{text}");
    assert!(text.contains("A[vj]"), "{text}");
    let inputs = [("X", ramp(8))];
    assert_eq!(output(sch.module(), &inputs, "B"), output(&before, &inputs, "B"));
}

#[test]
fn test_cache_write_read_before_write_conflicts() {
    // for i: A[vi] = A[vi] + 1.0   (the cache would be read uninitialized)
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "A", &[8]);
    let mut module = Module::new(tensors);
    module.push_program(loop_block("i", 8, "A", |v| {
        Store::new("A", [v.clone()], Expr::load("A", [v]) + Expr::float(1.0))
    }));
    let mut sch = Schedule::new(module.clone());

    let err = sch.cache_write("A", 0, MemoryType::Local).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralConflict);
    assert_eq!(sch.module(), &module);
}

#[test]
fn test_cache_write_index_out_of_range() {
    let mut sch = Schedule::new(producer_consumer(8));
    let err = sch.cache_write("A", 1, MemoryType::Local).unwrap_err();
    assert_eq!(
        err,
        ScheduleError::AccessIndexOutOfRange { block: "A".into(), kind: AccessKind::Write, index: 1, count: 1 }
    );
}

#[test]
fn test_cache_write_unbound_target_is_inconsistent() {
    let mut tensors = TensorTable::new();
    declare(&mut tensors, "X", &[4]);
    tensors.declare(Tensor::new("A", DType::Float32, [4])).unwrap();
    let mut module = Module::new(tensors);
    module.push_program(loop_block("i", 4, "A", |v| Store::new("A", [v.clone()], Expr::load("X", [v]))));
    let mut sch = Schedule::new(module);

    let err = sch.cache_write("A", 0, MemoryType::Local).unwrap_err();

    assert_eq!(err, ScheduleError::UnboundStoreTarget { tensor: "A".into() });
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn test_cache_write_detects_duplicate_cache_block() {
    // Another program already realizes a block under the name the cache gets.
    let mut module = producer_consumer(4);
    declare(&mut module.tensors, "Z", &[4]);
    module.push_program(loop_block("z", 4, "A_local_temp_buffer", |v| Store::new("Z", [v], Expr::float(0.0))));
    let mut sch = Schedule::new(module.clone());

    let err = sch.cache_write("A", 0, MemoryType::Local).unwrap_err();

    assert_eq!(err, ScheduleError::CacheBlockCount { name: "A_local_temp_buffer".into(), found: 2 });
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(sch.module(), &module);
}

#[test]
fn test_cache_write_then_sync_keeps_single_root_body() {
    let mut sch = Schedule::new(producer_consumer(8));
    let cache = sch.cache_write("A", 0, MemoryType::Shared).unwrap();
    sch.sync_threads(&crate::ScopeRef::block(cache.as_str()), true).unwrap();

    let stmts = body(sch.module(), 0);
    let copy_loop = stmts[1].as_for().unwrap();
    let Stmt::Seq(inner) = copy_loop.body.as_ref() else { panic!("copy loop body is not a sequence") };
    assert_eq!(inner.len(), 2);
    assert!(matches!(&inner[1], Stmt::Evaluate(Expr::Call { name, .. }) if name == "__syncthreads"));
}
