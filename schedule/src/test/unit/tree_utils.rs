use cachet_ir::{Expr, Stmt};

use crate::ScheduleError;
use crate::test::helpers::{producer_consumer, row_sum};
use crate::tree_utils::{common_prefix, enclosing_seq, insert_into_seq, insert_sibling, loops_above, normalize_to_block};

fn marker(name: &str) -> Stmt {
    Stmt::Evaluate(Expr::call(name, Vec::new(), cachet_ir::DType::Void))
}

fn every_body_is_seq(root: &Stmt) -> bool {
    let mut ok = true;
    let _ = root.walk(&mut |_, stmt| {
        let body = match stmt {
            Stmt::For(node) => Some(node.body.as_ref()),
            Stmt::Realize(realize) => Some(realize.block.body.as_ref()),
            _ => None,
        };
        ok &= body.is_none_or(|b| matches!(b, Stmt::Seq(_)));
        std::ops::ControlFlow::Continue(())
    });
    ok
}

#[test]
fn test_normalize_wraps_bodies() {
    let mut root = row_sum(2, 4).exprs.remove(0);
    assert!(!every_body_is_seq(&root));

    normalize_to_block(&mut root);

    assert!(every_body_is_seq(&root));
    assert_eq!(root.find_block("C"), Some(vec![0, 0, 0, 1, 0, 0]));
}

#[test]
fn test_normalize_is_idempotent() {
    let mut root = producer_consumer(4).exprs.remove(0);
    normalize_to_block(&mut root);
    let once = root.clone();

    normalize_to_block(&mut root);

    assert_eq!(root, once);
}

#[test]
fn test_normalize_preserves_text() {
    let original = producer_consumer(4).exprs.remove(0);
    let mut root = original.clone();
    normalize_to_block(&mut root);
    assert_eq!(root.to_string(), original.to_string());
}

#[test]
fn test_common_prefix() {
    let a = [0, 1, 2, 3];
    let b = [0, 1, 4];
    let c = [0, 1];
    assert_eq!(common_prefix([&a[..], &b[..], &c[..]]), vec![0, 1]);
    assert_eq!(common_prefix([&a[..]]), a.to_vec());
    assert!(common_prefix(std::iter::empty::<&[usize]>()).is_empty());
}

#[test]
fn test_enclosing_seq_is_proper_ancestor() {
    let mut root = producer_consumer(4).exprs.remove(0);
    normalize_to_block(&mut root);
    let consumer = root.find_block("B").unwrap();

    assert_eq!(enclosing_seq(&root, &consumer), Some(vec![0, 1, 0]));
    assert_eq!(enclosing_seq(&root, &[0, 1]), Some(vec![0]));
    assert_eq!(enclosing_seq(&root, &[0]), None);
}

#[test]
fn test_insert_sibling_before_and_after() {
    let mut root = producer_consumer(4).exprs.remove(0);
    normalize_to_block(&mut root);

    insert_sibling(&mut root, &[0, 1], marker("after"), true, "j").unwrap();
    insert_sibling(&mut root, &[0, 0], marker("before"), false, "i").unwrap();

    let names: Vec<String> = root.get(&[0]).and_then(Stmt::as_seq).unwrap().iter().map(|s| s.to_string()).collect();
    assert_eq!(names[0].trim(), "before()");
    assert!(names[1].starts_with("for (i"));
    assert!(names[2].starts_with("for (j"));
    assert_eq!(names[3].trim(), "after()");
}

#[test]
fn test_insert_into_non_sequence_fails() {
    let mut root = producer_consumer(4).exprs.remove(0);
    normalize_to_block(&mut root);

    let err = insert_into_seq(&mut root, &[0, 0], 0, marker("x"), "i").unwrap_err();
    assert_eq!(err, ScheduleError::NotInScope { name: "i".into() });

    let err = insert_sibling(&mut root, &[], marker("x"), true, "root").unwrap_err();
    assert_eq!(err, ScheduleError::NotInScope { name: "root".into() });
}

#[test]
fn test_insert_index_is_clamped() {
    let mut root = producer_consumer(4).exprs.remove(0);
    normalize_to_block(&mut root);

    insert_into_seq(&mut root, &[0], 99, marker("tail"), "root").unwrap();

    let seq = root.get(&[0]).and_then(Stmt::as_seq).unwrap();
    assert_eq!(seq.len(), 3);
    assert_eq!(seq[2].to_string().trim(), "tail()");
}

#[test]
fn test_loops_above() {
    let mut root = row_sum(2, 4).exprs.remove(0);
    normalize_to_block(&mut root);

    let update = root.find_block("C").unwrap();
    assert_eq!(loops_above(&root, &update), ["i", "k"]);
    let init = root.find_block("C__reduce_init").unwrap();
    assert_eq!(loops_above(&root, &init), ["i"]);
}
