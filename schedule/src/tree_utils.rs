//! Structural helpers shared by the schedule primitives.

use cachet_ir::{Stmt, StmtPath};
use snafu::OptionExt;

use crate::error::{NotInScopeSnafu, Result};

/// Wrap every loop body and block body that is not a sequence into a
/// one-element sequence.
///
/// Afterwards every statement other than the root has a `Seq` parent, so
/// siblings can be inserted next to any of them.
pub fn normalize_to_block(root: &mut Stmt) {
    root.walk_mut(&mut |stmt| {
        let body = match stmt {
            Stmt::For(node) => &mut node.body,
            Stmt::Realize(realize) => &mut realize.block.body,
            _ => return,
        };
        if !matches!(**body, Stmt::Seq(_)) {
            let inner = std::mem::replace(&mut **body, Stmt::Seq(Vec::new()));
            **body = Stmt::Seq(vec![inner]);
        }
    });
}

/// Longest common prefix of `paths`.
pub fn common_prefix<'a>(paths: impl IntoIterator<Item = &'a [usize]>) -> StmtPath {
    let mut paths = paths.into_iter();
    let Some(first) = paths.next() else { return StmtPath::new() };
    let mut prefix = first.to_vec();
    for path in paths {
        let len = prefix.iter().zip(path).take_while(|(a, b)| a == b).count();
        prefix.truncate(len);
    }
    prefix
}

/// Deepest `Seq` on `path` that is a proper ancestor of the node at `path`.
pub fn enclosing_seq(root: &Stmt, path: &[usize]) -> Option<StmtPath> {
    (0..path.len())
        .rev()
        .map(|len| &path[..len])
        .find(|prefix| matches!(root.get(prefix), Some(Stmt::Seq(_))))
        .map(<[usize]>::to_vec)
}

/// Insert `stmt` into the sequence at `seq_path` at position `index`.
pub fn insert_into_seq(root: &mut Stmt, seq_path: &[usize], index: usize, stmt: Stmt, name: &str) -> Result<()> {
    let seq = root.get_mut(seq_path).and_then(Stmt::as_seq_mut).context(NotInScopeSnafu { name })?;
    seq.insert(index.min(seq.len()), stmt);
    Ok(())
}

/// Insert `stmt` right before or after the node at `path`.
pub fn insert_sibling(root: &mut Stmt, path: &[usize], stmt: Stmt, after: bool, name: &str) -> Result<()> {
    let (&last, parent) = path.split_last().context(NotInScopeSnafu { name })?;
    insert_into_seq(root, parent, last + usize::from(after), stmt, name)
}

/// Names of the loops enclosing the node at `path`, outermost first.
pub fn loops_above(root: &Stmt, path: &[usize]) -> Vec<String> {
    let mut node = root;
    let mut loops = Vec::new();
    for &i in path {
        if let Stmt::For(f) = node {
            loops.push(f.var.name.clone());
        }
        let Some(child) = node.child(i) else { break };
        node = child;
    }
    loops
}
