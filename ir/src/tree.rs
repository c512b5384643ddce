//! ASCII tree rendering of statements.

use std::borrow::Cow;
use std::io;

use ptree::{Style, TreeItem};

use crate::stmt::Stmt;

/// Borrowing adapter that lets ptree walk a statement tree.
#[derive(Clone)]
pub struct StmtTree<'a> {
    stmt: &'a Stmt,
}

impl<'a> StmtTree<'a> {
    pub fn new(stmt: &'a Stmt) -> Self {
        Self { stmt }
    }
}

impl TreeItem for StmtTree<'_> {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        write!(f, "{}", format_node(self.stmt))
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        let children = match self.stmt {
            // Sequences are flattened into their parent.
            Stmt::For(_) | Stmt::Realize(_) => match self.stmt.child(0) {
                Some(Stmt::Seq(stmts)) => stmts.iter().map(StmtTree::new).collect(),
                Some(body) => vec![StmtTree::new(body)],
                None => Vec::new(),
            },
            Stmt::Seq(stmts) => stmts.iter().map(StmtTree::new).collect(),
            Stmt::Store(_) | Stmt::Evaluate(_) => Vec::new(),
        };
        Cow::Owned(children)
    }
}

fn format_node(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Seq(stmts) => format!("SEQ(len={})", stmts.len()),
        Stmt::For(node) => node.header(),
        Stmt::Realize(realize) => format!("BLOCK({})", realize.block.name),
        Stmt::Store(store) => store.to_string(),
        Stmt::Evaluate(expr) => expr.to_string(),
    }
}

impl Stmt {
    /// Render this statement as an ASCII tree.
    pub fn tree(&self) -> String {
        let mut buf = Vec::new();
        if ptree::write_tree(&StmtTree::new(self), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
