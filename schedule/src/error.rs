use snafu::Snafu;

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

/// Which side of a block's accesses an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

/// Failure class of a schedule primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is invalid for the program it targets.
    Precondition,
    /// An index expression cannot be bounded.
    UnsupportedAccessPattern,
    /// No single scope can host the synthesized block.
    StructuralConflict,
    /// An internal invariant does not hold after a rewrite.
    Consistency,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ScheduleError {
    #[snafu(display("block '{name}' not found"))]
    BlockNotFound { name: String },

    #[snafu(display("loop over '{var}' not found"))]
    LoopNotFound { var: String },

    /// The root block has no parent scope to insert into.
    #[snafu(display("'{name}' is a program root and has no enclosing scope"))]
    RootTarget { name: String },

    /// Barriers and copy blocks can only be placed among sequence siblings.
    #[snafu(display("'{name}' is not a statement of a sequence"))]
    NotInScope { name: String },

    #[snafu(display("block '{block}' has {count} {kind} accesses, index {index} is out of range"))]
    AccessIndexOutOfRange { block: String, kind: AccessKind, index: usize, count: usize },

    /// A block must hold exactly one Store.
    #[snafu(display("block '{block}' must contain exactly one store, found {count}"))]
    StoreCount { block: String, count: usize },

    /// Shrinking a buffer requires rebasing every access to it.
    #[snafu(display("cannot fix the footprint of '{tensor}': {reason}"))]
    FootprintEscapes { tensor: String, reason: String },

    #[snafu(display("cannot bound index {axis} of '{tensor}' ({expr}): {reason}"))]
    UnsupportedAccessPattern { tensor: String, axis: usize, expr: String, reason: &'static str },

    #[snafu(display("cannot place the cache of '{tensor}': {reason}"))]
    StructuralConflict { tensor: String, reason: String },

    #[snafu(display("expected exactly one realized block '{name}' after rewrite, found {found}"))]
    CacheBlockCount { name: String, found: usize },

    #[snafu(display("store target '{tensor}' has no buffer"))]
    UnboundStoreTarget { tensor: String },

    #[snafu(context(false), display("{source}"))]
    Ir { source: cachet_ir::Error },
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::BlockNotFound { .. }
            | ScheduleError::LoopNotFound { .. }
            | ScheduleError::RootTarget { .. }
            | ScheduleError::NotInScope { .. }
            | ScheduleError::AccessIndexOutOfRange { .. }
            | ScheduleError::StoreCount { .. }
            | ScheduleError::FootprintEscapes { .. }
            | ScheduleError::Ir { .. } => ErrorKind::Precondition,
            ScheduleError::UnsupportedAccessPattern { .. } => ErrorKind::UnsupportedAccessPattern,
            ScheduleError::StructuralConflict { .. } => ErrorKind::StructuralConflict,
            ScheduleError::CacheBlockCount { .. } | ScheduleError::UnboundStoreTarget { .. } => ErrorKind::Consistency,
        }
    }
}
