use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Tensor lookup failed.
    #[snafu(display("unknown tensor '{name}'"))]
    UnknownTensor { name: String },

    /// Buffer lookup failed.
    #[snafu(display("unknown buffer '{name}'"))]
    UnknownBuffer { name: String },

    #[snafu(display("tensor '{name}' is already declared"))]
    TensorExists { name: String },

    #[snafu(display("buffer '{name}' is already declared"))]
    BufferExists { name: String },

    /// Tensor has no buffer bound to it.
    #[snafu(display("tensor '{tensor}' is not bound to a buffer"))]
    UnboundBuffer { tensor: String },

    /// Module has no program at the given position.
    #[snafu(display("module has no program #{index}"))]
    UnknownProgram { index: usize },

    // =========================================================================
    // Interpreter
    // =========================================================================
    /// Variable read outside of the loop or block that binds it.
    #[snafu(display("variable '{name}' is not bound"))]
    UnboundVariable { name: String },

    /// Expression does not evaluate to an integer where one is required.
    #[snafu(display("expected an integer value in {context}"))]
    NonIntegerValue { context: &'static str },

    #[snafu(display("integer division by zero"))]
    DivisionByZero,

    /// Access rank differs from the buffer rank.
    #[snafu(display("access to '{tensor}' has {got} indices but its buffer has rank {expected}"))]
    RankMismatch { tensor: String, expected: usize, got: usize },

    /// Index outside of the bound buffer.
    #[snafu(display("index {index:?} is out of bounds for '{tensor}' with shape {shape:?}"))]
    OutOfBounds { tensor: String, index: Vec<i64>, shape: Vec<i64> },

    /// Input data length differs from the tensor size.
    #[snafu(display("input for '{tensor}' has {got} elements, expected {expected}"))]
    InputSizeMismatch { tensor: String, expected: usize, got: usize },

    #[snafu(display("unknown intrinsic '{name}'"))]
    UnknownIntrinsic { name: String },
}
