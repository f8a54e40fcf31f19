/// Failures the interpreter reports instead of running on with corrupt state.
///
/// Unknown opcodes are not errors; they resolve to a no-op.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to read ROM: {0}")]
    Io(#[from] std::io::Error),

    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    RomTooLarge { size: usize, max: usize },

    #[error("stack overflow: call at {pc:#06X} exceeds the call stack depth")]
    StackOverflow { pc: u16 },

    #[error("stack underflow: return at {pc:#06X} with an empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },
}
