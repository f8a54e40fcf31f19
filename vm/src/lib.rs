pub use chip8::Chip8;
pub use error::Error;

mod chip8;
pub mod constants;
pub mod dispatch;
mod error;
pub mod opcode;
pub mod operations;
pub mod state;
