pub mod codec;
pub mod file_system;
mod finite;

pub use codec::{JsonCodec, MessagePackCodec, RecordCodec};
pub use file_system::{FileSystem, MemoryFileSystem, TokioFileSystem};
