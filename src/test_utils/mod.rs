//! In-memory collaborators for tests: a scripted cursor, a recording
//! connection and a counting provider.

pub mod connection;
pub mod cursor;

pub use connection::{
    ConnectionProperties, MemoryConnection, MemoryProbe, MemoryProvider, MemoryScript,
    MemoryState, ProviderStats,
};
pub use cursor::MemoryCursor;
