//! Storage adapters.
//!
//! [`StorageAdapter`] is the driver contract the service talks to; the
//! identity rename primitives live on it so each backend can name its own
//! native identity attribute. [`MemoryAdapter`] is the in-process fallback.

mod memory;
mod traits;

pub use memory::MemoryAdapter;
pub use traits::{FindQuery, StorageAdapter};
