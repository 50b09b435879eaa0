pub mod memory;

pub use memory::MemoryEventDatabase;
