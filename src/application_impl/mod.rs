mod user_directory_memory;

pub use user_directory_memory::*;
