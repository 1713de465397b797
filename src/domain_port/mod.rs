mod credential_hasher;
mod user_directory;

pub use credential_hasher::*;
pub use user_directory::*;
