mod secret_hasher;
mod session_issuer;
mod token_codec_impl;

pub use secret_hasher::*;
pub use session_issuer::*;
pub use token_codec_impl::*;
