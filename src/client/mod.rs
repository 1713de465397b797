//! Client half of the session protocol: durable token storage, proactive
//! renewal scheduling, navigation guarding and request binding. Everything
//! takes an injected [`Clock`] so tests can steer time.

mod clock;
mod http_binding;
mod route_guard;
mod scheduler;
mod session_client;
mod session_store;
mod transport;

pub use clock::*;
pub use http_binding::*;
pub use route_guard::*;
pub use scheduler::*;
pub use session_client::*;
pub use session_store::*;
pub use transport::*;
