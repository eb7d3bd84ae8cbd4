//! Pipeline composition and the HTTP server around it.

mod forward;
mod routes;
mod server;

pub use forward::{Forwarder, forward_request};
pub use routes::{Pipeline, create_router};
pub use server::serve;
