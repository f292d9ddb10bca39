pub mod auth;
mod client_verifier;
mod command;
mod error;
mod http_server;
mod listeners;
mod response_body;
mod server_context;

pub use command::{Command, Options};
pub use error::Error;
pub use http_server::serve_request;
pub use server_context::ServerContext;
