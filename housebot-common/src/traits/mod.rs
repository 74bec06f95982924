pub mod api;

pub use api::{MessagingClient, StreamingApi};
