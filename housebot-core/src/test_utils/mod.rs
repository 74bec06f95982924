//! In-memory stand-ins for the Twitch and Discord collaborators, shared by the
//! crate's integration tests.

pub mod mocks;

pub use mocks::{MockMessenger, MockStreamingApi, SentMessage};
