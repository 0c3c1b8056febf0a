//! Relay peer directory for meshproxy.
//!
//! Relay peers subscribe to a topic in a publish/subscribe directory. The
//! subscriber list of a topic is split into buckets; a lookup returns the
//! bucket count and the identity → address map of one bucket.
//!
//! - [`Directory`] is the lookup capability.
//! - [`RpcDirectory`] queries a directory node over JSON-RPC.
//! - [`MemoryDirectory`] serves a static table (tests, fixed relay sets).
//! - [`PeerSelector`] draws a random bucket and yields its subscribers in
//!   random order.

pub mod error;
pub mod memory;
pub mod rpc;
pub mod selector;
pub mod traits;

pub use error::DirectoryError;
pub use memory::MemoryDirectory;
pub use rpc::RpcDirectory;
pub use selector::{Candidate, Candidates, PeerSelector, draw_bucket};
pub use traits::{Directory, Subscribers};
