//! Coordinator: the HTTP+JSON facade plus the components it owns
//! (Metadata Store, Cluster View, Replication Maintainer, Heartbeat Monitor).

pub mod api;
pub mod state;

pub use state::AppState;
