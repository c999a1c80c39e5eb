//! # Region Router / Reverse Proxy
//!
//! Makes every regional API node interchangeable: the load balancer may
//! send any request to any node, and the node either serves it from its
//! own regional store or transparently forwards it to the region that owns
//! the data.
//!
//! | Piece | Job |
//! |---|---|
//! | [`router`] | Classify the path, discover the owning region |
//! | [`forward`] | One transparent HTTP hop to a peer (reqwest) |
//! | [`middleware`] | Actix middleware wiring the two together |
//!
//! The proxy adds nothing but `X-Forwarded-*`, mutates nothing, retries
//! nothing. Peer unreachable is a terminal 502, peer timeout a terminal
//! 504 - the entry node never falls back to its own store.

pub mod forward;
pub mod middleware;
pub mod router;

pub use middleware::RegionRouter;
pub use router::RouterState;
