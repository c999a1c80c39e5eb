//! # Repository Layer
//!
//! sqlx data access, one repository per concern:
//!
//! | Repository | Pool | Holds |
//! |---|---|---|
//! | [`GlobalDirectory`](directory::GlobalDirectory) | global | routing entries, signup tokens |
//! | [`HubRepository`](hub::HubRepository) | regional | hub users, sessions, tokens |
//! | [`MemberRepository`](member::MemberRepository) | regional | org/agency users, roles |
//! | [`DomainRepository`](domains::DomainRepository) | regional | verification records |
//!
//! Cross-tier writes never share a transaction; the service layer sequences
//! them and compensates (see `service::hub_identity` / `member_identity`).

pub mod directory;
pub mod domains;
pub mod hub;
pub mod member;

pub use directory::GlobalDirectory;
pub use domains::DomainRepository;
pub use hub::HubRepository;
pub use member::MemberRepository;
