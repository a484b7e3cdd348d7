//! # Medicine Take-Back Workflow
//!
//! Domain layer for a medicine take-back program: users hand in unused
//! medicine at partner pharmacies, reviewers classify and approve the
//! submissions, approved submissions earn points, and points are redeemed for
//! vouchers. A support chat and an external chatbot round it off.
//!
//! Every operation takes either a [`store::Store`] (when it owns its
//! transaction) or a `&turso::Connection` (when it runs inside the caller's).

pub mod accounts;
pub mod chat;
pub mod classification;
pub mod collaborators;
pub mod constants;
pub mod errors;
pub mod notifications;
pub mod points;
pub mod providers;
pub mod reference;
pub mod review;
pub mod stats;
pub mod store;
pub mod submissions;
pub mod types;
pub mod vouchers;

pub use errors::{ChatbotError, DomainError};
pub use providers::chatbot::{ChatbotProvider, langgraph::LangGraphChatbot};
pub use store::Store;
