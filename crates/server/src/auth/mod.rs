//! # Authentication
//!
//! HS256 access/refresh tokens ([`tokens`]) and the request gate that turns a
//! bearer token or a legacy session pair into a [`core_access::User`]
//! ([`middleware`]).

pub mod middleware;
pub mod tokens;
