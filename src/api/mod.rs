//! SENTIX backend API client and wire types.

mod client;
mod types;

pub use client::{NewWallet, SentixClient};
pub use types::*;
