pub mod admin;
pub mod auth;
pub mod common;
pub mod webhook;

pub use admin::*;
pub use auth::*;
pub use common::*;
pub use webhook::*;
