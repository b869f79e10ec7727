pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, current_admin};
pub use cors::create_cors;
