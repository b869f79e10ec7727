pub mod admin_directory;
pub mod admin_service;
pub mod auth_service;
pub mod challenge_service;
pub mod conversation_service;
pub mod pipeline_service;
pub mod reply_service;

pub use admin_directory::*;
pub use admin_service::*;
pub use auth_service::*;
pub use challenge_service::*;
pub use conversation_service::*;
pub use pipeline_service::*;
pub use reply_service::*;
