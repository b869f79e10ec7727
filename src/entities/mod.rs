pub mod conversations;
pub mod users;

pub use conversations as conversation_entity;
pub use users as user_entity;
