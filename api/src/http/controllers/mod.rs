pub mod chat;
pub mod page;

pub use chat as ChatController;
pub use page as PageController;
