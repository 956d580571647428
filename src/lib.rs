pub mod api;
pub mod app;
pub mod chat;
pub mod error;
pub mod utils;

pub use api::client::ApiClient;
pub use api::models::{Contact, Role, Thread, ThreadStatus};
pub use chat::identity::{LocalIdentity, Profile};
pub use chat::session::{ConversationView, Messenger};
pub use chat::store::Store;
