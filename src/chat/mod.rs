pub mod directory;
pub mod identity;
pub mod realtime;
pub mod session;
pub mod store;
