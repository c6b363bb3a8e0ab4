pub mod auth;
pub mod chats;
pub mod error;
pub mod extract;
pub mod files;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod pictures;
pub mod routes;
pub mod upload;
pub mod users;
pub mod validation;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
