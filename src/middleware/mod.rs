// Middleware for authentication, identity cookies and CORS

pub mod auth;
pub mod cookie;
pub mod cors;

pub use auth::*;
pub use cookie::*;
pub use cors::*;
