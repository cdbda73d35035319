//! Notification dispatch endpoint
//!
//! Bearer-authenticated HTTP surface accepting notification requests for
//! the authenticated user. Delivery (push/SMS/email) is delegated
//! further and stubbed here: accepted requests are logged and
//! acknowledged.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod types;

pub use auth::{AuthenticatedUser, StaticTokenVerifier, TokenVerifier};
pub use server::NotifyServer;
pub use types::{ApiResponse, NotificationRequest, NotificationType};
