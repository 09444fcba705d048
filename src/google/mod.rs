pub mod client;
pub mod oauth;
pub mod types;

pub use client::{AuthInfo, CalendarClient, CalendarService, EventQuery};
pub use oauth::OAuthClient;
