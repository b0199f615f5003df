//! Bearer credentials for identity-based auth and the task that keeps them fresh.

pub mod imds;
pub mod refresher;
pub mod token;

pub use imds::{ImdsTokenSource, TokenSource};
pub use refresher::{RefresherState, TokenRefresher};
pub use token::{AccessToken, SharedCredential};
