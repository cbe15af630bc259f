//! Domain entities

mod credential;
mod item;
mod qr;

pub use credential::CredentialPair;
pub use item::{FeedPage, Highlight, Item, ItemStatus, SaveResult};
pub use qr::QrSession;
