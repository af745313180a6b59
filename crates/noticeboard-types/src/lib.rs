pub mod api;
pub mod models;

pub use models::{ItemRef, ItemType, PermissionState, PushKeys, PushSubscription};
