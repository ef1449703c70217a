//! Push notifications and the device tokens they are delivered to.

mod fcm_token;
mod notifier;

pub use fcm_token::{create_fcm_token_table, get_fcm_token, put_fcm_token_endpoint};
pub use notifier::{HttpNotifier, LogNotifier, Notifier, SpendNotification};

#[cfg(test)]
pub use fcm_token::upsert_fcm_token;
