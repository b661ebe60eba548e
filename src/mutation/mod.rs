//! Optimistic mutations over the query cache.

mod context;
mod controller;
mod notify;

pub use controller::{MutationController, OptimisticMutation};
pub use notify::{Notification, NotificationLevel, Notifier};

#[cfg(test)]
pub use notify::RecordingNotifier;
