pub mod callmebot;
pub mod message;
pub mod prepare;
pub mod retry;
pub mod scheduler;

pub use callmebot::CallMeBotNotifier;
pub use message::build_alert_message;
pub use prepare::{prepare_alert, AlertDefaults, AlertOverrides, PreparedAlert};
pub use retry::RetryPolicy;
pub use scheduler::{AlertScheduler, RoundSummary, SymbolOutcome};
