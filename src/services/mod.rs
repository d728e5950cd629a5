pub mod availability;
pub mod billing_scheduler;
pub mod clock;
pub mod notifier;
pub mod waiting_sweep;
