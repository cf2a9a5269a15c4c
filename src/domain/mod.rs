pub mod activity;
pub mod queue;
