pub mod notifications;
pub mod session;
pub mod watch;
