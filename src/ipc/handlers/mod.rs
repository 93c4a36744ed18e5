pub mod attendance;
pub mod backup;
pub mod catechists;
pub mod core;
pub mod deliveries;
pub mod ledger;
pub mod payments;
pub mod reports;
pub mod session;
pub mod setup;
pub mod students;
