pub mod attendance_date;
pub mod ledger;
pub mod ledger_merger;
pub mod roster;
