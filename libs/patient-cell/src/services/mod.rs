pub mod bulk_assign;
pub mod patient;

pub use bulk_assign::BulkAssignService;
pub use patient::PatientService;
