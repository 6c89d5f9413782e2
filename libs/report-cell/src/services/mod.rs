pub mod diagnosis_report;
pub mod doctor_report;

pub use diagnosis_report::DiagnosisReportService;
pub use doctor_report::DoctorReportService;
