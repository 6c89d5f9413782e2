pub mod diagnosis;
pub mod disease;

pub use diagnosis::DiagnosisService;
pub use disease::DiseaseService;
