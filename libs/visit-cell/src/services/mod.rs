pub mod duplicate;
pub mod lifecycle;
pub mod visit;

pub use duplicate::DuplicateVisitService;
pub use lifecycle::VisitLifecycleService;
pub use visit::VisitService;
