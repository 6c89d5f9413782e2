pub mod actor;
pub mod policy;

pub use actor::ActorResolver;
pub use policy::AccessPolicy;
