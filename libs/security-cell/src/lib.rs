// =====================================================================================
// SECURITY CELL - ROLE BASED ACCESS CONTROL
// =====================================================================================
//
// Five hospital roles (patient, intern, doctor, manager, admin) with an
// operation matrix per resource plus record scopes for visits and diagnoses.
// Handlers call into this cell before any entity rule runs.
//
// =====================================================================================

pub mod models;
pub mod services;

pub use models::{AccessError, Actor, Operation, RecordScope, Resource, Role};
pub use services::{AccessPolicy, ActorResolver};
