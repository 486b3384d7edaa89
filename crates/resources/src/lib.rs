//! Tenant Resource Definitions
//!
//! Candidate representations of tenant networking resources, as submitted by
//! the dispatcher for admission and commit.
//!
//! Every field is optional: a candidate may be a complete resource (create,
//! delete) or a delta carrying only the fields being changed (update). The
//! controller decides which fields are required for which operation.

pub mod candidate;
pub mod lbaas;
pub mod network;
pub mod security;
pub mod values;

pub use candidate::*;
pub use lbaas::*;
pub use network::*;
pub use security::*;
pub use values::*;
