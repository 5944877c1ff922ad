//! Contract store and runtime binding table.
//!
//! A contract is a tenant-scoped policy: which guardrails to run, what
//! threshold each produced metric must stay within, and what to do on
//! violation. The store holds contracts as raw JSON keyed by either of
//! two wire forms; the binding table composes an enforceable contract
//! with the guardrail ids its thresholds require, ready for the
//! validation engine to invoke.

pub mod binding;
pub mod error;
pub mod model;
pub mod store;

pub use binding::{RuntimeBinding, RuntimeBindingTable};
pub use error::{ContractError, Result};
pub use model::{normalize_wire_json, Contract, ContractStatus};
pub use store::ContractStore;
