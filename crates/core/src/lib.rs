//! # ACVPS Core
//!
//! Domain types shared by every crate in the gateway: metric values and
//! threshold bounds, the tenant-scoped contract key, evidence events, and
//! the failover-profile enum. This crate has **zero framework
//! dependencies** beyond serde/thiserror — it defines the domain model
//! that every other crate builds against.

pub mod error;
pub mod evidence;
pub mod failover;
pub mod guardrail;
pub mod key;
pub mod metric;

pub use error::{CoreError, Result};
pub use evidence::{EvidenceEvent, RequestEvent, RequestStatus, TraceId, ViolationEvent, ViolationSeverity};
pub use failover::{FailoverProfile, Suite};
pub use guardrail::{source_hash, GuardrailMetadata, GuardrailSpec};
pub use key::TenantScopeKey;
pub use metric::{clamp, Bounds, MetricMap, ThresholdSet, Violation};
