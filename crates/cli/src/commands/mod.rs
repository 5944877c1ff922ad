pub mod config_cmd;
pub mod contract;
pub mod guardrail;
pub mod serve;
