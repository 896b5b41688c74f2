//! Cohort Core - condition model and resolution layers for the Cohort engine
//!
//! This crate provides the fundamental pieces shared by the query and
//! evaluation layers:
//! - Parameter values (tagged union over scalars, dates, nested conditions)
//! - The condition model and its type registry
//! - Type resolution with parent-chain cycle detection
//! - Contextual parameter substitution (`parameter::` / `script::`)
//! - The item model evaluated against (profiles, sessions, events)

pub mod condition;
pub mod context;
pub mod error;
pub mod item;
pub mod registry;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use condition::{Action, ActionType, Condition, ConditionType, PropertyType, ValueType};
pub use error::CoreError;
pub use item::{Event, EventSource, Item, Profile, Session};
pub use registry::DefinitionsService;
pub use types::ParamValue;
