//! Contextual parameter resolution
//!
//! Condition parameters may hold placeholders resolved per evaluation
//! context: `parameter::<key>` is replaced by the context entry for
//! `<key>`, `script::<expr>` by evaluating the expression against the
//! context. A condition whose required placeholder cannot be resolved is
//! dropped entirely (`None`); callers must exclude it, not treat it as an
//! empty condition.

use crate::condition::Condition;
use crate::types::ParamValue;
use std::collections::HashMap;

pub const PARAMETER_PREFIX: &str = "parameter::";
pub const SCRIPT_PREFIX: &str = "script::";

/// Evaluates `script::` expressions against a context map.
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, script: &str, context: &HashMap<String, ParamValue>) -> Option<ParamValue>;
}

/// Default executor: resolves dotted paths (`profile.properties.country`)
/// against the context map.
pub struct ContextLookupExecutor;

impl ScriptExecutor for ContextLookupExecutor {
    fn execute(&self, script: &str, context: &HashMap<String, ParamValue>) -> Option<ParamValue> {
        let mut segments = script.split('.');
        let mut current = context.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current.clone())
    }
}

/// Rewrites a condition's parameters from the supplied context.
///
/// Returns the condition unchanged when the context is empty or no
/// placeholder appears anywhere in its parameters. Returns `None` when a
/// required placeholder stayed unresolved.
pub fn contextual_condition(
    condition: &Condition,
    context: &HashMap<String, ParamValue>,
    script_executor: &dyn ScriptExecutor,
) -> Option<Condition> {
    if context.is_empty() || !map_has_placeholder(&condition.parameter_values) {
        return Some(condition.clone());
    }

    let mut resolved = HashMap::with_capacity(condition.parameter_values.len());
    for (name, value) in &condition.parameter_values {
        resolved.insert(name.clone(), resolve_value(value, context, script_executor)?);
    }

    let mut contextual = condition.clone();
    contextual.parameter_values = resolved;
    Some(contextual)
}

fn resolve_value(
    value: &ParamValue,
    context: &HashMap<String, ParamValue>,
    script_executor: &dyn ScriptExecutor,
) -> Option<ParamValue> {
    match value {
        ParamValue::String(s) => {
            if let Some(key) = s.strip_prefix(PARAMETER_PREFIX) {
                context.get(key).cloned()
            } else if let Some(script) = s.strip_prefix(SCRIPT_PREFIX) {
                script_executor.execute(script, context)
            } else {
                Some(value.clone())
            }
        }
        // One unresolved entry drops the whole map
        ParamValue::Map(entries) => {
            let mut resolved = HashMap::with_capacity(entries.len());
            for (key, entry) in entries {
                resolved.insert(key.clone(), resolve_value(entry, context, script_executor)?);
            }
            Some(ParamValue::Map(resolved))
        }
        // Sequences tolerate partial resolution: unresolved entries are skipped
        ParamValue::List(entries) => Some(ParamValue::List(
            entries
                .iter()
                .filter_map(|entry| resolve_value(entry, context, script_executor))
                .collect(),
        )),
        _ => Some(value.clone()),
    }
}

fn has_placeholder(value: &ParamValue) -> bool {
    match value {
        ParamValue::String(s) => {
            s.starts_with(PARAMETER_PREFIX) || s.starts_with(SCRIPT_PREFIX)
        }
        ParamValue::Map(entries) => entries.values().any(has_placeholder),
        ParamValue::List(entries) => entries.iter().any(has_placeholder),
        _ => false,
    }
}

fn map_has_placeholder(values: &HashMap<String, ParamValue>) -> bool {
    values.values().any(has_placeholder)
}
