//! `${key}` placeholders and template materialization.
//!
//! Substitution is literal: there is no escaping, so a value containing a
//! literal `${` sequence cannot be round-tripped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{
    common::Vars,
    model::{NodeTransition, WorkflowDefinition, WorkflowNode, WorkflowTemplate},
    utils::time::monotonic_micros,
    workflow::consts::{END, END_NODE_ID, START, START_NODE_ID},
};

/// Format: `${key}` or `${key.path.0}`
static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

/// Replace every `${key}` occurrence with the matching param, recursively
/// through objects and arrays. Strings substitute verbatim, other values as
/// JSON text. Unknown keys are left untouched.
pub fn substitute_placeholders(
    value: &Value,
    params: &Vars,
) -> Value {
    match value {
        Value::String(s) => {
            let mut result = s.clone();
            for (key, param) in params.iter() {
                let placeholder = format!("${{{}}}", key);
                if result.contains(&placeholder) {
                    result = result.replace(&placeholder, &text(param));
                }
            }
            Value::String(result)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_placeholders(v, params)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), substitute_placeholders(v, params))).collect()),
        v => v.clone(),
    }
}

/// Resolve `${path}` placeholders against instance variables at run time.
///
/// A string that is exactly one placeholder takes the variable's JSON value;
/// otherwise placeholders are interpolated as text. Unresolved placeholders
/// stay as written.
pub fn resolve_placeholders(
    value: &Value,
    vars: &Vars,
) -> Value {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return value.clone();
    };
    match value {
        Value::String(s) => {
            if let Some(caps) = re.captures(s) {
                if caps[0].len() == s.len() {
                    if let Some(v) = vars.get_path(caps[1].trim()) {
                        return v.clone();
                    }
                }
            }
            let resolved = re.replace_all(s, |caps: &regex::Captures| match vars.get_path(caps[1].trim()) {
                Some(v) => text(v),
                None => caps[0].to_string(),
            });
            Value::String(resolved.into_owned())
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_placeholders(v, vars)).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_placeholders(v, vars))).collect()),
        v => v.clone(),
    }
}

/// Build a concrete definition from a template.
///
/// The result is wrapped in a synthetic start and end node and gets a fresh
/// `temp_<templateId>_<micros>` id, so concurrent materializations of the
/// same template never collide.
pub fn materialize(
    template: &WorkflowTemplate,
    params: &Vars,
) -> WorkflowDefinition {
    let id = format!("temp_{}_{}", template.id, monotonic_micros());

    let first = template.nodes.first().map(|n| n.id.as_str()).unwrap_or(END_NODE_ID);
    let mut nodes = vec![WorkflowNode::new(START_NODE_ID, START).with_transition(NodeTransition::to(first))];

    for tn in &template.nodes {
        let mut transitions = tn.transitions.clone();
        if transitions.is_empty() {
            transitions.push(NodeTransition::to(END_NODE_ID));
        }
        nodes.push(WorkflowNode {
            id: tn.id.clone(),
            name: tn.name.clone(),
            node_type: tn.node_type.clone(),
            description: tn.description.clone(),
            is_async: tn.is_async.unwrap_or(false),
            continue_on_error: tn.continue_on_error.unwrap_or(false),
            timeout: tn.timeout,
            config: substitute_placeholders(&tn.config, params),
            transitions,
        });
    }
    nodes.push(WorkflowNode::new(END_NODE_ID, END));

    WorkflowDefinition {
        id,
        name: template.name.clone(),
        description: template.description.clone(),
        category: template.category.clone(),
        nodes,
        config: template.config.clone(),
        start_node: Some(START_NODE_ID.to_string()),
    }
}
