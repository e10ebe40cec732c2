//! Schema-driven plan computation.
//!
//! Plans are diffed attribute by attribute against the resource schema.
//! A missing key and an explicit `null` are the same thing, so state written
//! back by the provider (which spells out every optional field) compares
//! equal to a config that leaves those fields out.

use serde_json::{Map, Value};

use crate::schema::{Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan the move from `prior` to `proposed`.
///
/// - No prior state: a create. Defaults are filled in and every configured
///   value is reported as added. Computed attributes stay null (unknown).
/// - Null `proposed`: a delete. Every prior value is reported as removed.
/// - Otherwise: an update. Unconfigured computed attributes are carried over
///   from `prior`. A change to a `force_new` attribute, or `replace_hint`,
///   requires replacement, in which case computed attributes become unknown.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
    replace_hint: bool,
) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    match (prior, proposed.is_null()) {
        (None, true) => PlanResult::no_change(Value::Null),
        (Some(prior), true) => plan_delete(prior),
        (None, false) => plan_create(schema, proposed),
        (Some(prior), false) => plan_update(schema, prior, proposed, replace_hint),
    }
}

fn plan_create(schema: &Schema, proposed: &Value) -> PlanResult {
    let planned = with_defaults(&schema.block, proposed);
    let mut changes = Vec::new();

    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        if let Some(value) = non_null(planned.get(name)) {
            changes.push(AttributeChange::added(name.as_str(), value.clone()));
        }
    }
    for name in schema.block.blocks.keys() {
        if let Some(value) = non_null(planned.get(name)) {
            changes.push(AttributeChange::added(name.as_str(), strip_nulls(value)));
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn plan_delete(prior: &Value) -> PlanResult {
    let changes = prior
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| AttributeChange::removed(k.as_str(), v.clone()))
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, proposed: &Value, replace_hint: bool) -> PlanResult {
    let mut planned = with_defaults(&schema.block, proposed);
    let mut changes = Vec::new();
    let mut requires_replace = replace_hint;

    diff_block(
        &schema.block,
        prior,
        &Value::Object(planned.clone()),
        "",
        &mut changes,
        &mut requires_replace,
    );

    for (name, attr) in &schema.block.attributes {
        if !attr.flags.computed {
            continue;
        }
        let configured = !attr.flags.is_computed_only() && non_null(planned.get(name)).is_some();
        if configured {
            continue;
        }
        let carried = if requires_replace && attr.flags.is_computed_only() {
            Value::Null
        } else {
            prior.get(name).cloned().unwrap_or(Value::Null)
        };
        planned.insert(name.clone(), carried);
    }

    if changes.is_empty() && !requires_replace {
        return PlanResult::no_change(Value::Object(planned));
    }
    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn diff_block(
    block: &Block,
    prior: &Value,
    planned: &Value,
    path: &str,
    changes: &mut Vec<AttributeChange>,
    requires_replace: &mut bool,
) {
    for (name, attr) in &block.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        let before = non_null(prior.get(name));
        let after = non_null(planned.get(name));
        // An unset optional+computed attribute keeps whatever the server chose.
        if attr.flags.computed && after.is_none() {
            continue;
        }
        if let Some(change) = compare(&join(path, name), before, after) {
            *requires_replace |= attr.force_new;
            changes.push(change);
        }
    }

    for (name, nested) in &block.blocks {
        let block_path = join(path, name);
        let before = non_null(prior.get(name));
        let after = non_null(planned.get(name));
        match (nested.nesting_mode, before, after) {
            (BlockNestingMode::Single, Some(b), Some(a)) if b.is_object() && a.is_object() => {
                diff_block(&nested.block, b, a, &block_path, changes, requires_replace);
            }
            _ => {
                if let Some(change) = compare(&block_path, before, after) {
                    if block_has_force_new(&nested.block) {
                        *requires_replace = true;
                    }
                    changes.push(change);
                }
            }
        }
    }
}

fn compare(path: &str, before: Option<&Value>, after: Option<&Value>) -> Option<AttributeChange> {
    match (before, after) {
        (None, None) => None,
        (None, Some(a)) => Some(AttributeChange::added(path, strip_nulls(a))),
        (Some(b), None) => Some(AttributeChange::removed(path, strip_nulls(b))),
        (Some(b), Some(a)) => {
            let (b, a) = (strip_nulls(b), strip_nulls(a));
            (b != a).then(|| AttributeChange::modified(path, b, a))
        }
    }
}

fn block_has_force_new(block: &Block) -> bool {
    block.attributes.values().any(|a| a.force_new)
        || block.blocks.values().any(|n| block_has_force_new(&n.block))
}

fn with_defaults(block: &Block, proposed: &Value) -> Map<String, Value> {
    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if non_null(planned.get(name)).is_none() {
                planned.insert(name.clone(), default.clone());
            }
        }
        if attr.flags.is_computed_only() {
            planned.entry(name.clone()).or_insert(Value::Null);
        }
    }
    planned
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Drop null-valued object keys, recursively.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    fn store_schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("owner", Attribute::optional_computed_string().with_force_new())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("role", Attribute::optional_string().with_default(json!("sysadmin")))
            .with_block(
                "kafka",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("uris", Attribute::required_string())
                        .with_attribute("sasl_password", Attribute::optional_string().sensitive()),
                ),
            )
    }

    fn prior() -> Value {
        json!({
            "name": "kafka_main",
            "owner": "sysadmin",
            "state": "ready",
            "role": "sysadmin",
            "kafka": {"uris": "b1:9092", "sasl_password": null}
        })
    }

    #[test]
    fn test_create_fills_defaults_and_unknowns() {
        let plan = plan_resource(
            &store_schema(),
            None,
            &json!({"name": "kafka_main", "kafka": {"uris": "b1:9092"}}),
            false,
        );

        assert_eq!(plan.planned_state["role"], "sysadmin");
        assert!(plan.planned_state["state"].is_null());
        assert!(plan.changes_attribute("name"));
        assert!(plan.changes_attribute("role"));
        assert!(plan.changes_attribute("kafka"));
        assert!(!plan.changes_attribute("state"));
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_update_without_changes_carries_computed() {
        let plan = plan_resource(
            &store_schema(),
            Some(&prior()),
            &json!({"name": "kafka_main", "kafka": {"uris": "b1:9092"}}),
            false,
        );

        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state["state"], "ready");
        assert_eq!(plan.planned_state["owner"], "sysadmin");
    }

    #[test]
    fn test_update_nested_change_in_place() {
        let plan = plan_resource(
            &store_schema(),
            Some(&prior()),
            &json!({"name": "kafka_main", "kafka": {"uris": "b2:9092"}}),
            false,
        );

        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "kafka.uris");
        assert_eq!(plan.changes[0].before, Some(json!("b1:9092")));
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["state"], "ready");
    }

    #[test]
    fn test_force_new_change_requires_replace() {
        let plan = plan_resource(
            &store_schema(),
            Some(&prior()),
            &json!({"name": "kafka_other", "kafka": {"uris": "b1:9092"}}),
            false,
        );

        assert!(plan.requires_replace);
        assert!(plan.changes_attribute("name"));
        assert!(plan.planned_state["state"].is_null());
    }

    #[test]
    fn test_replace_hint() {
        let plan = plan_resource(
            &store_schema(),
            Some(&prior()),
            &json!({"name": "kafka_main", "kafka": {"uris": "b1:9092"}}),
            true,
        );
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_block_removed() {
        let plan = plan_resource(&store_schema(), Some(&prior()), &json!({"name": "kafka_main"}), false);
        assert!(plan.changes_attribute("kafka"));
        assert_eq!(plan.changes[0].after, None);
        assert_eq!(plan.changes[0].before, Some(json!({"uris": "b1:9092"})));
    }

    #[test]
    fn test_delete() {
        let plan = plan_resource(&store_schema(), Some(&prior()), &Value::Null, false);
        assert!(plan.planned_state.is_null());
        assert!(plan.changes_attribute("name"));
        assert!(plan.changes_attribute("kafka"));
        assert!(!plan.requires_replace);
    }
}
