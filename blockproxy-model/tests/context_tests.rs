use blockproxy_model::{AvailableContexts, ContextDefinition, ContextMapping, ContextValue};
use pretty_assertions::assert_eq;
use serde_json::json;

fn node(id: u64) -> ContextValue {
    ContextValue::new("entity:node", json!({ "nid": id }))
}

// ── ContextDefinition ────────────────────────────────────────────

#[test]
fn definitions_are_required_by_default() {
    let def = ContextDefinition::new("node", "entity:node");
    assert!(def.required);
    assert!(!def.clone().optional().required);
}

#[test]
fn display_label_falls_back_to_name() {
    let def = ContextDefinition::new("node", "entity:node");
    assert_eq!(def.display_label(), "node");
    assert_eq!(def.with_label("Content").display_label(), "Content");
}

#[test]
fn exact_type_is_accepted() {
    let def = ContextDefinition::new("node", "entity:node");
    assert!(def.accepts(&node(1)));
}

#[test]
fn parent_type_accepts_subtypes() {
    let def = ContextDefinition::new("entity", "entity");
    assert!(def.accepts_type("entity:node"));
    assert!(def.accepts_type("entity:user"));
    assert!(!def.accepts_type("entityx"));
}

#[test]
fn subtype_does_not_accept_parent() {
    let def = ContextDefinition::new("node", "entity:node");
    assert!(!def.accepts_type("entity"));
    assert!(!def.accepts_type("entity:user"));
}

#[test]
fn any_accepts_everything() {
    let def = ContextDefinition::new("anything", "any");
    assert!(def.accepts_type("string"));
    assert!(def.accepts_type("entity:node"));
}

#[test]
fn definition_json_defaults() {
    let def: ContextDefinition =
        serde_json::from_value(json!({"name": "view_mode", "data_type": "string"})).unwrap();
    assert!(def.required);
    assert!(def.label.is_none());
}

// ── AvailableContexts ────────────────────────────────────────────

#[test]
fn available_contexts_keep_insertion_order() {
    let contexts = AvailableContexts::new()
        .with("b", node(2))
        .with("a", node(1))
        .with("c", node(3));
    let ids: Vec<&str> = contexts.ids().collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[test]
fn reinsert_replaces_in_place() {
    let contexts = AvailableContexts::new()
        .with("a", node(1))
        .with("b", node(2))
        .with("a", node(9));
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts.ids().next(), Some("a"));
    assert_eq!(contexts.get("a").unwrap().value, json!({"nid": 9}));
}

#[test]
fn null_value_has_no_value() {
    assert!(!ContextValue::new("string", serde_json::Value::Null).has_value());
    assert!(ContextValue::new("string", json!("default")).has_value());
}

// ── ContextMapping ───────────────────────────────────────────────

#[test]
fn mapping_serializes_as_plain_object() {
    let mapping = ContextMapping::new().with("node", "@node.route:node");
    assert_eq!(serde_json::to_value(&mapping).unwrap(), json!({"node": "@node.route:node"}));
}

#[test]
fn without_blank_drops_unselected_slots() {
    let mapping = ContextMapping::new()
        .with("node", "@node.route:node")
        .with("user", "")
        .with("term", "  ")
        .without_blank();
    assert_eq!(mapping.len(), 1);
    assert!(mapping.contains("node"));
}
