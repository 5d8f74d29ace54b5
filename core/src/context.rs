//! Context access shared between the frontend and the server.

use std::cell::RefCell;

use serde_json::Value;
use unpoly_protocol::JsonObject;

/// View onto the frontend context of one layer, plus the pending changes
/// the server wants to send back.
///
/// The success and failure views wrap different input snapshots but share a
/// single change set, since the response can only update one context object
/// on the client.
#[derive(Debug)]
pub struct ContextView<'a> {
    input: &'a JsonObject,
    changes: &'a RefCell<JsonObject>,
}

impl<'a> ContextView<'a> {
    pub(crate) fn new(input: &'a JsonObject, changes: &'a RefCell<JsonObject>) -> Self {
        Self { input, changes }
    }

    /// Looks up a key, preferring pending changes over the input snapshot.
    ///
    /// A pending deletion reads as absent even while the input still has
    /// the key.
    pub fn get(&self, key: &str) -> Option<Value> {
        let changes = self.changes.borrow();
        if let Some(value) = changes.get(key) {
            if value.is_null() {
                return None;
            }
            return Some(value.clone());
        }
        self.input.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Stages a value to be sent to the frontend with this response.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.changes.borrow_mut().insert(key.into(), value);
    }

    /// Stages a deletion.
    ///
    /// Deletions reach the frontend as an explicit `null` entry so the
    /// client can drop the key from its copy.
    pub fn delete(&self, key: &str) {
        self.changes.borrow_mut().insert(key.to_owned(), Value::Null);
    }

    /// Mutates the effective value of a key in place and stages the result.
    ///
    /// The closure receives the current effective value, or `Null` when the
    /// key is absent.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut Value)) {
        let mut value = self.get(key).unwrap_or(Value::Null);
        f(&mut value);
        self.set(key, value);
    }

    /// Replaces the whole context with the given object.
    ///
    /// Input keys that are not part of the replacement are staged as
    /// deletions so the client forgets them.
    pub fn replace(&self, new_context: JsonObject) {
        let mut changes = self.changes.borrow_mut();
        changes.clear();
        for key in self.input.keys() {
            if !new_context.contains_key(key) {
                changes.insert(key.clone(), Value::Null);
            }
        }
        changes.extend(new_context);
    }

    /// The merged context the frontend will see after this response.
    pub fn to_object(&self) -> JsonObject {
        let mut merged = self.input.clone();
        for (key, value) in self.changes.borrow().iter() {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        match value {
            Value::Object(entries) => entries,
            _ => JsonObject::new(),
        }
    }

    #[test]
    fn reads_fall_back_to_the_input_snapshot() {
        let input = object(json!({"lives": 3}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        assert_eq!(context.get("lives"), Some(json!(3)));
        assert_eq!(context.get("score"), None);
        assert!(context.contains_key("lives"));
    }

    #[test]
    fn pending_changes_shadow_the_input() {
        let input = object(json!({"lives": 3}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.set("lives", json!(2));

        assert_eq!(context.get("lives"), Some(json!(2)));
    }

    #[test]
    fn a_deletion_reads_as_absent_and_stages_a_null() {
        let input = object(json!({"lives": 3}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.delete("lives");

        assert_eq!(context.get("lives"), None);
        assert!(!context.contains_key("lives"));
        assert_eq!(changes.borrow().get("lives"), Some(&Value::Null));
    }

    #[test]
    fn update_mutates_the_effective_value() {
        let input = object(json!({"tags": ["a"]}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.update("tags", |value| {
            if let Value::Array(items) = value {
                items.push(json!("b"));
            }
        });

        assert_eq!(context.get("tags"), Some(json!(["a", "b"])));
        assert_eq!(changes.borrow().get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn replace_nullifies_input_keys_missing_from_the_replacement() {
        let input = object(json!({"foo": "fooValue"}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.replace(object(json!({"bar": "barValue"})));

        assert_eq!(
            Value::Object(changes.borrow().clone()),
            json!({"foo": null, "bar": "barValue"})
        );
        assert_eq!(context.get("foo"), None);
        assert_eq!(context.get("bar"), Some(json!("barValue")));
    }

    #[test]
    fn replace_drops_earlier_staged_changes() {
        let input = object(json!({}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.set("stale", json!(1));
        context.replace(object(json!({"fresh": 2})));

        assert_eq!(Value::Object(changes.borrow().clone()), json!({"fresh": 2}));
    }

    #[test]
    fn to_object_merges_input_and_changes() {
        let input = object(json!({"lives": 3, "mode": "easy"}));
        let changes = RefCell::new(JsonObject::new());
        let context = ContextView::new(&input, &changes);

        context.set("lives", json!(2));
        context.delete("mode");
        context.set("score", json!(100));

        assert_eq!(
            Value::Object(context.to_object()),
            json!({"lives": 2, "score": 100})
        );
    }
}
