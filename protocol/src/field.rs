//! Typed field declarations for the `X-Up-*` protocol.
//!
//! Every piece of metadata exchanged with the frontend is declared as a
//! field: a naming scheme plus a codec converting between wire strings and
//! typed values. Parsing is total, so a malformed header can never raise
//! into the request cycle.

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use tracing::error;

use crate::json;
use crate::json::JsonObject;

/// Prefix shared by all protocol headers.
pub const HEADER_PREFIX: &str = "X-Up-";

/// Prefix for params that carry protocol state across redirects.
pub const PARAM_PREFIX: &str = "_up_";

/// Naming scheme for one protocol field.
///
/// Header and param names are derived from the logical field name, with
/// per-side overrides for the few fields whose request and response headers
/// differ from the convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName {
    logical: &'static str,
    request_header: String,
    response_header: String,
    param: String,
}

impl FieldName {
    pub fn new(logical: &'static str) -> Self {
        let header = derive_header_name(logical);
        Self {
            logical,
            request_header: header.clone(),
            response_header: header,
            param: format!("{PARAM_PREFIX}{logical}"),
        }
    }

    /// Overrides the header consulted when reading this field from a request.
    pub fn with_request_header(mut self, name: impl Into<String>) -> Self {
        self.request_header = name.into();
        self
    }

    /// Overrides the header written when echoing this field to a response.
    pub fn with_response_header(mut self, name: impl Into<String>) -> Self {
        self.response_header = name.into();
        self
    }

    pub fn logical(&self) -> &str {
        self.logical
    }

    pub fn request_header(&self) -> &str {
        &self.request_header
    }

    pub fn response_header(&self) -> &str {
        &self.response_header
    }

    pub fn param(&self) -> &str {
        &self.param
    }
}

/// Derives the conventional header name for a logical field name.
///
/// ```
/// use unpoly_protocol::field::derive_header_name;
///
/// assert_eq!(derive_header_name("target"), "X-Up-Target");
/// assert_eq!(derive_header_name("fail_target"), "X-Up-Fail-Target");
/// ```
pub fn derive_header_name(logical: &str) -> String {
    let mut name = String::with_capacity(HEADER_PREFIX.len() + logical.len());
    name.push_str(HEADER_PREFIX);
    for (index, word) in logical.split('_').enumerate() {
        if index > 0 {
            name.push('-');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

/// Conversion between wire strings and typed values for one field.
pub trait Codec {
    type Value;

    fn name(&self) -> &FieldName;

    /// Parses a raw wire string. Total: malformed input is logged and
    /// replaced by the field's default instead of surfacing an error.
    fn parse(&self, raw: Option<&str>) -> Self::Value;

    /// Serializes a value back to its wire form.
    ///
    /// Absent or default values produce `None`, never an empty string,
    /// since app servers dislike blank header values.
    fn stringify(&self, value: &Self::Value) -> Option<String>;
}

/// Plain string field.
#[derive(Debug, Clone)]
pub struct StringField {
    name: FieldName,
}

impl StringField {
    pub fn new(name: FieldName) -> Self {
        Self { name }
    }
}

impl Codec for StringField {
    type Value = Option<String>;

    fn name(&self) -> &FieldName {
        &self.name
    }

    fn parse(&self, raw: Option<&str>) -> Option<String> {
        raw.map(str::to_owned)
    }

    fn stringify(&self, value: &Option<String>) -> Option<String> {
        value.clone()
    }
}

/// List field transported as separator-joined text, e.g. `foo bar baz`.
#[derive(Debug, Clone)]
pub struct SeparatedValuesField {
    name: FieldName,
    separator: &'static str,
}

impl SeparatedValuesField {
    pub fn new(name: FieldName) -> Self {
        Self { name, separator: " " }
    }
}

impl Codec for SeparatedValuesField {
    type Value = Option<Vec<String>>;

    fn name(&self) -> &FieldName {
        &self.name
    }

    fn parse(&self, raw: Option<&str>) -> Option<Vec<String>> {
        let raw = raw?;
        let values = if self.separator == " " {
            // Split on whitespace runs so stray padding never yields
            // empty list entries.
            raw.split_whitespace().map(str::to_owned).collect()
        } else {
            raw.split(self.separator).map(str::to_owned).collect()
        };
        Some(values)
    }

    fn stringify(&self, value: &Option<Vec<String>>) -> Option<String> {
        value.as_ref().map(|values| values.join(self.separator))
    }
}

/// Timestamp field transported as integer epoch seconds.
#[derive(Debug, Clone)]
pub struct TimeField {
    name: FieldName,
}

impl TimeField {
    pub fn new(name: FieldName) -> Self {
        Self { name }
    }
}

impl Codec for TimeField {
    type Value = Option<DateTime<Utc>>;

    fn name(&self) -> &FieldName {
        &self.name
    }

    fn parse(&self, raw: Option<&str>) -> Option<DateTime<Utc>> {
        let raw = raw.filter(|value| !json::is_blank_str(value))?;
        match raw.trim().parse::<i64>() {
            Ok(seconds) => {
                let time = DateTime::from_timestamp(seconds, 0);
                if time.is_none() {
                    error!("epoch seconds out of range in {} header", self.name.request_header());
                }
                time
            }
            Err(_) => {
                error!("ignoring malformed timestamp in {} header", self.name.request_header());
                None
            }
        }
    }

    fn stringify(&self, value: &Option<DateTime<Utc>>) -> Option<String> {
        value.as_ref().map(|time| time.timestamp().to_string())
    }
}

/// JSON object field.
///
/// Anything on the wire that is not a JSON object, whether malformed JSON
/// or a well-formed scalar, parses to the empty default.
#[derive(Debug, Clone)]
pub struct ObjectField {
    name: FieldName,
}

impl ObjectField {
    pub fn new(name: FieldName) -> Self {
        Self { name }
    }
}

impl Codec for ObjectField {
    type Value = JsonObject;

    fn name(&self) -> &FieldName {
        &self.name
    }

    fn parse(&self, raw: Option<&str>) -> JsonObject {
        let Some(raw) = raw.filter(|value| !json::is_blank_str(value)) else {
            return JsonObject::new();
        };
        match json::decode_lenient(raw) {
            Some(Value::Object(entries)) => entries,
            Some(_) => {
                error!("ignoring non-object value in {} header", self.name.request_header());
                JsonObject::new()
            }
            None => JsonObject::new(),
        }
    }

    fn stringify(&self, value: &JsonObject) -> Option<String> {
        if value.is_empty() {
            return None;
        }
        let encoded = serde_json::to_string(value).unwrap_or_else(|_| String::from("{}"));
        Some(json::escape_non_ascii(&encoded))
    }
}

/// JSON array field.
#[derive(Debug, Clone)]
pub struct ArrayField {
    name: FieldName,
}

impl ArrayField {
    pub fn new(name: FieldName) -> Self {
        Self { name }
    }
}

impl Codec for ArrayField {
    type Value = Vec<Value>;

    fn name(&self) -> &FieldName {
        &self.name
    }

    fn parse(&self, raw: Option<&str>) -> Vec<Value> {
        let Some(raw) = raw.filter(|value| !json::is_blank_str(value)) else {
            return Vec::new();
        };
        match json::decode_lenient(raw) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                error!("ignoring non-array value in {} header", self.name.request_header());
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn stringify(&self, value: &Vec<Value>) -> Option<String> {
        if value.is_empty() {
            return None;
        }
        let encoded = serde_json::to_string(value).unwrap_or_else(|_| String::from("[]"));
        Some(json::escape_non_ascii(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn derives_header_and_param_names_from_the_logical_name() {
        let name = FieldName::new("expire_cache");

        assert_eq!(name.request_header(), "X-Up-Expire-Cache");
        assert_eq!(name.response_header(), "X-Up-Expire-Cache");
        assert_eq!(name.param(), "_up_expire_cache");
    }

    #[test]
    fn header_overrides_only_touch_one_side() {
        let name = FieldName::new("validate_names").with_request_header("X-Up-Validate");

        assert_eq!(name.request_header(), "X-Up-Validate");
        assert_eq!(name.response_header(), "X-Up-Validate-Names");
        assert_eq!(name.param(), "_up_validate_names");
    }

    #[test]
    fn string_field_passes_values_through() {
        let field = StringField::new(FieldName::new("target"));

        assert_eq!(field.parse(Some(".content")), Some(".content".to_owned()));
        assert_eq!(field.parse(None), None);
        assert_eq!(field.stringify(&Some(".content".to_owned())), Some(".content".to_owned()));
        assert_eq!(field.stringify(&None), None);
    }

    #[test]
    fn separated_values_field_splits_on_whitespace_runs() {
        let field = SeparatedValuesField::new(FieldName::new("validate_names"));

        assert_eq!(
            field.parse(Some("email  password ")),
            Some(vec!["email".to_owned(), "password".to_owned()])
        );
        assert_eq!(field.parse(Some("")), Some(vec![]));
        assert_eq!(field.parse(None), None);
    }

    #[test]
    fn separated_values_field_joins_with_the_separator() {
        let field = SeparatedValuesField::new(FieldName::new("validate_names"));
        let value = Some(vec!["email".to_owned(), "password".to_owned()]);

        assert_eq!(field.stringify(&value), Some("email password".to_owned()));
        assert_eq!(field.stringify(&None), None);
    }

    #[test]
    fn time_field_parses_epoch_seconds() {
        let field = TimeField::new(FieldName::new("reload_from_time"));
        let parsed = field.parse(Some("1608730818"));

        assert_eq!(parsed.map(|time| time.timestamp()), Some(1608730818));
        assert_eq!(field.stringify(&parsed), Some("1608730818".to_owned()));
    }

    #[test]
    fn time_field_treats_garbage_as_absent() {
        let field = TimeField::new(FieldName::new("reload_from_time"));

        assert_eq!(field.parse(Some("yesterday")), None);
        assert_eq!(field.parse(Some("")), None);
        assert_eq!(field.parse(None), None);
    }

    #[test]
    fn object_field_parses_json_objects() {
        let field = ObjectField::new(FieldName::new("context"));
        let parsed = field.parse(Some("{\"lives\":3}"));

        assert_eq!(Value::Object(parsed), json!({"lives": 3}));
    }

    #[test]
    fn object_field_defaults_on_malformed_or_mistyped_values() {
        let field = ObjectField::new(FieldName::new("context"));

        assert!(field.parse(Some("{\"lives\":")).is_empty());
        assert!(field.parse(Some("[1,2,3]")).is_empty());
        assert!(field.parse(Some("\"scalar\"")).is_empty());
        assert!(field.parse(None).is_empty());
    }

    #[test]
    fn object_field_stringifies_with_escapes_and_skips_the_default() {
        let field = ObjectField::new(FieldName::new("context"));
        let value = field.parse(Some("{\"name\":\"Jürgen\"}"));

        assert_eq!(field.stringify(&value), Some("{\"name\":\"J\\u00fcrgen\"}".to_owned()));
        assert_eq!(field.stringify(&JsonObject::new()), None);
    }

    #[test]
    fn array_field_parses_json_arrays() {
        let field = ArrayField::new(FieldName::new("events"));
        let parsed = field.parse(Some("[{\"type\":\"my:event\"}]"));

        assert_eq!(Value::Array(parsed), json!([{"type": "my:event"}]));
    }

    #[test]
    fn array_field_defaults_on_malformed_or_mistyped_values() {
        let field = ArrayField::new(FieldName::new("events"));

        assert!(field.parse(Some("[1,")).is_empty());
        assert!(field.parse(Some("{\"type\":\"my:event\"}")).is_empty());
        assert!(field.parse(None).is_empty());
    }

    #[test]
    fn array_field_stringifies_compactly_and_skips_the_default() {
        let field = ArrayField::new(FieldName::new("events"));
        let value = field.parse(Some("[{\"type\": \"my:event\"}]"));

        assert_eq!(field.stringify(&value), Some("[{\"type\":\"my:event\"}]".to_owned()));
        assert_eq!(field.stringify(&Vec::new()), None);
    }
}
