//! Inspection and control of frontend layers.

use serde_json::Value;
use unpoly_protocol::JsonObject;
use unpoly_protocol::json;

use crate::change::Change;
use crate::context::ContextView;
use crate::error::Error;
use crate::error::Result;

const ACCEPT_LAYER_HEADER: &str = "X-Up-Accept-Layer";
const DISMISS_LAYER_HEADER: &str = "X-Up-Dismiss-Layer";
const OPEN_LAYER_HEADER: &str = "X-Up-Open-Layer";

/// The frontend layer a response is rendered into.
///
/// Requests that do not reveal a mode are treated as updating the root
/// layer.
#[derive(Debug)]
pub struct Layer<'a> {
    change: &'a Change,
    mode: String,
    context: ContextView<'a>,
}

impl<'a> Layer<'a> {
    pub(crate) fn new(change: &'a Change, mode: Option<&str>, context: ContextView<'a>) -> Self {
        let mode = mode.filter(|mode| !json::is_blank_str(mode)).unwrap_or("root");
        Self {
            change,
            mode: mode.to_owned(),
            context,
        }
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn is_root(&self) -> bool {
        self.mode == "root"
    }

    pub fn is_overlay(&self) -> bool {
        !self.is_root()
    }

    /// The context of this layer.
    pub fn context(&self) -> &ContextView<'a> {
        &self.context
    }

    /// Emits a frontend event bound to this layer.
    pub fn emit(&self, event_type: &str, props: JsonObject) {
        let mut props = props;
        props.insert("layer".to_owned(), Value::String("current".to_owned()));
        self.change.emit(event_type, props);
    }

    /// Accepts the overlay, closing it with the given result value.
    ///
    /// Fails on the root layer, which cannot be closed.
    pub fn accept(&self, value: Option<Value>) -> Result<()> {
        if self.is_root() {
            return Err(Error::CannotAcceptRootLayer);
        }
        let encoded = json::encode_ascii(&value.unwrap_or(Value::Null));
        self.change.set_response_header(ACCEPT_LAYER_HEADER, encoded);
        Ok(())
    }

    /// Dismisses the overlay with the given result value.
    ///
    /// Fails on the root layer, which cannot be closed.
    pub fn dismiss(&self, value: Option<Value>) -> Result<()> {
        if self.is_root() {
            return Err(Error::CannotDismissRootLayer);
        }
        let encoded = json::encode_ascii(&value.unwrap_or(Value::Null));
        self.change.set_response_header(DISMISS_LAYER_HEADER, encoded);
        Ok(())
    }

    /// Instructs the frontend to open a new overlay when it processes this
    /// response.
    pub fn open(&self, options: JsonObject) {
        let encoded = json::encode_ascii(&Value::Object(options));
        self.change.set_response_header(OPEN_LAYER_HEADER, encoded);
    }
}
