//! The per-request change object.
//!
//! A [`Change`] wraps one request/response cycle. It parses the protocol
//! fields the frontend sent, lets the application inspect and override
//! them, and finally produces the headers the response must carry.
//!
//! All state lives in cells, so the change hands out any number of views
//! (layers, contexts, cache) that write back to the same request. The
//! object belongs to a single request cycle and is not `Sync`.

use std::cell::Cell;
use std::cell::OnceCell;
use std::cell::RefCell;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;
use unpoly_protocol::HeaderMap;
use unpoly_protocol::JsonObject;
use unpoly_protocol::field::ArrayField;
use unpoly_protocol::field::Codec;
use unpoly_protocol::field::FieldName;
use unpoly_protocol::field::ObjectField;
use unpoly_protocol::field::SeparatedValuesField;
use unpoly_protocol::field::StringField;
use unpoly_protocol::field::TimeField;
use unpoly_protocol::json;
use unpoly_protocol::query;

use crate::cache::Cache;
use crate::context::ContextView;
use crate::layer::Layer;
use crate::request::Config;
use crate::request::Request;
use crate::response::MethodCookie;
use crate::response::ResponseUpdate;
use crate::target;

const TITLE_HEADER: &str = "X-Up-Title";
const LOCATION_HEADER: &str = "X-Up-Location";
const METHOD_HEADER: &str = "X-Up-Method";
const IF_MODIFIED_SINCE_HEADER: &str = "If-Modified-Since";
const VARY_HEADER: &str = "Vary";

/// The declared protocol fields.
#[derive(Debug)]
struct Fields {
    version: StringField,
    target: StringField,
    fail_target: StringField,
    validate_names: SeparatedValuesField,
    mode: StringField,
    fail_mode: StringField,
    input_context: ObjectField,
    input_fail_context: ObjectField,
    context_changes: ObjectField,
    events: ArrayField,
    expire_cache: StringField,
    evict_cache: StringField,
    reload_from_time: TimeField,
}

impl Fields {
    fn declare() -> Self {
        Self {
            version: StringField::new(FieldName::new("version")),
            target: StringField::new(FieldName::new("target")),
            fail_target: StringField::new(FieldName::new("fail_target")),
            validate_names: SeparatedValuesField::new(
                FieldName::new("validate_names").with_request_header("X-Up-Validate"),
            ),
            mode: StringField::new(FieldName::new("mode")),
            fail_mode: StringField::new(FieldName::new("fail_mode")),
            input_context: ObjectField::new(FieldName::new("context")),
            input_fail_context: ObjectField::new(FieldName::new("fail_context")),
            context_changes: ObjectField::new(
                FieldName::new("context_changes").with_response_header("X-Up-Context"),
            ),
            events: ArrayField::new(FieldName::new("events")),
            expire_cache: StringField::new(FieldName::new("expire_cache")),
            evict_cache: StringField::new(FieldName::new("evict_cache")),
            reload_from_time: TimeField::new(FieldName::new("reload_from_time")),
        }
    }
}

/// Inspects one request for fragment-update concerns and accumulates the
/// response metadata to send back.
///
/// Field values are parsed lazily and memoized on first access. Reading a
/// field from a request header records that header in the response `Vary`
/// set, so caches know the response depends on it.
#[derive(Debug)]
pub struct Change {
    request: Request,
    config: Config,
    fields: Fields,

    response_headers: RefCell<HeaderMap>,
    status: Cell<Option<u16>>,
    vary: Cell<bool>,

    version: OnceCell<Option<String>>,
    server_target: RefCell<Option<String>>,
    target_from_request: OnceCell<Option<String>>,
    fail_target_from_request: OnceCell<Option<String>>,
    validate_names: OnceCell<Option<Vec<String>>>,
    mode: OnceCell<Option<String>>,
    fail_mode: OnceCell<Option<String>>,
    input_context: OnceCell<JsonObject>,
    input_fail_context: OnceCell<JsonObject>,
    context_changes: OnceCell<RefCell<JsonObject>>,
    events: OnceCell<RefCell<Vec<Value>>>,
    expire_cache_override: RefCell<Option<String>>,
    evict_cache_override: RefCell<Option<String>>,
    reload_from_time: OnceCell<Option<DateTime<Utc>>>,
}

impl Change {
    pub fn new(request: Request) -> Self {
        Self::with_config(request, Config::default())
    }

    pub fn with_config(request: Request, config: Config) -> Self {
        Self {
            request,
            config,
            fields: Fields::declare(),
            response_headers: RefCell::new(HeaderMap::new()),
            status: Cell::new(None),
            vary: Cell::new(true),
            version: OnceCell::new(),
            server_target: RefCell::new(None),
            target_from_request: OnceCell::new(),
            fail_target_from_request: OnceCell::new(),
            validate_names: OnceCell::new(),
            mode: OnceCell::new(),
            fail_mode: OnceCell::new(),
            input_context: OnceCell::new(),
            input_fail_context: OnceCell::new(),
            context_changes: OnceCell::new(),
            events: OnceCell::new(),
            expire_cache_override: RefCell::new(None),
            evict_cache_override: RefCell::new(None),
            reload_from_time: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns whether the current request was made by the frontend.
    ///
    /// Checks the version header first and falls back to the target header
    /// for older frontends that did not send a version yet.
    pub fn is_unpoly(&self) -> bool {
        present(self.version()) || present(self.target().as_deref())
    }

    /// The version of the frontend library that made the request.
    pub fn version(&self) -> Option<&str> {
        self.version
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.version.name());
                self.fields.version.parse(raw.as_deref())
            })
            .as_deref()
    }

    /// The CSS selector the frontend will update with a successful
    /// response.
    ///
    /// Server-side code is free to only render HTML that matches this
    /// selector.
    pub fn target(&self) -> Option<String> {
        if let Some(server_target) = self.server_target.borrow().as_ref() {
            return Some(server_target.clone());
        }
        self.target_from_request().map(str::to_owned)
    }

    /// Overrides the target for this response.
    ///
    /// The frontend will update the new target instead of the one it asked
    /// for. The override also applies to failed responses and survives a
    /// redirect.
    pub fn set_target(&self, new_target: impl Into<String>) {
        *self.server_target.borrow_mut() = Some(new_target.into());
    }

    /// Returns whether the target differs from what the frontend asked for
    /// in its request header.
    pub fn target_changed(&self) -> bool {
        self.target() != self.target_from_request_headers()
    }

    /// The CSS selector the frontend will update with a failed response,
    /// like a form submission with validation errors.
    pub fn fail_target(&self) -> Option<String> {
        if let Some(server_target) = self.server_target.borrow().as_ref() {
            return Some(server_target.clone());
        }
        self.fail_target_from_request().map(str::to_owned)
    }

    /// Returns whether the given CSS selector is targeted by a successful
    /// response.
    ///
    /// The matching is simplistic and does not know the page layout. It
    /// reports `true` on an exact match, for the targets `html` and `body`
    /// (except head metadata for `body`), and always when the request was
    /// not made by the frontend or did not reveal its target.
    pub fn is_target(&self, tested_target: &str) -> bool {
        self.test_frontend_target(self.target(), tested_target)
    }

    /// Like [`is_target`](Self::is_target), for failed responses.
    pub fn is_fail_target(&self, tested_target: &str) -> bool {
        self.test_frontend_target(self.fail_target(), tested_target)
    }

    /// Returns whether the given CSS selector is targeted by either a
    /// successful or a failed response.
    pub fn is_any_target(&self, tested_target: &str) -> bool {
        self.is_target(tested_target) || self.is_fail_target(tested_target)
    }

    /// Tells the frontend not to render anything and answers with an empty
    /// 204 response.
    pub fn render_nothing(&self) {
        self.warn_deprecated("render_nothing is deprecated; respond with 204 No Content instead");
        self.set_target(":none");
        self.status.set(Some(204));
    }

    /// The name attributes of the form fields that triggered this
    /// validation request.
    ///
    /// Multiple validating fields may be batched into a single request.
    pub fn validate_names(&self) -> Option<&[String]> {
        self.validate_names
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.validate_names.name());
                self.fields.validate_names.parse(raw.as_deref())
            })
            .as_deref()
    }

    /// Returns whether the request is a form validation that must not
    /// change state on the server.
    pub fn is_validating(&self) -> bool {
        self.validate_names().is_some_and(|names| !names.is_empty())
    }

    /// The first validating field name.
    pub fn validate_name(&self) -> Option<&str> {
        self.validate_names()
            .and_then(|names| names.first())
            .map(String::as_str)
    }

    /// Returns whether the given field name is among the validating fields.
    pub fn is_validate_name(&self, name: &str) -> bool {
        self.validate_names()
            .is_some_and(|names| names.iter().any(|candidate| candidate == name))
    }

    /// The mode of the layer a successful response will update.
    pub fn mode(&self) -> Option<&str> {
        self.mode
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.mode.name());
                self.fields.mode.parse(raw.as_deref())
            })
            .as_deref()
    }

    /// The mode of the layer a failed response will update.
    pub fn fail_mode(&self) -> Option<&str> {
        self.fail_mode
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.fail_mode.name());
                self.fields.fail_mode.parse(raw.as_deref())
            })
            .as_deref()
    }

    /// The layer a successful response will update.
    pub fn layer(&self) -> Layer<'_> {
        Layer::new(self, self.mode(), self.context())
    }

    /// The layer a failed response will update.
    pub fn fail_layer(&self) -> Layer<'_> {
        Layer::new(self, self.fail_mode(), self.fail_context())
    }

    /// Context view for a successful response.
    pub fn context(&self) -> ContextView<'_> {
        ContextView::new(self.input_context(), self.context_changes_cell())
    }

    /// Context view for a failed response.
    ///
    /// Shares its pending changes with [`context`](Self::context), since
    /// only one of the two responses will ever reach the frontend.
    pub fn fail_context(&self) -> ContextView<'_> {
        ContextView::new(self.input_fail_context(), self.context_changes_cell())
    }

    /// Emits a frontend event when the response is processed.
    ///
    /// Props become event properties. The `type` property is set from
    /// `event_type` and overrides an entry of the same name.
    pub fn emit(&self, event_type: &str, props: JsonObject) {
        let mut event_plan = props;
        event_plan.insert("type".to_owned(), Value::String(event_type.to_owned()));
        self.events_cell().borrow_mut().push(Value::Object(event_plan));
    }

    /// Commands for the frontend cache.
    pub fn cache(&self) -> Cache<'_> {
        Cache::new(self)
    }

    /// Forces the frontend to use the given document title when processing
    /// this response.
    ///
    /// Useful when a fragment response skips rendering the `<head>`.
    pub fn set_title(&self, title: &str) {
        // Belongs to this response only, so it is not a field and will not
        // survive a redirect.
        let encoded = json::encode_ascii(&Value::String(title.to_owned()));
        self.set_response_header(TITLE_HEADER, encoded);
    }

    /// The modification time of the fragment the frontend wants to reload.
    ///
    /// Taken from the dedicated header, falling back to
    /// `If-Modified-Since`.
    pub fn reload_from_time(&self) -> Option<DateTime<Utc>> {
        self.warn_deprecated("reload_from_time is deprecated; use conditional GETs instead");
        self.reload_from_time_value()
    }

    /// Returns whether the request polls an existing fragment for changes.
    pub fn is_reload(&self) -> bool {
        self.warn_deprecated("is_reload is deprecated; use conditional GETs instead");
        self.reload_from_time_value().is_some()
    }

    /// Prefixes a JavaScript snippet with the current CSP nonce so the
    /// frontend may run it as a callback.
    pub fn safe_callback(&self, code: &str) -> String {
        match self.request.csp_nonce.as_deref().filter(|nonce| !json::is_blank_str(nonce)) {
            Some(nonce) => format!("nonce-{nonce} {code}"),
            None => code.to_owned(),
        }
    }

    /// Returns whether field reads from request headers are recorded in
    /// the response `Vary` header.
    pub fn vary(&self) -> bool {
        self.vary.get()
    }

    pub fn set_vary(&self, vary: bool) {
        self.vary.set(vary);
    }

    /// Runs the given closure without recording header accesses in `Vary`.
    ///
    /// Meant for reads that only inform server-side decisions and never
    /// change the rendered response.
    pub fn no_vary<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.vary.get();
        self.vary.set(false);
        let result = f();
        self.vary.set(previous);
        result
    }

    /// Reads a header already staged for the response.
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.response_headers.borrow().get(name).map(str::to_owned)
    }

    /// Stages an arbitrary header for the response.
    pub fn set_response_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.borrow_mut().set(name, value);
    }

    /// Appends the request's outgoing protocol state to a URL, letting the
    /// state survive a redirect to that URL.
    ///
    /// Request-derived fields are not appended: the browser resends their
    /// headers with the next request anyway.
    pub fn url_with_field_values(&self, url: &str) -> String {
        let params = self.no_vary(|| self.fields_as_params());
        query::append_params(url, &params)
    }

    /// The request URL without transport params, suitable as a history URL
    /// on the frontend.
    pub fn request_url_without_up_params(&self) -> String {
        query::url_without_protocol_params(&self.request.url)
    }

    /// Finishes the request cycle.
    ///
    /// Returns everything the host adapter must apply to its response.
    /// Runs after the application handler, so the write phase does not
    /// record its own reads in `Vary`.
    pub fn finalize(self) -> ResponseUpdate {
        let method_cookie = self.no_vary(|| {
            self.write_echo_headers();
            self.write_field_headers();
            self.method_cookie_action()
        });
        let status = self.status.get();
        ResponseUpdate {
            headers: self.response_headers.into_inner(),
            status,
            method_cookie,
        }
    }

    pub(crate) fn set_expire_cache(&self, pattern: &str) {
        *self.expire_cache_override.borrow_mut() = Some(pattern.to_owned());
    }

    pub(crate) fn set_evict_cache(&self, pattern: &str) {
        *self.evict_cache_override.borrow_mut() = Some(pattern.to_owned());
    }

    pub(crate) fn warn_deprecated(&self, message: &str) {
        if !self.config.silence_deprecations {
            warn!("{message}");
        }
    }

    fn target_from_request(&self) -> Option<&str> {
        self.target_from_request
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.target.name());
                self.fields.target.parse(raw.as_deref())
            })
            .as_deref()
    }

    fn target_from_request_headers(&self) -> Option<String> {
        let raw = self.raw_from_headers(self.fields.target.name());
        self.fields.target.parse(raw.as_deref())
    }

    fn fail_target_from_request(&self) -> Option<&str> {
        self.fail_target_from_request
            .get_or_init(|| {
                let raw = self.raw_from_request(self.fields.fail_target.name());
                self.fields.fail_target.parse(raw.as_deref())
            })
            .as_deref()
    }

    fn test_frontend_target(&self, frontend_target: Option<String>, tested_target: &str) -> bool {
        // The frontend may choose not to reveal its target for better
        // cacheability. Without a target, any selector could be updated.
        match frontend_target {
            Some(frontend_target) if self.is_unpoly() && !json::is_blank_str(&frontend_target) => {
                target::test_target(&frontend_target, tested_target)
            }
            _ => true,
        }
    }

    fn input_context(&self) -> &JsonObject {
        self.input_context.get_or_init(|| {
            let raw = self.raw_from_request(self.fields.input_context.name());
            self.fields.input_context.parse(raw.as_deref())
        })
    }

    fn input_fail_context(&self) -> &JsonObject {
        self.input_fail_context.get_or_init(|| {
            let raw = self.raw_from_request(self.fields.input_fail_context.name());
            self.fields.input_fail_context.parse(raw.as_deref())
        })
    }

    fn context_changes_cell(&self) -> &RefCell<JsonObject> {
        // Changes are outgoing only, but may arrive as a param when an
        // earlier response in a redirect chain already staged some.
        self.context_changes.get_or_init(|| {
            let raw = self.raw_from_params(self.fields.context_changes.name());
            RefCell::new(self.fields.context_changes.parse(raw.as_deref()))
        })
    }

    fn context_changes_object(&self) -> JsonObject {
        self.context_changes_cell().borrow().clone()
    }

    fn events_cell(&self) -> &RefCell<Vec<Value>> {
        // Events are outgoing only. They are never read from a request
        // header, but may arrive as a param after a redirect.
        self.events.get_or_init(|| {
            let raw = self.raw_from_params(self.fields.events.name());
            RefCell::new(self.fields.events.parse(raw.as_deref()))
        })
    }

    fn expire_cache(&self) -> Option<String> {
        if let Some(pattern) = self.expire_cache_override.borrow().as_ref() {
            return Some(pattern.clone());
        }
        let raw = self.raw_from_params(self.fields.expire_cache.name());
        self.fields.expire_cache.parse(raw.as_deref())
    }

    fn evict_cache(&self) -> Option<String> {
        if let Some(pattern) = self.evict_cache_override.borrow().as_ref() {
            return Some(pattern.clone());
        }
        let raw = self.raw_from_params(self.fields.evict_cache.name());
        self.fields.evict_cache.parse(raw.as_deref())
    }

    fn reload_from_time_value(&self) -> Option<DateTime<Utc>> {
        *self.reload_from_time.get_or_init(|| {
            let from_field = {
                let raw = self.raw_from_request(self.fields.reload_from_time.name());
                self.fields.reload_from_time.parse(raw.as_deref())
            };
            from_field.or_else(|| self.if_modified_since())
        })
    }

    fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        let header = self.request.headers.get(IF_MODIFIED_SINCE_HEADER)?;
        match DateTime::parse_from_rfc2822(header) {
            Ok(time) => Some(time.with_timezone(&Utc)),
            Err(_) => {
                warn!("ignoring unparseable If-Modified-Since header");
                None
            }
        }
    }

    /// Reads a field's raw value from the request headers, recording the
    /// header in the response `Vary` set.
    fn raw_from_headers(&self, name: &FieldName) -> Option<String> {
        let value = self.request.headers.get(name.request_header()).map(str::to_owned);
        self.request_header_accessed(name.request_header());
        value
    }

    fn raw_from_params(&self, name: &FieldName) -> Option<String> {
        self.request.params.get(name.param()).map(str::to_owned)
    }

    /// Params win over headers so values can survive a redirect.
    fn raw_from_request(&self, name: &FieldName) -> Option<String> {
        self.raw_from_params(name).or_else(|| self.raw_from_headers(name))
    }

    fn request_header_accessed(&self, header_name: &str) {
        if !self.vary.get() {
            return;
        }
        let mut headers = self.response_headers.borrow_mut();
        let mut varies: Vec<String> = headers
            .get(VARY_HEADER)
            .map(|value| {
                value
                    .split(',')
                    .map(|part| part.trim().to_owned())
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if varies.iter().any(|existing| existing.eq_ignore_ascii_case(header_name)) {
            return;
        }
        varies.push(header_name.to_owned());
        headers.set(VARY_HEADER, varies.join(", "));
    }

    // The frontend cannot see the final URL or method of a redirected
    // request, so both are echoed in headers.
    fn write_echo_headers(&self) {
        let url = self.request_url_without_up_params();
        if url != self.request.url {
            self.set_response_header(LOCATION_HEADER, url);
        }
        self.set_response_header(METHOD_HEADER, self.request.method.as_str());
    }

    fn write_field_headers(&self) {
        {
            let events = self.events_cell().borrow();
            if !events.is_empty() {
                self.write_field_header(&self.fields.events, &*events);
            }
        }

        if let Some(pattern) = self.expire_cache() {
            self.write_field_header(&self.fields.expire_cache, &Some(pattern));
        }
        if let Some(pattern) = self.evict_cache() {
            self.write_field_header(&self.fields.evict_cache, &Some(pattern));
        }

        let context_changes = self.context_changes_object();
        if !context_changes.is_empty() {
            self.write_field_header(&self.fields.context_changes, &context_changes);
        }

        if self.target_changed() {
            // Only echo a target the server actually changed. The client
            // may have asked with a more abstract target like `:main` that
            // must not be overridden with an echo of the first match.
            self.write_field_header(&self.fields.target, &self.target());
        }
    }

    fn write_field_header<C: Codec>(&self, field: &C, value: &C::Value) {
        let Some(stringified) = field.stringify(value) else {
            return;
        };
        if json::is_blank_str(&stringified) {
            // App servers dislike blank header values.
            return;
        }
        self.set_response_header(field.name().response_header(), stringified);
    }

    /// Serializes the outgoing-only state as params.
    fn fields_as_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if self.target_changed() {
            self.push_param(&mut params, &self.fields.target, &self.target());
        }

        let context_changes = self.context_changes_object();
        if !context_changes.is_empty() {
            self.push_param(&mut params, &self.fields.context_changes, &context_changes);
        }

        {
            let events = self.events_cell().borrow();
            if !events.is_empty() {
                self.push_param(&mut params, &self.fields.events, &*events);
            }
        }

        if let Some(pattern) = self.expire_cache() {
            self.push_param(&mut params, &self.fields.expire_cache, &Some(pattern));
        }
        if let Some(pattern) = self.evict_cache() {
            self.push_param(&mut params, &self.fields.evict_cache, &Some(pattern));
        }

        params
    }

    fn push_param<C: Codec>(&self, params: &mut Vec<(String, String)>, field: &C, value: &C::Value) {
        let Some(stringified) = field.stringify(value) else {
            return;
        };
        if json::is_blank_str(&stringified) {
            return;
        }
        params.push((field.name().param().to_owned(), stringified));
    }

    // A non-GET request that was not made by the frontend may still end in
    // a redirect that the frontend has to classify later. The cookie
    // carries the original method to that next request.
    fn method_cookie_action(&self) -> MethodCookie {
        if !self.request.method.eq_ignore_ascii_case("GET") && !self.is_unpoly() {
            MethodCookie::Set(self.request.method.clone())
        } else {
            MethodCookie::Delete
        }
    }
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|value| !json::is_blank_str(value))
}
