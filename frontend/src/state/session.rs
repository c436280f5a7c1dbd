//! Client-side session guard.
//!
//! Decides whether the persisted access token is still usable and forces a
//! logout when the previous lifetime of this tab ended without one. All
//! storage goes through [`KeyValueStorage`] and the unload hook through
//! [`UnloadTarget`], so the whole module runs on the host in tests with the
//! in-memory implementations.
//!
//! Storage failures never surface as errors: reads degrade to "no token"
//! (which callers treat as logged out) and writes to no-ops, with a warning
//! in the console.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::Deserialize;
use wasm_bindgen::{closure::Closure, JsCast};

use crate::utils::storage::{BrowserStorage, KeyValueStorage, MemoryStorage};

pub const TOKEN_KEY: &str = "token";
pub const SESSION_ID_KEY: &str = "sessionId";
pub const TAB_CLOSED_KEY: &str = "tabClosed";

const TAB_CLOSED_VALUE: &str = "true";

/// Decoded token payload. Only `exp` drives decisions; the rest is surfaced
/// for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expiry in seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
}

/// Decodes the payload segment of a `header.payload.signature` token.
///
/// The signature is not checked; the server does that. Returns `None` for
/// anything that is not three non-empty segments with a base64url JSON
/// object in the middle.
pub fn decode_token(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (header, payload, signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || header.is_empty() || payload.is_empty() || signature.is_empty()
    {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// `true` unless `token` decodes and carries an `exp` strictly after `now_ms`.
pub fn is_expired_at(token: Option<&str>, now_ms: i64) -> bool {
    let Some(exp) = token.and_then(decode_token).and_then(|claims| claims.exp) else {
        return true;
    };
    exp.saturating_mul(1000) <= now_ms
}

pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, now_ms())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Where the current tab is in its session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabSessionState {
    /// No marker yet.
    Fresh,
    /// Marker present, tab still open.
    Active,
    /// The tab was torn down; the next page load has not observed it yet.
    ClosedPendingCleanup,
    /// The closed marker was observed, the logout ran and markers are gone.
    CleanedUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnloadHandlerId(u64);

/// Source of the "page is about to be torn down" signal.
pub trait UnloadTarget {
    fn add_unload_handler(&self, handler: Rc<dyn Fn()>) -> Result<UnloadHandlerId, String>;
    fn remove_unload_handler(&self, id: UnloadHandlerId);
}

/// `beforeunload` listeners on `window`.
#[derive(Default)]
pub struct BrowserUnloadTarget {
    next_id: Cell<u64>,
    listeners: RefCell<HashMap<UnloadHandlerId, Closure<dyn FnMut(web_sys::Event)>>>,
}

impl BrowserUnloadTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnloadTarget for BrowserUnloadTarget {
    fn add_unload_handler(&self, handler: Rc<dyn Fn()>) -> Result<UnloadHandlerId, String> {
        let window = web_sys::window().ok_or_else(|| "No window object".to_string())?;
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| handler())
            as Box<dyn FnMut(web_sys::Event)>);
        window
            .add_event_listener_with_callback("beforeunload", closure.as_ref().unchecked_ref())
            .map_err(|_| "Failed to register beforeunload listener".to_string())?;

        let id = UnloadHandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().insert(id, closure);
        Ok(id)
    }

    fn remove_unload_handler(&self, id: UnloadHandlerId) {
        let Some(closure) = self.listeners.borrow_mut().remove(&id) else {
            return;
        };
        if let Some(window) = web_sys::window() {
            if window
                .remove_event_listener_with_callback(
                    "beforeunload",
                    closure.as_ref().unchecked_ref(),
                )
                .is_err()
            {
                log::warn!("Failed to remove beforeunload listener");
            }
        }
    }
}

/// Unload target driven by hand; stands in for `window` on the host.
#[derive(Default)]
pub struct MemoryUnloadTarget {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(UnloadHandlerId, Rc<dyn Fn()>)>>,
}

impl MemoryUnloadTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every registered handler, as the browser would on tab close.
    pub fn fire_unload(&self) {
        let handlers: Vec<_> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl UnloadTarget for MemoryUnloadTarget {
    fn add_unload_handler(&self, handler: Rc<dyn Fn()>) -> Result<UnloadHandlerId, String> {
        let id = UnloadHandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        Ok(id)
    }

    fn remove_unload_handler(&self, id: UnloadHandlerId) {
        self.handlers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }
}

/// Keeps the unload handler installed until [`TabCloseListener::cleanup`]
/// runs or the listener is dropped, whichever comes first.
pub struct TabCloseListener {
    target: Rc<dyn UnloadTarget>,
    handler: Option<UnloadHandlerId>,
    observed: TabSessionState,
}

impl TabCloseListener {
    /// State of the tab as observed during setup: `Active`, or `CleanedUp`
    /// when a previous lifetime ended and the logout ran.
    pub fn observed_state(&self) -> TabSessionState {
        self.observed
    }

    pub fn is_installed(&self) -> bool {
        self.handler.is_some()
    }

    pub fn cleanup(&mut self) {
        if let Some(id) = self.handler.take() {
            self.target.remove_unload_handler(id);
        }
    }
}

impl Drop for TabCloseListener {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Only writer of the persisted token slot.
#[derive(Clone)]
pub struct SessionGuard {
    persistent: Rc<dyn KeyValueStorage>,
    tab: Rc<dyn KeyValueStorage>,
    unload: Rc<dyn UnloadTarget>,
}

impl SessionGuard {
    pub fn new(
        persistent: Rc<dyn KeyValueStorage>,
        tab: Rc<dyn KeyValueStorage>,
        unload: Rc<dyn UnloadTarget>,
    ) -> Self {
        Self {
            persistent,
            tab,
            unload,
        }
    }

    /// `localStorage`, `sessionStorage` and `window` of the running page.
    pub fn browser() -> Self {
        Self::new(
            Rc::new(BrowserStorage::persistent()),
            Rc::new(BrowserStorage::tab()),
            Rc::new(BrowserUnloadTarget::new()),
        )
    }

    pub fn in_memory() -> Self {
        Self::new(
            Rc::new(MemoryStorage::new()),
            Rc::new(MemoryStorage::new()),
            Rc::new(MemoryUnloadTarget::new()),
        )
    }

    /// The stored token, only while it is unexpired. Stale tokens are left
    /// in place; callers decide whether to [`clear_token`](Self::clear_token).
    pub fn get_valid_token(&self) -> Option<String> {
        self.get_valid_token_at(now_ms())
    }

    pub fn get_valid_token_at(&self, now_ms: i64) -> Option<String> {
        let token = read(self.persistent.as_ref(), TOKEN_KEY)?;
        if is_expired_at(Some(&token), now_ms) {
            None
        } else {
            Some(token)
        }
    }

    pub fn has_stored_token(&self) -> bool {
        read(self.persistent.as_ref(), TOKEN_KEY).is_some()
    }

    pub fn store_token(&self, token: &str) {
        write(self.persistent.as_ref(), TOKEN_KEY, token);
    }

    pub fn clear_token(&self) {
        remove(self.persistent.as_ref(), TOKEN_KEY);
    }

    pub fn tab_state(&self) -> TabSessionState {
        let closed = read(self.tab.as_ref(), TAB_CLOSED_KEY).as_deref() == Some(TAB_CLOSED_VALUE);
        let has_session = read(self.tab.as_ref(), SESSION_ID_KEY).is_some();
        match (closed, has_session) {
            (true, _) => TabSessionState::ClosedPendingCleanup,
            (false, true) => TabSessionState::Active,
            (false, false) => TabSessionState::Fresh,
        }
    }

    /// Runs the tab-close check for this page load and arms the unload hook.
    ///
    /// When the previous lifetime of this tab ended (`tabClosed == "true"`),
    /// `on_logout` runs exactly once, synchronously, and both markers are
    /// removed. Otherwise a session id is created if missing and
    /// `on_logout` is dropped without being called.
    pub fn setup_tab_close_listener(&self, on_logout: impl FnOnce()) -> TabCloseListener {
        let observed = match self.tab_state() {
            TabSessionState::ClosedPendingCleanup => {
                remove(self.tab.as_ref(), SESSION_ID_KEY);
                remove(self.tab.as_ref(), TAB_CLOSED_KEY);
                log::info!("Previous tab session ended without logout; signing out");
                on_logout();
                TabSessionState::CleanedUp
            }
            TabSessionState::Fresh => {
                write(self.tab.as_ref(), SESSION_ID_KEY, &now_ms().to_string());
                TabSessionState::Active
            }
            state => state,
        };

        let tab = self.tab.clone();
        let handler: Rc<dyn Fn()> = Rc::new(move || {
            write(tab.as_ref(), TAB_CLOSED_KEY, TAB_CLOSED_VALUE);
        });
        let handler = match self.unload.add_unload_handler(handler) {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("Tab close detection disabled: {}", err);
                None
            }
        };

        TabCloseListener {
            target: self.unload.clone(),
            handler,
            observed,
        }
    }
}

fn read(storage: &dyn KeyValueStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Failed to read {}: {}", key, err);
            None
        }
    }
}

fn write(storage: &dyn KeyValueStorage, key: &str, value: &str) {
    if let Err(err) = storage.set(key, value) {
        log::warn!("Failed to write {}: {}", key, err);
    }
}

fn remove(storage: &dyn KeyValueStorage, key: &str) {
    if let Err(err) = storage.remove(key) {
        log::warn!("Failed to remove {}: {}", key, err);
    }
}
