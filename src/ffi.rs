//! FFI bindings for the Interact telemetry engine
//!
//! This module exposes an opaque engine handle to C callers. The host owns the
//! clock and the real transport: it passes page-clock milliseconds into every
//! call and periodically drains the queued payloads for sending.
//! Returned strings must be freed with `interact_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::activity::Interaction;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::environment::UserAgentProbe;
use crate::error::TelemetryError;
use crate::identity::{resolve_visitor_id, MemoryIdentityStore};
use crate::page::PageSnapshot;
use crate::transport::MemoryTransport;

/// Interaction kind codes accepted by `interact_engine_interaction`
pub const INTERACT_POINTER_MOVE: i32 = 0;
pub const INTERACT_SCROLL: i32 = 1;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Helper to convert a Vec<String> to a JSON array string
fn vec_to_json_array(vec: Vec<String>) -> String {
    // Each string is already valid JSON, so we join them as array elements
    let elements: Vec<&str> = vec.iter().map(|s| s.as_str()).collect();
    format!("[{}]", elements.join(","))
}

// ============================================================================
// Engine Handle
// ============================================================================

/// Opaque handle to an engine and the page it observes
pub struct InteractEngineHandle {
    engine: Engine<MemoryTransport>,
    page: PageSnapshot,
}

/// Borrow the handle, recording an error for NULL
unsafe fn handle_mut<'a>(handle: *mut InteractEngineHandle) -> Option<&'a mut InteractEngineHandle> {
    if handle.is_null() {
        set_last_error("Null engine pointer");
        return None;
    }
    Some(&mut *handle)
}

fn build_handle(
    config_toml: Option<String>,
    visitor_id: Option<String>,
    user_agent: Option<String>,
    referrer: Option<String>,
) -> Result<InteractEngineHandle, TelemetryError> {
    let config = match config_toml {
        Some(toml) => EngineConfig::from_toml_str(&toml)?,
        None => EngineConfig::default(),
    };

    let visitor_id = match visitor_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => resolve_visitor_id(&mut MemoryIdentityStore::new(), &config.identity),
    };
    let probe = UserAgentProbe::new(user_agent.unwrap_or_default(), referrer);

    let engine = Engine::new(config, visitor_id, Box::new(probe), MemoryTransport::new())?;
    Ok(InteractEngineHandle {
        engine,
        page: PageSnapshot::new("about:blank", 0.0),
    })
}

/// Create a new engine.
///
/// # Safety
/// - All arguments must be NULL or valid null-terminated C strings.
/// - `config_toml` NULL means default configuration.
/// - `visitor_id` NULL or empty mints a fresh identifier for this engine only;
///   hosts that persist identity should resolve it themselves.
/// - Must be freed with `interact_engine_free`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_new(
    config_toml: *const c_char,
    visitor_id: *const c_char,
    user_agent: *const c_char,
    referrer: *const c_char,
) -> *mut InteractEngineHandle {
    clear_last_error();

    match build_handle(
        cstr_to_string(config_toml),
        cstr_to_string(visitor_id),
        cstr_to_string(user_agent),
        cstr_to_string(referrer),
    ) {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_free(handle: *mut InteractEngineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start the engine's timers.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_start(handle: *mut InteractEngineHandle, now_ms: u64) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    handle.engine.start(now_ms);
    0
}

/// Replace the page layout with a JSON page snapshot
/// (`{"url": ..., "viewport": {"scroll_y", "height"}, "sections": [...]}`).
///
/// Timer ticks due before `now_ms` run against the previous layout.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - `page_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_set_layout(
    handle: *mut InteractEngineHandle,
    now_ms: u64,
    page_json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };

    let json_str = match cstr_to_string(page_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid page JSON string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<PageSnapshot>(&json_str) {
        Ok(page) => {
            handle.engine.advance_to(now_ms, &handle.page);
            handle.page = page;
            0
        }
        Err(e) => {
            set_last_error(&TelemetryError::from(e).to_string());
            -1
        }
    }
}

/// Run every timer tick due up to `now_ms`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns the number of ticks fired, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_advance(handle: *mut InteractEngineHandle, now_ms: u64) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let fired = handle.engine.advance_to(now_ms, &handle.page);
    i32::try_from(fired).unwrap_or(i32::MAX)
}

/// Report a pointer move (`INTERACT_POINTER_MOVE`) or a scroll to
/// `scroll_y` (`INTERACT_SCROLL`).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns 1 if a record was queued, 0 if not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_interaction(
    handle: *mut InteractEngineHandle,
    now_ms: u64,
    kind: i32,
    scroll_y: f64,
) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };

    let interaction = match kind {
        INTERACT_POINTER_MOVE => Interaction::PointerMove,
        INTERACT_SCROLL => {
            if !scroll_y.is_finite() || scroll_y < 0.0 {
                set_last_error(&format!("Invalid scroll offset: {scroll_y}"));
                return -1;
            }
            handle.engine.advance_to(now_ms, &handle.page);
            handle.page.scroll_to(scroll_y);
            Interaction::Scroll
        }
        other => {
            set_last_error(&format!("Unknown interaction kind: {other}"));
            return -1;
        }
    };

    match handle.engine.on_interaction(now_ms, &handle.page, interaction) {
        Some(_) => 1,
        None => 0,
    }
}

/// Signal that the host's transport is connected.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns 1 if a record was queued, 0 if not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_transport_ready(
    handle: *mut InteractEngineHandle,
    now_ms: u64,
) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    match handle.engine.on_transport_ready(now_ms, &handle.page) {
        Some(_) => 1,
        None => 0,
    }
}

/// Page unload: run due ticks, then stop every timer.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_unload(handle: *mut InteractEngineHandle, now_ms: u64) -> i32 {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    handle.engine.advance_to(now_ms, &handle.page);
    handle.engine.shutdown();
    0
}

/// Take every queued payload as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `interact_engine_new`.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_engine_drain(handle: *mut InteractEngineHandle) -> *mut c_char {
    clear_last_error();

    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let payloads = handle.engine.transport_mut().drain();
    string_to_cstr(&vec_to_json_array(payloads))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Interact functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Interact function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interact_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Interact function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn interact_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn interact_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
