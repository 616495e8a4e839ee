//! FFI layer for the mobile host.
//!
//! The host app calls these functions from its background task callbacks and
//! from the foreground UI. Each call opens the store described by the config,
//! does its work on a private current-thread runtime, and closes the store
//! again, so calls are safe from any thread and from a freshly started process.
//! All data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `fieldsync_*` functions are allocated by Rust
//! - Caller must free them with `fieldsync_string_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::location::{CaptureOutcome, LocationFix};
use crate::state::AppState;
use crate::sync::{SingleFlight, SyncReport};
use fieldsync_engine::EntityClass;
use std::collections::BTreeMap;
use std::ffi::{c_char, CStr, CString};
use std::future::Future;
use std::sync::OnceLock;

/// One sync cycle per process, whichever thread asks for it.
static SYNC_FLIGHT: OnceLock<SingleFlight> = OnceLock::new();

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

impl<T: serde::Serialize> From<Result<T>> for FfiResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(ok) => FfiResult::Ok { ok },
            Err(e) => FfiResult::Err {
                error: e.to_string(),
            },
        }
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `fieldsync_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .or_else(|_| CString::new(r#"{"error":"string contained null bytes"}"#))
        .unwrap_or_default()
        .into_raw()
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

unsafe fn parse_arg<T: serde::de::DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T> {
    let raw = from_c_string(ptr)
        .ok_or_else(|| AgentError::BadRequest(format!("{what} is null or not UTF-8")))?;
    serde_json::from_str(&raw).map_err(|e| AgentError::BadRequest(format!("invalid {what}: {e}")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync_agent=info".into()),
        )
        .try_init();
}

/// Run `work` against a freshly opened state and close the store afterwards.
fn run<T, F, Fut>(config: Config, work: F) -> Result<T>
where
    F: FnOnce(AppState) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    init_tracing();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let flight = SYNC_FLIGHT.get_or_init(SingleFlight::new).clone();
        let state = AppState::open_with_flight(&config, flight).await?;
        let store = state.store.clone();
        let result = work(state).await;
        store.close().await;
        result
    })
}

fn respond<T: serde::Serialize>(result: Result<T>) -> *mut c_char {
    to_c_string(FfiResult::from(result).to_json())
}

/// Free a string allocated by the agent.
///
/// # Safety
/// - `s` must be a valid pointer from a `fieldsync_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn fieldsync_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Background location task entry point.
///
/// # Arguments
/// - `config_json`: JSON string of the agent config
/// - `fixes_json`: JSON array of location fixes delivered by the OS
///
/// # Returns
/// JSON string: `{"ok": CaptureOutcome}` or `{"error": "message"}`
///
/// # Safety
/// - `config_json` and `fixes_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `fieldsync_string_free`
#[no_mangle]
pub unsafe extern "C" fn fieldsync_run_location_task(
    config_json: *const c_char,
    fixes_json: *const c_char,
) -> *mut c_char {
    let result = parse_arg::<Config>(config_json, "config").and_then(|config| {
        let fixes: Vec<LocationFix> = parse_arg(fixes_json, "location fixes")?;
        run(config, |state| async move {
            let outcome: CaptureOutcome = state.capture.handle(&fixes).await?;
            Ok(outcome)
        })
    });
    respond(result)
}

/// Run one sync cycle.
///
/// # Returns
/// JSON string: `{"ok": SyncReport}` or `{"error": "message"}`
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `fieldsync_string_free`
#[no_mangle]
pub unsafe extern "C" fn fieldsync_sync_all(config_json: *const c_char) -> *mut c_char {
    let result = parse_arg::<Config>(config_json, "config").and_then(|config| {
        run(config, |state| async move {
            let report: SyncReport = state.orchestrator.sync_all().await;
            Ok(report)
        })
    });
    respond(result)
}

/// Pending record count per class.
///
/// # Returns
/// JSON string: `{"ok": {"alert": 0, ...}}` or `{"error": "message"}`
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `fieldsync_string_free`
#[no_mangle]
pub unsafe extern "C" fn fieldsync_pending_summary(config_json: *const c_char) -> *mut c_char {
    let result = parse_arg::<Config>(config_json, "config").and_then(|config| {
        run(config, |state| async move {
            let summary: BTreeMap<EntityClass, u64> =
                state.orchestrator.pending_summary().await?.into_iter().collect();
            Ok(summary)
        })
    });
    respond(result)
}

/// Get the agent version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn fieldsync_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
