use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracelens_core::analysis::diff;
use tracelens_core::svg::render_svg;
use tracelens_core::{ClickOutcome, TraceLoadError, TraceView};
use tracelens_protocol::{Point, Viewport};
use wasm_bindgen::prelude::*;

static VIEWS: Mutex<Vec<Option<TraceView>>> = Mutex::new(Vec::new());

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("trace store lock poisoned")]
    Poisoned,
    #[error("invalid trace handle {0}")]
    UnknownHandle(usize),
    #[error(transparent)]
    Load(#[from] TraceLoadError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Put `value` in the first free slot, growing only when none is free.
fn claim_slot<T>(slots: &mut Vec<Option<T>>, value: T) -> usize {
    match slots.iter().position(Option::is_none) {
        Some(free) => {
            slots[free] = Some(value);
            free
        }
        None => {
            slots.push(Some(value));
            slots.len() - 1
        }
    }
}

fn store_view(view: TraceView) -> Result<usize, BridgeError> {
    let mut views = VIEWS.lock().map_err(|_| BridgeError::Poisoned)?;
    Ok(claim_slot(&mut views, view))
}

fn with_view<T>(handle: usize, f: impl FnOnce(&mut TraceView) -> T) -> Result<T, BridgeError> {
    let mut views = VIEWS.lock().map_err(|_| BridgeError::Poisoned)?;
    let view = views
        .get_mut(handle)
        .and_then(Option::as_mut)
        .ok_or(BridgeError::UnknownHandle(handle))?;
    Ok(f(view))
}

fn to_json(value: &impl Serialize) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(value)?)
}

fn load(data: &[u8]) -> Result<usize, BridgeError> {
    let mut view = TraceView::default();
    view.load_json(data)?;
    store_view(view)
}

fn click_json(outcome: Option<ClickOutcome>) -> Result<String, BridgeError> {
    let value = match outcome {
        Some(ClickOutcome::Toggled(id)) => json!({ "kind": "toggled", "id": id }),
        Some(ClickOutcome::Selected(details)) => json!({ "kind": "selected", "details": details }),
        None => Value::Null,
    };
    to_json(&value)
}

fn diff_json(before: &str, after: &str) -> Result<String, BridgeError> {
    let parse = |s: &str| -> Result<Option<Value>, serde_json::Error> {
        if s.trim().is_empty() { Ok(None) } else { serde_json::from_str(s).map(Some) }
    };
    let (before, after) = (parse(before)?, parse(after)?);
    to_json(&diff(before.as_ref(), after.as_ref()))
}

/// Parse a trace from JSON bytes. Returns a handle for later calls.
#[wasm_bindgen]
pub fn load_trace(data: &[u8]) -> Result<usize, JsError> {
    Ok(load(data)?)
}

/// Drop a loaded trace. The handle is invalid until a later load reuses it.
#[wasm_bindgen]
pub fn release_trace(handle: usize) -> Result<(), JsError> {
    let mut views = VIEWS.lock().map_err(|_| BridgeError::Poisoned)?;
    match views.get_mut(handle) {
        Some(slot) => {
            *slot = None;
            Ok(())
        }
        None => Err(BridgeError::UnknownHandle(handle).into()),
    }
}

#[wasm_bindgen]
pub fn set_viewport(handle: usize, x: f64, y: f64, width: f64, height: f64, dpr: f64) -> Result<(), JsError> {
    Ok(with_view(handle, |v| v.set_viewport(Viewport { x, y, width, height, dpr }))?)
}

/// Render commands for the current frame as JSON.
#[wasm_bindgen]
pub fn render(handle: usize, now_ms: f64) -> Result<String, JsError> {
    let commands = with_view(handle, |v| v.render(now_ms))?;
    Ok(to_json(&commands)?)
}

/// Advance zoom animation. Returns whether another frame is needed.
#[wasm_bindgen]
pub fn tick(handle: usize, now_ms: f64) -> Result<bool, JsError> {
    Ok(with_view(handle, |v| v.tick(now_ms))?)
}

#[wasm_bindgen]
pub fn toggle(handle: usize, id: &str) -> Result<bool, JsError> {
    Ok(with_view(handle, |v| v.toggle(id))?)
}

#[wasm_bindgen]
pub fn set_all_expanded(handle: usize, expanded: bool) -> Result<bool, JsError> {
    Ok(with_view(handle, |v| v.set_all_expanded(expanded))?)
}

/// Select a node. Returns its details as JSON, or `null` for unknown ids.
#[wasm_bindgen]
pub fn select(handle: usize, id: &str) -> Result<String, JsError> {
    let details = with_view(handle, |v| v.select(id))?;
    Ok(to_json(&details)?)
}

#[wasm_bindgen]
pub fn hover(handle: usize, id: Option<String>) -> Result<bool, JsError> {
    Ok(with_view(handle, |v| v.hover(id.as_deref()))?)
}

/// Dispatch a click at canvas coordinates.
#[wasm_bindgen]
pub fn click(handle: usize, x: f64, y: f64, now_ms: f64) -> Result<String, JsError> {
    let outcome = with_view(handle, |v| v.click(Point::new(x, y), now_ms))?;
    Ok(click_json(outcome)?)
}

/// Target id under a canvas point, if any.
#[wasm_bindgen]
pub fn hit_test(handle: usize, x: f64, y: f64, now_ms: f64) -> Result<Option<String>, JsError> {
    let target = with_view(handle, |v| v.target_at(Point::new(x, y), now_ms))?;
    Ok(target.map(|t| t.node_id().to_string()))
}

#[wasm_bindgen]
pub fn zoom_in(handle: usize, now_ms: f64) -> Result<(), JsError> {
    Ok(with_view(handle, |v| v.zoom_in(now_ms))?)
}

#[wasm_bindgen]
pub fn zoom_out(handle: usize, now_ms: f64) -> Result<(), JsError> {
    Ok(with_view(handle, |v| v.zoom_out(now_ms))?)
}

#[wasm_bindgen]
pub fn fit(handle: usize, now_ms: f64) -> Result<(), JsError> {
    Ok(with_view(handle, |v| v.fit(now_ms))?)
}

#[wasm_bindgen]
pub fn pan(handle: usize, dx: f64, dy: f64, now_ms: f64) -> Result<(), JsError> {
    Ok(with_view(handle, |v| v.pan(dx, dy, now_ms))?)
}

#[wasm_bindgen]
pub fn summary(handle: usize) -> Result<String, JsError> {
    let summary = with_view(handle, |v| v.summary())?;
    Ok(to_json(&summary)?)
}

/// Flattened timeline with current expansion state.
#[wasm_bindgen]
pub fn timeline(handle: usize) -> Result<String, JsError> {
    let data = with_view(handle, |v| v.snapshot())?;
    Ok(to_json(&data)?)
}

/// Top-level key diff of two JSON documents. Empty strings count as absent.
#[wasm_bindgen]
pub fn diff_values(before: &str, after: &str) -> Result<String, JsError> {
    Ok(diff_json(before, after)?)
}

#[wasm_bindgen]
pub fn export_svg(handle: usize, dark: bool) -> Result<String, JsError> {
    Ok(with_view(handle, |v| {
        let commands = v.render(0.0);
        let viewport = v.viewport();
        render_svg(&commands, viewport.width, viewport.height, dark)
    })?)
}
