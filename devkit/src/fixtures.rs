/*!
JSON fixtures shaped like the pools API

Only the fields the watcher reads are emitted, so tests stay short.
*/

use serde_json::{json, Value};

/// One origin entry
pub fn origin(name: &str, address: &str, healthy: Option<bool>) -> Value {
    json!({
        "name": name,
        "address": address,
        "enabled": true,
        "healthy": healthy,
    })
}

/// One pool entry with its origins
pub fn pool(id: &str, name: &str, origins: Vec<Value>) -> Value {
    let healthy = origins
        .iter()
        .all(|o| o.get("healthy").and_then(Value::as_bool).unwrap_or(false));

    json!({
        "id": id,
        "name": name,
        "description": format!("{} pool", name),
        "healthy": healthy,
        "origins": origins,
    })
}

/// Successful page envelope. `total_pages: None` drops it from `result_info`.
pub fn pools_page(pools: Vec<Value>, page: u32, per_page: u32, total_pages: Option<u32>) -> Value {
    let mut info = json!({
        "page": page,
        "per_page": per_page,
        "count": pools.len(),
    });
    if let Some(total) = total_pages {
        info["total_pages"] = json!(total);
    }

    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": pools,
        "result_info": info,
    })
}

/// Envelope with `success: false`
pub fn api_error(code: u32, message: &str) -> Value {
    json!({
        "success": false,
        "errors": [{ "code": code, "message": message }],
        "messages": [],
        "result": null,
    })
}
