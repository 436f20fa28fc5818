//! Embedded scripting runtime (component G).
//!
//! Each call to [`ScriptRuntime::execute`] spins up a fresh, disposable
//! `mlua` VM: no state or injected peer survives past one script. Peers are
//! injected as global tables keyed by their sanitized identifier, whose
//! fields are functions returning a [`handle::ScriptHandle`] — calling the
//! function enqueues the upstream call on a detached task immediately, and
//! the script only suspends when it calls `:await()` on the handle.

mod convert;
mod handle;

use gatewayrs_core::{
    encode_resource_uri, rewrite_content_uris, sanitize_identifier, GatewayError, PeerName,
    ToolResult,
};
use gatewayrs_upstream::UpstreamSession;
use mlua::{Lua, Value as LuaValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::warn;

pub use handle::ScriptHandle;

/// The globals a script would need to escape the sandbox for: filesystem,
/// process, and module-loading access, plus introspection into the VM
/// itself. Reading one of these now yields `nil`; calling one of them
/// produces the Lua "attempt to call a nil value" error, which
/// [`classify_script_error`] maps to [`GatewayError::SandboxViolation`].
const SANDBOXED_GLOBALS: &[&str] = &["io", "os", "package", "dofile", "loadfile", "load", "require", "debug"];

pub struct ScriptRuntime;

impl Default for ScriptRuntime {
    fn default() -> Self {
        ScriptRuntime
    }
}

impl ScriptRuntime {
    pub fn new() -> Self {
        ScriptRuntime
    }

    /// Run `script` to completion in a fresh VM with `peers` injected as
    /// globals, and return whatever the script passed to `result(...)`, or
    /// JSON `null` if it never called it.
    pub async fn execute(
        &self,
        script: &str,
        peers: HashMap<PeerName, Arc<UpstreamSession>>,
    ) -> Result<serde_json::Value, GatewayError> {
        let lua = Lua::new();
        sandbox(&lua).map_err(lua_err)?;

        let result_slot = Arc::new(Mutex::new(None::<serde_json::Value>));
        install_result_sink(&lua, result_slot.clone()).map_err(lua_err)?;

        for (peer_name, upstream) in &peers {
            if let Err(e) = inject_peer(&lua, peer_name, upstream.clone()).await {
                warn!(peer = %peer_name, error = %e, "skipping peer injection for script runtime");
            }
        }

        let chunk = lua.load(script).set_name("script");
        chunk.exec_async().await.map_err(classify_script_error)?;

        Ok(result_slot.lock().unwrap().take().unwrap_or(serde_json::Value::Null))
    }
}

fn sandbox(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in SANDBOXED_GLOBALS {
        globals.set(*name, LuaValue::Nil)?;
    }
    Ok(())
}

fn install_result_sink(lua: &Lua, slot: Arc<Mutex<Option<serde_json::Value>>>) -> mlua::Result<()> {
    let sink = lua.create_function(move |_, value: LuaValue| {
        let json = convert::lua_value_to_json(&value)?;
        *slot.lock().unwrap() = Some(json);
        Ok(())
    })?;
    lua.globals().set("result", sink)
}

/// Injects one peer as a global table of sanitized-name tool functions.
/// Failing to list a peer's tools only drops that peer's table; it does not
/// abort the script.
async fn inject_peer(lua: &Lua, peer_name: &str, upstream: Arc<UpstreamSession>) -> Result<(), GatewayError> {
    let tools = upstream.list_tools().await?;
    let table = lua.create_table().map_err(lua_err)?;
    for tool in tools {
        let function = make_tool_function(lua, upstream.clone(), tool.name.clone(), peer_name.to_string())
            .map_err(lua_err)?;
        table.set(sanitize_identifier(&tool.name), function).map_err(lua_err)?;
    }
    lua.globals().set(sanitize_identifier(peer_name), table).map_err(lua_err)
}

fn make_tool_function(
    lua: &Lua,
    upstream: Arc<UpstreamSession>,
    tool_name: String,
    peer_name: String,
) -> mlua::Result<mlua::Function> {
    lua.create_function(move |_, args: LuaValue| {
        let json_args = convert::lua_value_to_json(&args)?;
        let (tx, rx) = oneshot::channel();
        let upstream = upstream.clone();
        let tool_name = tool_name.clone();
        let peer_name = peer_name.clone();
        tokio::spawn(async move {
            let outcome = upstream.call_tool(&tool_name, json_args).await;
            let mapped = match outcome {
                Ok(mut result) => {
                    rewrite_content_uris(&mut result.content, &peer_name, encode_resource_uri);
                    Ok(normalize_tool_result(result))
                }
                Err(e) => Err(e.redacted_message()),
            };
            let _ = tx.send(mapped);
        });
        Ok(ScriptHandle::new(rx))
    })
}

/// The JSON shape a script sees from `peer.tool(args):await()`: the tool's
/// `structuredContent` when present, otherwise the full result envelope.
/// Shared with the `inspect-tool-response` meta-tool so it reports exactly
/// what the VM would have received.
pub fn normalize_tool_result(result: ToolResult) -> serde_json::Value {
    match &result.structured_content {
        Some(structured) => structured.clone(),
        None => serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
    }
}

/// Perform one tool call exactly the way the script VM would — same URI
/// rewriting, same result normalization — without a Lua VM. Used by the
/// `inspect-tool-response` meta-tool.
pub async fn inspect_call(
    peer_name: &str,
    upstream: &UpstreamSession,
    tool_name: &str,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, GatewayError> {
    let mut result = upstream.call_tool(tool_name, arguments).await?;
    rewrite_content_uris(&mut result.content, peer_name, encode_resource_uri);
    Ok(normalize_tool_result(result))
}

fn classify_script_error(e: mlua::Error) -> GatewayError {
    let message = e.to_string();
    if message.contains("attempt to call a nil value") || message.contains("attempt to index a nil value") {
        GatewayError::SandboxViolation(message)
    } else {
        GatewayError::ScriptFailed(message)
    }
}

fn lua_err(e: mlua::Error) -> GatewayError {
    GatewayError::ScriptFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn result_defaults_to_null() {
        let runtime = ScriptRuntime::new();
        let value = runtime.execute("local x = 1 + 1", HashMap::new()).await.unwrap();
        assert_eq!(value, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn result_sink_captures_return_value() {
        let runtime = ScriptRuntime::new();
        let value = runtime
            .execute("result({ok = true, total = 3})", HashMap::new())
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!({"ok": true, "total": 3}));
    }

    #[tokio::test]
    async fn removed_global_call_is_sandbox_violation() {
        let runtime = ScriptRuntime::new();
        let err = runtime.execute("os.execute('id')", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::SandboxViolation(_)));
    }

    #[tokio::test]
    async fn removed_global_read_is_nil_not_an_error() {
        let runtime = ScriptRuntime::new();
        let value = runtime
            .execute("result(io == nil)", HashMap::new())
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!(true));
    }

    #[tokio::test]
    async fn syntax_error_is_script_failed() {
        let runtime = ScriptRuntime::new();
        let err = runtime.execute("this is not lua (((", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::ScriptFailed(_)));
    }
}
