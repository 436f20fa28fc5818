//! The awaitable handle returned by every injected peer tool call.
//!
//! Calling `peer.tool(args)` enqueues the call on a detached task immediately
//! and hands the script a `ScriptHandle`. The script suspends only when it
//! calls `:await()` on that handle, so a script can fire several calls before
//! waiting on any of them.

use mlua::{UserData, UserDataMethods};
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::convert::json_to_lua_value;

pub struct ScriptHandle {
    receiver: Mutex<Option<oneshot::Receiver<Result<serde_json::Value, String>>>>,
}

impl ScriptHandle {
    pub fn new(receiver: oneshot::Receiver<Result<serde_json::Value, String>>) -> Self {
        ScriptHandle {
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

impl UserData for ScriptHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_async_method("await", |lua, this, ()| async move {
            let receiver = this
                .receiver
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| mlua::Error::RuntimeError("handle already awaited".to_string()))?;

            let outcome = receiver
                .await
                .map_err(|_| mlua::Error::RuntimeError("tool call task dropped before completion".to_string()))?;

            match outcome {
                Ok(json) => json_to_lua_value(&lua, &json),
                Err(message) => Err(mlua::Error::RuntimeError(message)),
            }
        });
    }
}
