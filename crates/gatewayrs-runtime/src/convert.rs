//! Lua value <-> JSON value conversion.
//!
//! The script VM only ever exchanges JSON-representable data with the host:
//! tool arguments going in, tool results and `result()` payloads coming out.
//! Lua tables are ambiguous between array and object, so array-ness is
//! decided by the same rule Lua itself uses for sequences: contiguous
//! integer keys starting at 1.

use mlua::{Lua, Value as LuaValue};
use serde_json::{Map, Value as JsonValue};

pub fn lua_value_to_json(value: &LuaValue) -> mlua::Result<JsonValue> {
    match value {
        LuaValue::Nil => Ok(JsonValue::Null),
        LuaValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        LuaValue::Integer(i) => Ok(JsonValue::from(*i)),
        LuaValue::Number(n) => Ok(serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)),
        LuaValue::String(s) => Ok(JsonValue::String(s.to_str()?.to_string())),
        LuaValue::Table(table) => {
            let len = table.raw_len();
            let is_sequence = len > 0
                && (1..=len).all(|i| table.contains_key(i as i64).unwrap_or(false))
                && table.pairs::<LuaValue, LuaValue>().count() == len;

            if is_sequence {
                let mut arr = Vec::with_capacity(len);
                for i in 1..=len {
                    let item: LuaValue = table.get(i as i64)?;
                    arr.push(lua_value_to_json(&item)?);
                }
                Ok(JsonValue::Array(arr))
            } else {
                let mut map = Map::new();
                for pair in table.pairs::<LuaValue, LuaValue>() {
                    let (k, v) = pair?;
                    let key = match k {
                        LuaValue::String(s) => s.to_str()?.to_string(),
                        LuaValue::Integer(i) => i.to_string(),
                        LuaValue::Number(n) => n.to_string(),
                        other => {
                            return Err(mlua::Error::RuntimeError(format!(
                                "unsupported table key type: {other:?}"
                            )))
                        }
                    };
                    map.insert(key, lua_value_to_json(&v)?);
                }
                Ok(JsonValue::Object(map))
            }
        }
        other => Err(mlua::Error::RuntimeError(format!(
            "value of type {} cannot cross the script boundary",
            other.type_name()
        ))),
    }
}

pub fn json_to_lua_value(lua: &Lua, value: &JsonValue) -> mlua::Result<LuaValue> {
    match value {
        JsonValue::Null => Ok(LuaValue::Nil),
        JsonValue::Bool(b) => Ok(LuaValue::Boolean(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(LuaValue::Integer(i))
            } else {
                Ok(LuaValue::Number(n.as_f64().unwrap_or(0.0)))
            }
        }
        JsonValue::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
        JsonValue::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, json_to_lua_value(lua, item)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        JsonValue::Object(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), json_to_lua_value(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_and_nesting() {
        let lua = Lua::new();
        for json in [
            serde_json::json!(null),
            serde_json::json!(true),
            serde_json::json!(42),
            serde_json::json!(1.5),
            serde_json::json!("hi"),
            serde_json::json!([1, 2, 3]),
            serde_json::json!({"a": 1, "b": [true, "x"]}),
        ] {
            let lua_val = json_to_lua_value(&lua, &json).unwrap();
            let back = lua_value_to_json(&lua_val).unwrap();
            assert_eq!(json, back);
        }
    }

    #[test]
    fn empty_table_is_empty_array() {
        let lua = Lua::new();
        let table = lua.create_table().unwrap();
        let json = lua_value_to_json(&LuaValue::Table(table)).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
