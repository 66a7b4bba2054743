use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::{Map, Value};

use super::StorageError;

/// 把存储中读出的字节载荷统一为 `Bytes`。
///
/// 接受三种形态：数字数组 `[1,2,3]`、Node 风格缓冲区
/// `{"type":"Buffer","data":[..]}`、以及 typed array 序列化出的
/// `{"0":1,"1":2}` 稠密下标对象；其余一律拒绝。
pub fn normalize_bytes(value: &Value) -> Result<Bytes, StorageError> {
    match value {
        Value::Array(items) => bytes_from_sequence(items),
        Value::Object(object) => {
            if let Some(data) = buffer_payload(object) {
                return bytes_from_sequence(data);
            }
            bytes_from_indexed_object(object)
        }
        other => Err(StorageError::InvalidBytes(format!(
            "unsupported payload type: {}",
            type_name(other)
        ))),
    }
}

fn buffer_payload(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    match (object.get("type"), object.get("data")) {
        (Some(Value::String(kind)), Some(Value::Array(data))) if kind == "Buffer" => Some(data),
        _ => None,
    }
}

fn bytes_from_sequence(items: &[Value]) -> Result<Bytes, StorageError> {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        out.push(byte_at(index, item)?);
    }
    Ok(Bytes::from(out))
}

fn bytes_from_indexed_object(object: &Map<String, Value>) -> Result<Bytes, StorageError> {
    let mut out = vec![0u8; object.len()];
    let mut seen = vec![false; object.len()];
    for (key, item) in object {
        let index = key
            .parse::<usize>()
            .ok()
            .filter(|index| *index < out.len())
            .ok_or_else(|| {
                StorageError::InvalidBytes(format!("unexpected key `{key}` in indexed byte object"))
            })?;
        if seen[index] {
            return Err(StorageError::InvalidBytes(format!("duplicate index {index}")));
        }
        seen[index] = true;
        out[index] = byte_at(index, item)?;
    }
    Ok(Bytes::from(out))
}

fn byte_at(index: usize, item: &Value) -> Result<u8, StorageError> {
    item.as_u64()
        .and_then(|number| u8::try_from(number).ok())
        .ok_or_else(|| {
            StorageError::InvalidBytes(format!("element {index} is not a byte: {item}"))
        })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(bytes.iter())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    normalize_bytes(&value).map_err(D::Error::custom)
}
