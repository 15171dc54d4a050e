//! HTTP JSON-RPC implementation of [`ChainReader`].
//!
//! Speaks the common gateway dialect: `getAddressInformation` for raw
//! account state and `runGetMethod` for read-only queries. Responses are
//! inspected leniently through `serde_json::Value` since gateways vary
//! in how they wrap stack entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::address::Address;
use crate::boc;
use crate::chain::{ChainReader, StackValue};
use crate::error::{MarlinError, Result};

/// Default request timeout for read-only queries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A [`ChainReader`] backed by an HTTP JSON-RPC gateway.
pub struct HttpChainReader {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpChainReader {
    /// Builds a reader against `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MarlinError::Network)?;
        Ok(HttpChainReader {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        if body["ok"].as_bool() == Some(false) {
            return Err(MarlinError::Chain(format!(
                "{method} failed: {}",
                body["error"].as_str().unwrap_or("unknown gateway error")
            )));
        }
        Ok(body["result"].clone())
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn account_state(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        let result = self
            .call(
                "getAddressInformation",
                json!({ "address": address.to_friendly() }),
            )
            .await?;
        let data = result["data"].as_str().unwrap_or("");
        if data.is_empty() {
            return Ok(None);
        }
        let bytes = BASE64
            .decode(data)
            .map_err(|e| MarlinError::Chain(format!("account state is not base64: {e}")))?;
        Ok(Some(bytes))
    }

    async fn run_get_method(
        &self,
        address: &Address,
        method: &str,
        args: &[StackValue],
    ) -> Result<Vec<StackValue>> {
        let stack: Vec<Value> = args.iter().map(encode_stack_value).collect();
        let result = self
            .call(
                "runGetMethod",
                json!({
                    "address": address.to_friendly(),
                    "method": method,
                    "stack": stack,
                }),
            )
            .await?;

        let exit_code = result["exit_code"].as_i64().unwrap_or(0);
        if exit_code != 0 {
            return Err(MarlinError::Chain(format!(
                "{method} exited with code {exit_code}"
            )));
        }
        result["stack"]
            .as_array()
            .ok_or_else(|| MarlinError::Chain(format!("{method} returned no stack")))?
            .iter()
            .map(decode_stack_value)
            .collect()
    }
}

fn encode_stack_value(value: &StackValue) -> Value {
    match value {
        // Hex integers are formatted sign-magnitude; `{:#x}` on a signed
        // type would emit two's complement.
        StackValue::Int(v) if *v < 0 => json!(["num", format!("-{:#x}", v.unsigned_abs())]),
        StackValue::Int(v) => json!(["num", format!("{:#x}", *v as u128)]),
        StackValue::Cell(c) => json!(["tvm.Cell", BASE64.encode(boc::serialize(c))]),
        StackValue::Slice(c) => json!(["tvm.Slice", BASE64.encode(boc::serialize(c))]),
    }
}

fn decode_stack_value(entry: &Value) -> Result<StackValue> {
    let pair = entry
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| MarlinError::Chain(format!("malformed stack entry: {entry}")))?;
    let kind = pair[0].as_str().unwrap_or_default();

    match kind {
        "num" => {
            let text = pair[1]
                .as_str()
                .ok_or_else(|| MarlinError::Chain("numeric stack entry is not a string".into()))?;
            parse_hex_int(text)
                .map(StackValue::Int)
                .ok_or_else(|| MarlinError::Chain(format!("unparsable stack number {text:?}")))
        }
        "cell" | "tvm.Cell" | "slice" | "tvm.Slice" => {
            // Cells arrive either as a bare base64 string or wrapped in
            // an object with a `bytes` field.
            let encoded = pair[1]
                .as_str()
                .or_else(|| pair[1]["bytes"].as_str())
                .ok_or_else(|| MarlinError::Chain("cell stack entry carries no bytes".into()))?;
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| MarlinError::Chain(format!("stack cell is not base64: {e}")))?;
            let cell = boc::parse(&bytes)?;
            if kind.ends_with("Slice") || kind == "slice" {
                Ok(StackValue::Slice(Arc::clone(&cell)))
            } else {
                Ok(StackValue::Cell(cell))
            }
        }
        other => Err(MarlinError::Chain(format!(
            "unsupported stack entry kind {other:?}"
        ))),
    }
}

/// Parses gateway integers: optionally negative, `0x`-prefixed hex or
/// plain decimal.
fn parse_hex_int(text: &str) -> Option<i128> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match rest.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => rest.parse::<i128>().ok()?,
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_integers() {
        assert_eq!(parse_hex_int("0x36b0"), Some(14_000));
        assert_eq!(parse_hex_int("14000"), Some(14_000));
        assert_eq!(parse_hex_int("-0x1"), Some(-1));
        assert_eq!(parse_hex_int("0"), Some(0));
        assert_eq!(parse_hex_int("bogus"), None);
    }

    #[test]
    fn decodes_wrapped_and_bare_cell_entries() {
        let mut b = crate::cell::CellBuilder::new();
        b.store_uint(5, 8).unwrap();
        let cell = Arc::new(b.build());
        let encoded = BASE64.encode(boc::serialize(&cell));

        let bare = json!(["cell", encoded]);
        let wrapped = json!(["tvm.Cell", { "bytes": encoded }]);
        for entry in [bare, wrapped] {
            let value = decode_stack_value(&entry).unwrap();
            assert_eq!(
                value.as_cell().unwrap().repr_hash(),
                cell.repr_hash()
            );
        }
    }

    #[test]
    fn rejects_unknown_stack_kinds() {
        assert!(decode_stack_value(&json!(["tuple", []])).is_err());
        assert!(decode_stack_value(&json!("num")).is_err());
    }

    #[test]
    fn stack_arguments_encode_as_pairs() {
        let encoded = encode_stack_value(&StackValue::Int(14_000));
        assert_eq!(encoded[0], "num");
        assert_eq!(encoded[1], "0x36b0");
    }
}
