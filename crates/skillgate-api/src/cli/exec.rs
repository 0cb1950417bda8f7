//! `sgate exec`: send a raw command to any module.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::state::AppState;

/// Build the transport body for `module.op` from CLI arguments.
fn transport_body(module: &str, op: &str, params: Option<&str>) -> Result<Value> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw).context("params must be valid JSON")?,
        None => json!({}),
    };
    Ok(json!({ "module": module, "op": op, "params": params }))
}

pub async fn exec(
    state: &AppState,
    module: &str,
    op: &str,
    params: Option<&str>,
    json: bool,
) -> Result<()> {
    let body = transport_body(module, op, params)?;
    let result = state.transport_command(body).await?;
    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillgate_types::command::Command;

    #[test]
    fn transport_body_defaults_params() {
        let body = transport_body("echo", "ping", None).unwrap();
        assert_eq!(body, json!({ "module": "echo", "op": "ping", "params": {} }));
    }

    #[test]
    fn smuggled_context_is_stripped_on_parse() {
        let body = transport_body(
            "skills",
            "reload_enabled",
            Some(r#"{ "_ctx": { "capability_token": "forged" }, "keep": 1 }"#),
        )
        .unwrap();
        let cmd = Command::from_transport(body).unwrap();
        assert_eq!(cmd.params, json!({ "keep": 1 }));
    }

    #[test]
    fn invalid_params_are_rejected() {
        assert!(transport_body("echo", "say", Some("{oops")).is_err());
    }
}
