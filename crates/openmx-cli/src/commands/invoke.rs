//! `openmx invoke`: Call an operation.

use super::{display_name, resolve};
use crate::output::StyledOutput;
use crate::render::{parse_value, to_json, to_text};
use anyhow::{anyhow, Context};
use openmx_engine::OpenValue;
use openmx_runtime::Runtime;
use serde_json::json;

pub fn execute(
    runtime: &Runtime,
    target: &str,
    operation: &str,
    args: &[String],
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let bean = resolve(runtime.platform(), target)?;
    let descriptor = bean.descriptor();
    let overloads = descriptor.overloads(operation);
    if overloads.is_empty() {
        return Err(anyhow!(
            "{} has no operation {}",
            display_name(bean.as_ref()),
            operation
        ));
    }

    // First overload of the right arity whose parameters all parse
    let (signature, values) = overloads
        .iter()
        .filter(|op| op.params.len() == args.len())
        .find_map(|op| {
            let values = op
                .params
                .iter()
                .zip(args)
                .map(|(ty, text)| parse_value(text, ty))
                .collect::<anyhow::Result<Vec<OpenValue>>>()
                .ok()?;
            Some((op.signature(), values))
        })
        .ok_or_else(|| {
            let known: Vec<String> = overloads.iter().map(|op| op.to_string()).collect();
            anyhow!(
                "no overload of {} accepts {:?}; declared: {}",
                operation,
                args,
                known.join("; ")
            )
        })?;

    let signature: Vec<&str> = signature.iter().map(String::as_str).collect();
    tracing::debug!(operation, signature = ?signature, "invoking");
    let result = bean
        .invoke(operation, &values, &signature)
        .with_context(|| format!("invoking {} on {}", operation, display_name(bean.as_ref())))?;

    if out.is_json() {
        out.json(&json!({ "result": to_json(&result) }));
    } else if !result.is_null() {
        out.line(&to_text(&result));
    } else {
        out.success("ok");
    }
    Ok(())
}
