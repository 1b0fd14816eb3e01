//! `openmx get` / `openmx set`: Read and write attributes.

use super::{display_name, resolve};
use crate::output::StyledOutput;
use crate::render::{parse_value, to_json, to_text};
use anyhow::{anyhow, Context};
use openmx_runtime::Runtime;
use serde_json::{Map, Value};

pub fn get(
    runtime: &Runtime,
    target: &str,
    attributes: &[String],
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let bean = resolve(runtime.platform(), target)?;
    let names: Vec<&str> = if attributes.is_empty() {
        bean.descriptor()
            .attributes()
            .iter()
            .filter(|attr| attr.readable)
            .map(|attr| attr.name)
            .collect()
    } else {
        attributes.iter().map(String::as_str).collect()
    };

    // Named attributes must all be readable; a full dump skips failures
    let values = if attributes.is_empty() {
        bean.get_attributes(&names)
    } else {
        names
            .iter()
            .map(|name| {
                bean.get_attribute(name)
                    .map(|value| (name.to_string(), value))
                    .with_context(|| format!("reading {} of {}", name, display_name(bean.as_ref())))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    if out.is_json() {
        let object: Map<String, Value> = values
            .iter()
            .map(|(name, value)| (name.clone(), to_json(value)))
            .collect();
        out.json(&Value::Object(object));
        return Ok(());
    }
    for (name, value) in &values {
        out.field(&format!("{} =", name), &to_text(value));
    }
    Ok(())
}

pub fn set(
    runtime: &Runtime,
    target: &str,
    attribute: &str,
    text: &str,
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let bean = resolve(runtime.platform(), target)?;
    let (_, descriptor) = bean
        .descriptor()
        .writable(attribute)
        .ok_or_else(|| anyhow!("{} has no writable attribute {}", display_name(bean.as_ref()), attribute))?;
    let value = parse_value(text, &descriptor.open_type)?;
    bean.set_attribute(attribute, &value)
        .with_context(|| format!("writing {} of {}", attribute, display_name(bean.as_ref())))?;

    let current = bean.get_attribute(attribute)?;
    tracing::debug!(attribute, value = %to_text(&current), "attribute set");
    if out.is_json() {
        let mut object = Map::new();
        object.insert(attribute.to_string(), to_json(&current));
        out.json(&Value::Object(object));
    } else {
        out.success(&format!("{} = {}", attribute, to_text(&current)));
    }
    Ok(())
}
