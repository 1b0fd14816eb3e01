//! `openmx info`: Describe one bean.

use super::{display_name, resolve};
use crate::output::StyledOutput;
use openmx_runtime::Runtime;
use serde_json::json;

pub fn execute(runtime: &Runtime, target: &str, out: &mut StyledOutput) -> anyhow::Result<()> {
    let bean = resolve(runtime.platform(), target)?;
    let descriptor = bean.descriptor();

    if out.is_json() {
        let attributes: Vec<_> = descriptor
            .attributes()
            .iter()
            .map(|attr| {
                json!({
                    "name": attr.name,
                    "type": attr.open_type.type_name(),
                    "access": attr.access(),
                })
            })
            .collect();
        let operations: Vec<_> = descriptor
            .operations()
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "signature": op.signature(),
                    "returns": op.return_type.type_name(),
                    "impact": op.impact.to_string(),
                })
            })
            .collect();
        let notifications: Vec<_> = bean
            .notification_info()
            .iter()
            .map(|info| {
                json!({
                    "types": info.types,
                    "payload": info.payload,
                    "description": info.description,
                })
            })
            .collect();
        out.json(&json!({
            "name": display_name(bean.as_ref()),
            "interface": descriptor.interface(),
            "attributes": attributes,
            "operations": operations,
            "notifications": notifications,
        }));
        return Ok(());
    }

    out.heading(&display_name(bean.as_ref()));
    out.field("interface:", descriptor.interface());

    out.newline();
    out.heading("Attributes");
    for attr in descriptor.attributes() {
        out.field(
            &format!("  {:<36}", attr.name),
            &format!("{:<3} {}", attr.access(), attr.open_type),
        );
    }

    if !descriptor.operations().is_empty() {
        out.newline();
        out.heading("Operations");
        for op in descriptor.operations() {
            out.line(&format!("  {}  [{}]", op, op.impact));
        }
    }

    if !bean.notification_info().is_empty() {
        out.newline();
        out.heading("Notifications");
        for info in bean.notification_info() {
            out.field(&format!("  {}", info.types.join(", ")), info.payload);
        }
    }
    Ok(())
}
