//! `openmx list`: Show registered beans.

use super::display_name;
use crate::output::StyledOutput;
use openmx_engine::BeanKind;
use openmx_runtime::Runtime;
use serde_json::json;

pub fn execute(runtime: &Runtime, kind: Option<&str>, out: &mut StyledOutput) -> anyhow::Result<()> {
    let platform = runtime.platform();
    let beans = match kind {
        Some(kind) => platform.beans(kind.parse::<BeanKind>()?),
        None => platform.all_beans(),
    };

    if out.is_json() {
        let rows: Vec<_> = beans
            .iter()
            .map(|bean| {
                json!({
                    "name": display_name(bean.as_ref()),
                    "interface": bean.descriptor().interface(),
                })
            })
            .collect();
        out.json(&json!(rows));
        return Ok(());
    }

    for bean in &beans {
        out.field(&display_name(bean.as_ref()), bean.descriptor().interface());
    }
    if beans.is_empty() {
        out.line("(no beans)");
    }
    Ok(())
}
