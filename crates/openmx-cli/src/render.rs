//! Open values to text and JSON, and command-line strings to open values

use anyhow::{anyhow, bail};
use openmx_engine::{Notification, ObjectName, OpenValue};
use openmx_sdk::{OpenType, SimpleType};
use serde_json::{json, Map, Value};

// ============================================================================
// Rendering
// ============================================================================

/// JSON form of an open value. Records become objects, tables arrays of
/// row objects; a non-finite double becomes `null`.
pub fn to_json(value: &OpenValue) -> Value {
    match value {
        OpenValue::Null => Value::Null,
        OpenValue::Boolean(b) => Value::Bool(*b),
        OpenValue::Int(n) => json!(n),
        OpenValue::Long(n) => json!(n),
        OpenValue::Double(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        OpenValue::String(s) => Value::String(s.clone()),
        OpenValue::ObjectName(name) => Value::String(name.to_string()),
        OpenValue::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        OpenValue::Composite(record) => Value::Object(
            record
                .iter()
                .map(|(name, field)| (name.to_string(), to_json(field)))
                .collect::<Map<_, _>>(),
        ),
        OpenValue::Tabular(table) => Value::Array(
            table
                .rows()
                .iter()
                .map(|row| to_json(&OpenValue::Composite(row.clone())))
                .collect(),
        ),
    }
}

/// Single-line form of a simple value; structured values as compact JSON
pub fn to_text(value: &OpenValue) -> String {
    match value {
        OpenValue::Null => "null".to_string(),
        OpenValue::String(s) => s.clone(),
        OpenValue::ObjectName(name) => name.to_string(),
        OpenValue::Boolean(b) => b.to_string(),
        OpenValue::Int(n) => n.to_string(),
        OpenValue::Long(n) => n.to_string(),
        OpenValue::Double(n) => n.to_string(),
        OpenValue::Array(_) | OpenValue::Composite(_) | OpenValue::Tabular(_) => {
            to_json(value).to_string()
        }
    }
}

/// JSON form of a delivered notification
pub fn notification_json(notification: &Notification) -> Value {
    json!({
        "type": notification.notification_type(),
        "source": notification.source().map(ObjectName::canonical),
        "sequence": notification.sequence(),
        "timestamp": notification.timestamp(),
        "message": notification.message(),
        "userData": to_json(notification.user_data()),
    })
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a command-line string as a value of `ty`. `null` is passed
/// through for the bean to accept or refuse.
pub fn parse_value(text: &str, ty: &OpenType) -> anyhow::Result<OpenValue> {
    if text == "null" {
        return Ok(OpenValue::Null);
    }
    match ty {
        OpenType::Simple(simple) => parse_simple(text, *simple),
        OpenType::Array(element) => {
            let OpenType::Simple(simple) = element.as_ref() else {
                bail!("{} cannot be given on the command line", ty);
            };
            if text.is_empty() {
                return Ok(OpenValue::Array(Vec::new()));
            }
            text.split(',')
                .map(|item| parse_simple(item.trim(), *simple))
                .collect::<anyhow::Result<Vec<_>>>()
                .map(OpenValue::Array)
        }
        OpenType::Composite(_) | OpenType::Tabular(_) => {
            bail!("{} cannot be given on the command line", ty)
        }
    }
}

fn parse_simple(text: &str, ty: SimpleType) -> anyhow::Result<OpenValue> {
    let invalid = || anyhow!("`{}` is not a valid {}", text, ty.type_name());
    let value = match ty {
        SimpleType::Boolean => OpenValue::Boolean(text.parse().map_err(|_| invalid())?),
        SimpleType::Int => OpenValue::Int(text.parse().map_err(|_| invalid())?),
        SimpleType::Long => OpenValue::Long(text.parse().map_err(|_| invalid())?),
        SimpleType::Double => OpenValue::Double(text.parse().map_err(|_| invalid())?),
        SimpleType::String => OpenValue::String(text.to_string()),
        SimpleType::ObjectName => OpenValue::ObjectName(ObjectName::parse(text).ok_or_else(invalid)?),
        SimpleType::Void => bail!("void takes no value"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_values() {
        assert_eq!(parse_value("42", &OpenType::LONG).unwrap(), OpenValue::Long(42));
        assert_eq!(parse_value("true", &OpenType::BOOLEAN).unwrap(), OpenValue::Boolean(true));
        assert_eq!(parse_value("FINE", &OpenType::STRING).unwrap(), OpenValue::from("FINE"));
        assert_eq!(parse_value("null", &OpenType::INT).unwrap(), OpenValue::Null);
        assert!(parse_value("lots", &OpenType::LONG).is_err());
        assert!(parse_value("", &OpenType::VOID).is_err());
    }

    #[test]
    fn test_parse_arrays() {
        let ids = parse_value("1, 2,3", &OpenType::array_of(OpenType::LONG)).unwrap();
        assert_eq!(
            ids,
            OpenValue::Array(vec![OpenValue::Long(1), OpenValue::Long(2), OpenValue::Long(3)])
        );
        assert_eq!(
            parse_value("", &OpenType::array_of(OpenType::LONG)).unwrap(),
            OpenValue::Array(Vec::new())
        );
        assert!(parse_value("1,x", &OpenType::array_of(OpenType::LONG)).is_err());
    }

    #[test]
    fn test_json_rendering() {
        assert_eq!(to_json(&OpenValue::Double(f64::NAN)), Value::Null);
        assert_eq!(to_json(&OpenValue::Long(7)), json!(7));
        let name = ObjectName::parse("java.lang:type=Memory").unwrap();
        assert_eq!(to_json(&OpenValue::ObjectName(name)), json!("java.lang:type=Memory"));
        assert_eq!(
            to_text(&OpenValue::Array(vec![OpenValue::from("a")])),
            "[\"a\"]"
        );
    }
}
