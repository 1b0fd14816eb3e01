//! Bean descriptors: the metadata half of a dispatch table

use crate::notify::NotificationInfo;
use openmx_sdk::OpenType;
use rustc_hash::FxHashMap;
use std::fmt;

/// Effect of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    /// Read-only
    Info,
    /// Changes state, returns nothing useful
    Action,
    /// Changes state and returns information
    ActionInfo,
    /// Not declared
    Unknown,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impact::Info => write!(f, "INFO"),
            Impact::Action => write!(f, "ACTION"),
            Impact::ActionInfo => write!(f, "ACTION_INFO"),
            Impact::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One attribute of a bean interface
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Attribute name, unique within the interface
    pub name: &'static str,
    /// Declared open type
    pub open_type: OpenType,
    /// Rust type of the accessor
    pub native_type: &'static str,
    /// A getter is registered
    pub readable: bool,
    /// A setter is registered
    pub writable: bool,
    /// Boolean attribute read through an `isX` style getter
    pub is_getter: bool,
}

impl AttributeDescriptor {
    /// `r`, `w` or `rw`
    pub fn access(&self) -> &'static str {
        match (self.readable, self.writable) {
            (true, true) => "rw",
            (true, false) => "r",
            (false, true) => "w",
            (false, false) => "-",
        }
    }
}

/// One operation (or overload) of a bean interface
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Operation name; overloads share it
    pub name: &'static str,
    /// Parameter types, in order
    pub params: Vec<OpenType>,
    /// Return type (`void` for none)
    pub return_type: OpenType,
    /// Declared effect
    pub impact: Impact,
}

impl OperationDescriptor {
    /// Parameter type names, in order
    pub fn signature(&self) -> Vec<String> {
        self.params.iter().map(OpenType::type_name).collect()
    }

    /// True if `signature` names exactly these parameter types
    pub fn matches_signature(&self, signature: &[&str]) -> bool {
        self.params.len() == signature.len()
            && self
                .params
                .iter()
                .zip(signature)
                .all(|(param, name)| param.type_name() == *name)
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({})",
            self.return_type,
            self.name,
            self.signature().join(", ")
        )
    }
}

/// Immutable metadata of one bean interface
#[derive(Debug, Clone)]
pub struct BeanDescriptor {
    interface: &'static str,
    name_pattern: &'static str,
    attributes: Vec<AttributeDescriptor>,
    operations: Vec<OperationDescriptor>,
    notifications: Vec<NotificationInfo>,
    /// Operation name -> overload positions
    overloads: FxHashMap<&'static str, Vec<usize>>,
}

impl BeanDescriptor {
    pub(crate) fn new(
        interface: &'static str,
        name_pattern: &'static str,
        attributes: Vec<AttributeDescriptor>,
        operations: Vec<OperationDescriptor>,
        notifications: Vec<NotificationInfo>,
    ) -> Self {
        let mut overloads: FxHashMap<&'static str, Vec<usize>> = FxHashMap::default();
        for (idx, op) in operations.iter().enumerate() {
            overloads.entry(op.name).or_default().push(idx);
        }
        BeanDescriptor {
            interface,
            name_pattern,
            attributes,
            operations,
            notifications,
            overloads,
        }
    }

    /// Interface name
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// Object name pattern of beans implementing this interface
    pub fn name_pattern(&self) -> &'static str {
        self.name_pattern
    }

    /// Attributes in registration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Operations in registration order
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// Notification catalogue
    pub fn notifications(&self) -> &[NotificationInfo] {
        &self.notifications
    }

    /// First readable attribute named `name`, with its position
    pub fn readable(&self, name: &str) -> Option<(usize, &AttributeDescriptor)> {
        self.attributes
            .iter()
            .enumerate()
            .find(|(_, attr)| attr.name == name && attr.readable)
    }

    /// First writable attribute named `name`, with its position
    pub fn writable(&self, name: &str) -> Option<(usize, &AttributeDescriptor)> {
        self.attributes
            .iter()
            .enumerate()
            .find(|(_, attr)| attr.name == name && attr.writable)
    }

    /// First overload of `name` whose parameters match `signature`
    pub fn operation(&self, name: &str, signature: &[&str]) -> Option<(usize, &OperationDescriptor)> {
        self.overloads.get(name)?.iter().find_map(|&idx| {
            let op = &self.operations[idx];
            op.matches_signature(signature).then_some((idx, op))
        })
    }

    /// All overloads of `name`
    pub fn overloads(&self, name: &str) -> Vec<&OperationDescriptor> {
        self.overloads
            .get(name)
            .map(|positions| positions.iter().map(|&idx| &self.operations[idx]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &'static str, params: Vec<OpenType>) -> OperationDescriptor {
        OperationDescriptor {
            name,
            params,
            return_type: OpenType::VOID,
            impact: Impact::Info,
        }
    }

    #[test]
    fn test_overload_resolution() {
        let descriptor = BeanDescriptor::new(
            "Threads",
            "test:type=Threads",
            vec![],
            vec![
                op("getThreadInfo", vec![OpenType::LONG]),
                op("getThreadInfo", vec![OpenType::array_of(OpenType::LONG)]),
                op("getThreadInfo", vec![OpenType::LONG, OpenType::INT]),
            ],
            vec![],
        );
        assert_eq!(descriptor.operation("getThreadInfo", &["long"]).unwrap().0, 0);
        assert_eq!(descriptor.operation("getThreadInfo", &["long[]"]).unwrap().0, 1);
        assert_eq!(descriptor.operation("getThreadInfo", &["long", "int"]).unwrap().0, 2);
        assert!(descriptor.operation("getThreadInfo", &["int"]).is_none());
        assert!(descriptor.operation("dumpAllThreads", &[]).is_none());
        assert_eq!(descriptor.overloads("getThreadInfo").len(), 3);
    }

    #[test]
    fn test_attribute_lookup_respects_access() {
        let attr = |name, readable, writable| AttributeDescriptor {
            name,
            open_type: OpenType::LONG,
            native_type: "i64",
            readable,
            writable,
            is_getter: false,
        };
        let descriptor = BeanDescriptor::new(
            "Pool",
            "test:type=Pool",
            vec![attr("Usage", true, false), attr("Threshold", true, true)],
            vec![],
            vec![],
        );
        assert!(descriptor.readable("Usage").is_some());
        assert!(descriptor.writable("Usage").is_none());
        assert_eq!(descriptor.writable("Threshold").unwrap().1.access(), "rw");
        assert!(descriptor.readable("Missing").is_none());
    }
}
