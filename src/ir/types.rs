//! Declared types and parameters.

use std::rc::Rc;

use crate::{expr::ValueType, ir::Path};

/// The declared type of a variable or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A scalar.
    Value(ValueType),
    /// A struct or header.
    Struct(Rc<StructType>),
    /// A fixed-size header stack.
    Stack {
        /// The element header.
        element: Rc<StructType>,
        /// Number of elements.
        size: usize,
    },
}

/// A struct or header type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    /// Type name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<(String, Type)>,
    /// Whether the type is a header and so carries a validity bit.
    pub is_header: bool,
}

impl Type {
    /// Creates `bit<width>`.
    #[must_use]
    pub const fn bits(width: u32) -> Self {
        Self::Value(ValueType::bits(width))
    }

    /// Creates `bool`.
    #[must_use]
    pub const fn bool() -> Self {
        Self::Value(ValueType::Bool)
    }

    /// Creates a struct type.
    #[must_use]
    pub fn structure(name: &str, fields: Vec<(&str, Type)>) -> Self {
        Self::Struct(Rc::new(StructType::new(name, fields, false)))
    }

    /// Creates a header type.
    #[must_use]
    pub fn header(name: &str, fields: Vec<(&str, Type)>) -> Self {
        Self::Struct(Rc::new(StructType::new(name, fields, true)))
    }

    /// Creates a header stack of `size` copies of `element`.
    ///
    /// # Returns
    ///
    /// `None` if `element` is not a header.
    #[must_use]
    pub fn stack(element: &Type, size: usize) -> Option<Self> {
        match element {
            Self::Struct(s) if s.is_header => Some(Self::Stack {
                element: Rc::clone(s),
                size,
            }),
            _ => None,
        }
    }

    /// Returns the scalar type, if this is a scalar.
    #[must_use]
    pub const fn as_value(&self) -> Option<ValueType> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Checks whether the type is a header.
    #[must_use]
    pub fn is_header(&self) -> bool {
        matches!(self, Self::Struct(s) if s.is_header)
    }

    /// Returns the type of member `name` of a struct.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Type> {
        match self {
            Self::Struct(s) => s.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t),
            _ => None,
        }
    }

    /// Flattens a variable of this type into its scalar leaves.
    ///
    /// Leaves come in declaration order, depth first. The validity bits of every header
    /// reached are returned separately, in the same order.
    ///
    /// # Arguments
    ///
    /// * `path` - The path of the variable
    ///
    /// # Returns
    ///
    /// The typed data leaves and the validity bit paths.
    #[must_use]
    pub fn flatten(&self, path: &Path) -> (Vec<(Path, ValueType)>, Vec<Path>) {
        let mut leaves = Vec::new();
        let mut valids = Vec::new();
        self.flatten_into(path, &mut leaves, &mut valids);
        (leaves, valids)
    }

    fn flatten_into(
        &self,
        path: &Path,
        leaves: &mut Vec<(Path, ValueType)>,
        valids: &mut Vec<Path>,
    ) {
        match self {
            Self::Value(v) => leaves.push((path.clone(), *v)),
            Self::Struct(s) => {
                for (name, ty) in &s.fields {
                    ty.flatten_into(&path.member(name), leaves, valids);
                }
                if s.is_header {
                    valids.push(path.valid());
                }
            }
            Self::Stack { element, size } => {
                let element = Self::Struct(Rc::clone(element));
                for index in 0..*size {
                    element.flatten_into(&path.index(index), leaves, valids);
                }
            }
        }
    }

    /// Lists the paths of every composite and scalar node below and including `path`,
    /// with their types.
    #[must_use]
    pub fn nodes(&self, path: &Path) -> Vec<(Path, Type)> {
        let mut nodes = vec![(path.clone(), self.clone())];
        match self {
            Self::Value(_) => {}
            Self::Struct(s) => {
                for (name, ty) in &s.fields {
                    nodes.extend(ty.nodes(&path.member(name)));
                }
                if s.is_header {
                    nodes.push((path.valid(), Self::bool()));
                }
            }
            Self::Stack { element, size } => {
                let element = Self::Struct(Rc::clone(element));
                for index in 0..*size {
                    nodes.extend(element.nodes(&path.index(index)));
                }
            }
        }
        nodes
    }
}

impl From<ValueType> for Type {
    fn from(value: ValueType) -> Self {
        Self::Value(value)
    }
}

impl StructType {
    /// Creates a struct or header type.
    #[must_use]
    pub fn new(name: &str, fields: Vec<(&str, Type)>, is_header: bool) -> Self {
        Self {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            is_header,
        }
    }
}

/// The direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Directionless: supplied by the control plane for table actions.
    None,
    /// Copied in only.
    In,
    /// Copied out only.
    Out,
    /// Copied in and out.
    InOut,
}

impl Direction {
    /// Checks whether values flow back to the caller.
    #[must_use]
    pub const fn copies_out(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// A parameter of an action, control or parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name as used in the body.
    pub name: String,
    /// Control-plane name; action parameters may be renamed by an annotation.
    pub control_plane_name: String,
    /// Declared type.
    pub ty: Type,
    /// Direction.
    pub direction: Direction,
}

impl Param {
    /// Creates a parameter whose control-plane name is its name.
    #[must_use]
    pub fn new(name: &str, ty: Type, direction: Direction) -> Self {
        Self {
            name: name.to_string(),
            control_plane_name: name.to_string(),
            ty,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{Path, Type};

    fn ethernet() -> Type {
        Type::header("ethernet_t", vec![("dst", Type::bits(48)), ("etherType", Type::bits(16))])
    }

    #[test]
    fn test_flatten_header_struct() {
        let headers = Type::structure(
            "headers_t",
            vec![("ethernet", ethernet()), ("flag", Type::bool())],
        );
        let (leaves, valids) = headers.flatten(&Path::new("hdr"));
        let names: Vec<_> = leaves.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            names,
            vec!["hdr.ethernet.dst", "hdr.ethernet.etherType", "hdr.flag"]
        );
        assert_eq!(valids, vec![Path::new("hdr.ethernet.$valid")]);
    }

    #[test]
    fn test_flatten_stack() {
        let stack = Type::stack(&ethernet(), 2).unwrap();
        let (leaves, valids) = stack.flatten(&Path::new("s"));
        assert_eq!(leaves.len(), 4);
        assert_eq!(valids.len(), 2);
        assert_eq!(leaves[2].0.as_str(), "s[1].dst");
    }

    #[test]
    fn test_stack_requires_header() {
        assert!(Type::stack(&Type::bits(8), 2).is_none());
    }

    #[test]
    fn test_nodes_include_composites() {
        let nodes = ethernet().nodes(&Path::new("eth"));
        let names: Vec<_> = nodes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, vec!["eth", "eth.dst", "eth.etherType", "eth.$valid"]);
    }
}
