use std::collections::HashMap;

use wsdlc_wsdl::{error::Location, types::NamespacedName};

use super::options::{NamespaceAliases, Visibility};

/// Scalars the built-in schema types map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    DateTime,
    Date,
    Time,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Builtin(Builtin),
    /// A generated item, by its Rust name.
    Named(String),
    /// A schema construct with no typed representation.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Optional,
    Sequence,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub target: Target,
    pub shape: Shape,
    /// Set on fields that close a by-value cycle back to their owner.
    pub boxed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Element,
    Attribute,
    /// Character data of a simple-content type.
    Text,
    /// An embedded extension base.
    Flatten,
    /// Wildcard content.
    Any,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub xml_name: String,
    pub kind: FieldKind,
    pub ty: TypeRef,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub name: String,
    pub value: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ResolvedKind {
    Alias {
        target: TypeRef,
        /// The end of the alias chain.
        underlying: Target,
    },
    Enumeration {
        base: TypeRef,
        underlying: Target,
        constants: Vec<EnumConstant>,
    },
    Struct {
        fields: Vec<Field>,
    },
}

#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub name: String,
    /// The declaration this was resolved from; `None` for anonymous and
    /// message wrapper types.
    pub key: Option<NamespacedName>,
    pub xml_name: String,
    pub documentation: Option<String>,
    pub kind: ResolvedKind,
}

#[derive(Debug, Clone)]
pub struct OpaqueReference {
    pub location: Location,
    pub construct: String,
}

#[derive(Debug, Clone)]
pub struct Fault {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    /// The operation name as declared.
    pub name: String,
    pub method_name: String,
    pub request: Option<TypeRef>,
    pub response: Option<TypeRef>,
    pub faults: Vec<Fault>,
    pub action: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PortTypeInterface {
    pub name: String,
    pub key: NamespacedName,
    pub documentation: Option<String>,
    pub endpoint: Option<String>,
    pub operations: Vec<Operation>,
}

/// The result of type resolution: every generated item in emission order,
/// plus lookups from schema keys.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    pub visibility: Visibility,
    pub(crate) aliases: NamespaceAliases,
    pub(crate) types: Vec<ResolvedType>,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) by_type_key: HashMap<NamespacedName, usize>,
    pub(crate) elements: HashMap<NamespacedName, TypeRef>,
    pub(crate) messages: HashMap<NamespacedName, Option<TypeRef>>,
    pub(crate) opaque: Vec<OpaqueReference>,
}

impl Builtin {
    pub fn from_xsd(name: &str) -> Option<Self> {
        Some(match name {
            "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "NMTOKEN"
            | "NMTOKENS" | "ID" | "IDREF" | "IDREFS" | "ENTITY" | "ENTITIES" | "QName"
            | "NOTATION" | "anyURI" | "duration" | "gYear" | "gYearMonth" | "gMonth"
            | "gMonthDay" | "gDay" => Builtin::String,
            "boolean" => Builtin::Bool,
            "byte" => Builtin::I8,
            "short" => Builtin::I16,
            "int" => Builtin::I32,
            "long" | "integer" | "nonPositiveInteger" | "negativeInteger" => Builtin::I64,
            "unsignedByte" => Builtin::U8,
            "unsignedShort" => Builtin::U16,
            "unsignedInt" => Builtin::U32,
            "unsignedLong" | "nonNegativeInteger" | "positiveInteger" => Builtin::U64,
            "float" => Builtin::F32,
            "double" | "decimal" => Builtin::F64,
            "dateTime" => Builtin::DateTime,
            "date" => Builtin::Date,
            "time" => Builtin::Time,
            "base64Binary" | "hexBinary" => Builtin::Bytes,
            _ => return None,
        })
    }
}

impl TypeRef {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            shape: Shape::Scalar,
            boxed: false,
        }
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(Target::Builtin(builtin))
    }

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self::new(Target::Named(name.into()))
    }

    pub fn opaque() -> Self {
        Self::new(Target::Opaque)
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// The generated item this refers to, if any.
    pub fn name(&self) -> Option<&str> {
        match &self.target {
            Target::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.target == Target::Opaque
    }
}

impl ResolvedType {
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            ResolvedKind::Struct { fields } => fields,
            _ => &[],
        }
    }

    pub fn constants(&self) -> &[EnumConstant] {
        match &self.kind {
            ResolvedKind::Enumeration { constants, .. } => constants,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|field| field.name == name)
    }
}

impl ResolvedGraph {
    /// Every generated item, in emission order.
    pub fn types(&self) -> &[ResolvedType] {
        &self.types
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedType> {
        self.by_name.get(name).map(|&index| &self.types[index])
    }

    /// The item generated for a global simple or complex type.
    pub fn lookup(&self, key: &NamespacedName) -> Option<&ResolvedType> {
        self.by_type_key.get(key).map(|&index| &self.types[index])
    }

    /// The type a global element resolves to.
    pub fn element(&self, key: &NamespacedName) -> Option<&TypeRef> {
        self.elements.get(key)
    }

    /// The type a message resolves to; `Some(None)` for an empty message.
    pub fn message(&self, key: &NamespacedName) -> Option<Option<&TypeRef>> {
        self.messages.get(key).map(Option::as_ref)
    }

    /// Every place an unmodeled schema construct was mapped to the opaque
    /// type.
    pub fn opaque_references(&self) -> &[OpaqueReference] {
        &self.opaque
    }
}
