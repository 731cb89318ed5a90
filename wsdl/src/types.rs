use std::fmt;

use url::Url;

pub const XSD_NAMESPACES: [&str; 3] = [
    "http://www.w3.org/2001/XMLSchema",
    "http://www.w3.org/2000/10/XMLSchema",
    "http://www.w3.org/1999/XMLSchema",
];

pub const SOAP_ENCODING_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Bound to the `xml` prefix without a declaration.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A `(namespace, local name)` pair identifying a declaration; the empty
/// namespace stands for "no namespace".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Import,
    Include,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub kind: ImportKind,
    pub namespace: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

#[derive(Debug, Clone)]
pub struct Enumeration {
    pub value: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SimpleTypeKind {
    Restriction {
        base: Option<NamespacedName>,
        inline_base: Option<Box<SimpleType>>,
        enumeration: Vec<Enumeration>,
    },
    List {
        item: Option<NamespacedName>,
        inline_item: Option<Box<SimpleType>>,
    },
    Union {
        members: Vec<NamespacedName>,
    },
    Empty,
}

#[derive(Debug, Clone)]
pub struct SimpleType {
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub offset: usize,
    pub kind: SimpleTypeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationMethod {
    Extension,
    Restriction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Simple,
    Complex,
}

#[derive(Debug, Clone)]
pub struct Derivation {
    pub method: DerivationMethod,
    pub content: ContentKind,
    pub base: NamespacedName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone)]
pub enum Particle {
    Element(Element),
    Group(Group),
    GroupRef(GroupRef),
    Any { max_occurs: MaxOccurs },
}

/// `<group ref="..."/>` inside a content model.
#[derive(Debug, Clone)]
pub struct GroupRef {
    pub reference: NamespacedName,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub offset: usize,
}

/// A global `<group name="...">`, expanded wherever it is referenced.
#[derive(Debug, Clone)]
pub struct ModelGroup {
    pub name: String,
    pub documentation: Option<String>,
    pub offset: usize,
    pub particle: Option<Group>,
}

#[derive(Debug, Clone)]
pub struct AttributeGroupRef {
    pub reference: NamespacedName,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct AttributeGroup {
    pub name: String,
    pub offset: usize,
    pub attributes: Vec<Attribute>,
    pub attribute_groups: Vec<AttributeGroupRef>,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub compositor: Compositor,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub particles: Vec<Particle>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    /// For a `ref` attribute, the local name of the referenced declaration.
    pub name: String,
    pub reference: Option<NamespacedName>,
    pub ty: Option<NamespacedName>,
    pub inline: Option<SimpleType>,
    pub required: bool,
    pub documentation: Option<String>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct ComplexType {
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub offset: usize,
    pub derivation: Option<Derivation>,
    pub particle: Option<Group>,
    pub attributes: Vec<Attribute>,
    pub attribute_groups: Vec<AttributeGroupRef>,
}

#[derive(Debug, Clone)]
pub enum InlineType {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug, Clone)]
pub struct Element {
    /// Empty for a pure `ref` element; the referenced element supplies it.
    pub name: String,
    pub reference: Option<NamespacedName>,
    pub ty: Option<NamespacedName>,
    pub inline: Option<Box<InlineType>>,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub nillable: bool,
    pub documentation: Option<String>,
    pub offset: usize,
}

/// One `<schema>`, either a standalone XSD document or embedded in a WSDL
/// `types` section.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub location: Url,
    pub target_namespace: String,
    pub simple_types: Vec<SimpleType>,
    pub complex_types: Vec<ComplexType>,
    pub elements: Vec<Element>,
    pub attributes: Vec<Attribute>,
    pub groups: Vec<ModelGroup>,
    pub attribute_groups: Vec<AttributeGroup>,
    pub imports: Vec<Import>,
}

#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub element: Option<NamespacedName>,
    pub ty: Option<NamespacedName>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: NamespacedName,
    pub parts: Vec<Part>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Fault {
    pub name: String,
    pub message: NamespacedName,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub documentation: Option<String>,
    pub input: Option<NamespacedName>,
    pub output: Option<NamespacedName>,
    pub faults: Vec<Fault>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct PortType {
    pub name: NamespacedName,
    pub documentation: Option<String>,
    pub operations: Vec<Operation>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct BindingOperation {
    pub name: String,
    pub action: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: NamespacedName,
    pub ty: NamespacedName,
    pub operations: Vec<BindingOperation>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub binding: NamespacedName,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: NamespacedName,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone)]
pub struct Definition {
    pub location: Url,
    pub target_namespace: String,
    pub imports: Vec<Import>,
    pub messages: Vec<Message>,
    pub port_types: Vec<PortType>,
    pub bindings: Vec<Binding>,
    pub services: Vec<Service>,
}

/// Everything one fetched document contributed.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub location: Url,
    pub definition: Option<Definition>,
    pub schemas: Vec<SchemaDocument>,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        XSD_NAMESPACES.contains(&self.namespace.as_str())
            || self.namespace == SOAP_ENCODING_NAMESPACE
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}

impl MaxOccurs {
    pub fn is_many(self) -> bool {
        match self {
            MaxOccurs::Bounded(count) => count > 1,
            MaxOccurs::Unbounded => true,
        }
    }
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl SchemaDocument {
    pub fn new(location: Url, target_namespace: String) -> Self {
        Self {
            location,
            target_namespace,
            simple_types: Vec::new(),
            complex_types: Vec::new(),
            elements: Vec::new(),
            attributes: Vec::new(),
            groups: Vec::new(),
            attribute_groups: Vec::new(),
            imports: Vec::new(),
        }
    }
}

impl Definition {
    pub fn new(location: Url, target_namespace: String) -> Self {
        Self {
            location,
            target_namespace,
            imports: Vec::new(),
            messages: Vec::new(),
            port_types: Vec::new(),
            bindings: Vec::new(),
            services: Vec::new(),
        }
    }
}
