use quick_xml::{
    events::{attributes::Attributes, BytesStart, BytesText, Event},
    Reader,
};
use std::io::BufRead;
use tracing::debug;
use url::Url;

use super::{
    error,
    types::{
        Attribute, AttributeGroup, AttributeGroupRef, Binding, BindingOperation, ComplexType,
        Compositor, ContentKind, Definition, Derivation, DerivationMethod, Element, Enumeration,
        Fault, Group, GroupRef, Import, ImportKind, InlineType, MaxOccurs, Message, ModelGroup,
        NamespacedName, Operation, ParsedDocument, Part, Particle, Port, PortType,
        SchemaDocument, Service, SimpleType, SimpleTypeKind, XML_NAMESPACE,
    },
};

/// Problem found while handling one event; turned into
/// [`error::Error::MalformedDocument`] once the offset is known.
#[derive(Debug)]
struct Malformed(String);

impl From<quick_xml::Error> for Malformed {
    fn from(err: quick_xml::Error) -> Self {
        Malformed(err.to_string())
    }
}

pub(crate) fn get_attributes<B: BufRead, const N: usize>(
    reader: &Reader<B>,
    attributes: Attributes<'_>,
    names: [&'static str; N],
) -> Result<[Option<String>; N], quick_xml::Error> {
    const INIT: Option<String> = None;
    let mut result = [INIT; N];

    for attribute in attributes {
        let attribute = attribute?;
        let key = reader.decode(attribute.key)?;

        for (index, name) in names.iter().enumerate() {
            if key == *name {
                result[index] = Some(attribute.unescape_and_decode_value(reader)?);
                break;
            }
        }
    }

    Ok(result)
}

fn split_namespaced_name(prefixed_name: &str) -> (Option<&str>, &str) {
    match prefixed_name.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, prefixed_name),
    }
}

fn required(value: Option<String>, attribute: &str, element: &str) -> Result<String, Malformed> {
    value.ok_or_else(|| {
        Malformed(format!(
            "<{}> is missing the required `{}` attribute",
            element, attribute
        ))
    })
}

fn parse_min_occurs(value: Option<String>) -> Result<u32, Malformed> {
    match value {
        None => Ok(1),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Malformed(format!("invalid minOccurs `{}`", value))),
    }
}

fn parse_max_occurs(value: Option<String>) -> Result<MaxOccurs, Malformed> {
    match value.as_deref().map(str::trim) {
        None => Ok(MaxOccurs::Bounded(1)),
        Some("unbounded") => Ok(MaxOccurs::Unbounded),
        Some(count) => count
            .parse()
            .map(MaxOccurs::Bounded)
            .map_err(|_| Malformed(format!("invalid maxOccurs `{}`", count))),
    }
}

fn compositor(local_name: &str) -> Option<Compositor> {
    match local_name {
        "sequence" => Some(Compositor::Sequence),
        "choice" => Some(Compositor::Choice),
        "all" => Some(Compositor::All),
        _ => None,
    }
}

/// Prefix declarations made on one element.
type Scope = Vec<(Option<String>, String)>;

/// The body of a `simpleContent`/`complexContent` extension or restriction.
#[derive(Debug)]
struct DerivedContent {
    derivation: Derivation,
    particle: Option<Group>,
    attributes: Vec<Attribute>,
    attribute_groups: Vec<AttributeGroupRef>,
}

#[derive(Debug)]
enum ParseState {
    Definitions,
    Types,
    Schema(SchemaDocument),

    SimpleType(SimpleType),
    Restriction {
        base: Option<NamespacedName>,
        inline_base: Option<Box<SimpleType>>,
        enumeration: Vec<Enumeration>,
    },
    Enumeration(Enumeration),
    List {
        item: Option<NamespacedName>,
        inline_item: Option<Box<SimpleType>>,
    },
    Union {
        members: Vec<NamespacedName>,
    },

    ComplexType(ComplexType),
    Content {
        kind: ContentKind,
        derived: Option<DerivedContent>,
    },
    Derivation(DerivedContent),
    Group(Group),
    GroupRef(GroupRef),
    ModelGroup(ModelGroup),
    Element(Element),
    Attribute(Attribute),
    AttributeGroup(AttributeGroup),
    AttributeGroupRef(AttributeGroupRef),

    Annotation(Option<String>),
    Documentation(String),

    Message(Message),
    PortType(PortType),
    Operation(Operation),
    Fault(Fault),
    Binding(Binding),
    BindingOperation(BindingOperation),
    Service(Service),
    Port(Port),

    Other(String),
}

struct Parser<'u> {
    location: &'u Url,
    scopes: Vec<Scope>,
    target: Vec<String>,

    definition: Option<Definition>,
    schemas: Vec<SchemaDocument>,
}

impl ParseState {
    fn describe(&self) -> &str {
        match self {
            ParseState::Definitions => "definitions",
            ParseState::Types => "types",
            ParseState::Schema(_) => "schema",
            ParseState::SimpleType(_) => "simpleType",
            ParseState::Restriction { .. } => "restriction",
            ParseState::Enumeration(_) => "enumeration",
            ParseState::List { .. } => "list",
            ParseState::Union { .. } => "union",
            ParseState::ComplexType(_) => "complexType",
            ParseState::Content { .. } => "content",
            ParseState::Derivation(_) => "derivation",
            ParseState::Group(_) => "compositor",
            ParseState::GroupRef(_) | ParseState::ModelGroup(_) => "group",
            ParseState::Element(_) => "element",
            ParseState::Attribute(_) => "attribute",
            ParseState::AttributeGroup(_) | ParseState::AttributeGroupRef(_) => "attributeGroup",
            ParseState::Annotation(_) => "annotation",
            ParseState::Documentation(_) => "documentation",
            ParseState::Message(_) => "message",
            ParseState::PortType(_) => "portType",
            ParseState::Operation(_) => "operation",
            ParseState::Fault(_) => "fault",
            ParseState::Binding(_) => "binding",
            ParseState::BindingOperation(_) => "binding operation",
            ParseState::Service(_) => "service",
            ParseState::Port(_) => "port",
            ParseState::Other(name) => name,
        }
    }

    fn set_documentation(&mut self, text: String) {
        let slot = match self {
            ParseState::SimpleType(SimpleType { documentation, .. })
            | ParseState::ComplexType(ComplexType { documentation, .. })
            | ParseState::ModelGroup(ModelGroup { documentation, .. })
            | ParseState::Element(Element { documentation, .. })
            | ParseState::Attribute(Attribute { documentation, .. })
            | ParseState::Enumeration(Enumeration { documentation, .. })
            | ParseState::PortType(PortType { documentation, .. })
            | ParseState::Operation(Operation { documentation, .. })
            | ParseState::Fault(Fault { documentation, .. }) => documentation,
            ParseState::Annotation(documentation) => documentation,
            _ => return,
        };

        match slot {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&text);
            }
            None => *slot = Some(text),
        }
    }
}

impl<'u> Parser<'u> {
    fn new(location: &'u Url) -> Self {
        Self {
            location,
            scopes: Vec::new(),
            target: Vec::new(),
            definition: None,
            schemas: Vec::new(),
        }
    }

    fn target_namespace(&self) -> String {
        self.target.last().cloned().unwrap_or_default()
    }

    fn lookup_prefix(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }

        self.scopes.iter().rev().find_map(|scope| {
            scope
                .iter()
                .find(|(declared, _)| declared.as_deref() == prefix)
                .map(|(_, namespace)| namespace.as_str())
        })
    }

    fn resolve_namespace(&self, prefixed_name: &str) -> Result<NamespacedName, Malformed> {
        let (prefix, local_name) = split_namespaced_name(prefixed_name.trim());

        match (prefix, self.lookup_prefix(prefix)) {
            (_, Some(namespace)) => Ok(NamespacedName::new(namespace, local_name)),
            (None, None) => Ok(NamespacedName::new("", local_name)),
            (Some(prefix), None) => Err(Malformed(format!(
                "undeclared namespace prefix `{}` in `{}`",
                prefix, prefixed_name
            ))),
        }
    }

    fn resolve_optional(&self, name: Option<String>) -> Result<Option<NamespacedName>, Malformed> {
        name.map(|name| self.resolve_namespace(&name)).transpose()
    }

    fn target_namespaced(&self, name: String) -> NamespacedName {
        NamespacedName::new(self.target_namespace(), name)
    }

    fn parse<B: BufRead>(mut self, mut reader: Reader<B>) -> Result<ParsedDocument, error::Error> {
        reader.trim_text(true);

        let mut stack = Vec::new();
        let mut buffer = Vec::new();

        loop {
            let offset = reader.buffer_position();
            let event = reader
                .read_event(&mut buffer)
                .map_err(|err| self.malformed(offset, err.into()))?;

            let result = match event {
                Event::Start(start) => self.handle_start(&mut stack, &reader, &start, offset),
                Event::End(..) => self.handle_end(&mut stack),

                Event::Empty(start) => self
                    .handle_start(&mut stack, &reader, &start, offset)
                    .and_then(|()| self.handle_end(&mut stack)),

                Event::Text(text) => self.handle_text(&mut stack, &reader, &text),

                Event::Eof => break,

                _ => Ok(()),
            };

            result.map_err(|err| self.malformed(offset, err))?;
            buffer.clear();
        }

        if !stack.is_empty() {
            let offset = reader.buffer_position();
            return Err(self.malformed(offset, Malformed("unexpected end of document".into())));
        }

        if self.definition.is_none() && self.schemas.is_empty() {
            return Err(self.malformed(
                0,
                Malformed("document is neither a WSDL definition nor an XML schema".into()),
            ));
        }

        Ok(ParsedDocument {
            location: self.location.clone(),
            definition: self.definition,
            schemas: self.schemas,
        })
    }

    fn malformed(&self, offset: usize, err: Malformed) -> error::Error {
        error::Error::MalformedDocument {
            document: self.location.clone(),
            offset,
            message: err.0,
        }
    }

    fn handle_start<B: BufRead>(
        &mut self,
        stack: &mut Vec<ParseState>,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<(), Malformed> {
        let local_name = reader.decode(start.local_name())?.to_owned();

        let mut scope = Scope::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = reader.decode(attribute.key)?;

            let prefix = match split_namespaced_name(key) {
                (None, "xmlns") => None,
                (Some("xmlns"), prefix) => Some(prefix.to_owned()),
                _ => continue,
            };

            scope.push((prefix, attribute.unescape_and_decode_value(reader)?));
        }
        self.scopes.push(scope);

        let mut new_state = ParseState::Other(local_name.clone());

        match stack.last_mut() {
            None => match local_name.as_str() {
                "definitions" => {
                    let [namespace] =
                        get_attributes(reader, start.attributes(), ["targetNamespace"])?;
                    let namespace = namespace.unwrap_or_default();

                    self.definition = Some(Definition::new(self.location.clone(), namespace.clone()));
                    self.target.push(namespace);
                    new_state = ParseState::Definitions;
                }

                "schema" => new_state = self.start_schema(reader, start, None)?,

                other => {
                    return Err(Malformed(format!(
                        "unexpected root element <{}>, expected <definitions> or <schema>",
                        other
                    )))
                }
            },

            Some(ParseState::Definitions) => match local_name.as_str() {
                "import" => {
                    let [location, namespace] =
                        get_attributes(reader, start.attributes(), ["location", "namespace"])?;

                    if let Some(definition) = self.definition.as_mut() {
                        definition.imports.push(Import {
                            kind: ImportKind::Import,
                            namespace,
                            location,
                        });
                    }
                }

                "types" => new_state = ParseState::Types,

                "documentation" => new_state = ParseState::Documentation(String::new()),

                "message" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;
                    let name = required(name, "name", "message")?;

                    new_state = ParseState::Message(Message {
                        name: self.target_namespaced(name),
                        parts: Vec::new(),
                        offset,
                    });
                }

                "portType" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;
                    let name = required(name, "name", "portType")?;

                    new_state = ParseState::PortType(PortType {
                        name: self.target_namespaced(name),
                        documentation: None,
                        operations: Vec::new(),
                        offset,
                    });
                }

                "binding" => {
                    let [name, ty] = get_attributes(reader, start.attributes(), ["name", "type"])?;
                    let name = required(name, "name", "binding")?;
                    let ty = self.resolve_namespace(&required(ty, "type", "binding")?)?;

                    new_state = ParseState::Binding(Binding {
                        name: self.target_namespaced(name),
                        ty,
                        operations: Vec::new(),
                        offset,
                    });
                }

                "service" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;
                    let name = required(name, "name", "service")?;

                    new_state = ParseState::Service(Service {
                        name: self.target_namespaced(name),
                        ports: Vec::new(),
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside definitions"),
            },

            Some(ParseState::Types) => match local_name.as_str() {
                "schema" => {
                    let fallback = self.target_namespace();
                    new_state = self.start_schema(reader, start, Some(fallback))?;
                }

                _ => debug!(element = %local_name, "ignoring element inside types"),
            },

            Some(ParseState::Schema(schema)) => match local_name.as_str() {
                "import" | "include" | "redefine" => {
                    let [location, namespace] = get_attributes(
                        reader,
                        start.attributes(),
                        ["schemaLocation", "namespace"],
                    )?;

                    let kind = if local_name == "import" {
                        ImportKind::Import
                    } else {
                        ImportKind::Include
                    };

                    schema.imports.push(Import {
                        kind,
                        namespace,
                        location,
                    });
                }

                "simpleType" => new_state = self.start_simple_type(reader, start, offset)?,
                "complexType" => new_state = self.start_complex_type(reader, start, offset)?,
                "element" => new_state = self.start_element(reader, start, offset)?,
                "attribute" => new_state = self.start_attribute(reader, start, offset)?,
                "annotation" => new_state = ParseState::Annotation(None),

                "group" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::ModelGroup(ModelGroup {
                        name: required(name, "name", "group")?,
                        documentation: None,
                        offset,
                        particle: None,
                    });
                }

                "attributeGroup" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::AttributeGroup(AttributeGroup {
                        name: required(name, "name", "attributeGroup")?,
                        offset,
                        attributes: Vec::new(),
                        attribute_groups: Vec::new(),
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside schema"),
            },

            Some(ParseState::SimpleType(_)) => match local_name.as_str() {
                "restriction" => {
                    let [base] = get_attributes(reader, start.attributes(), ["base"])?;

                    new_state = ParseState::Restriction {
                        base: self.resolve_optional(base)?,
                        inline_base: None,
                        enumeration: Vec::new(),
                    };
                }

                "list" => {
                    let [item] = get_attributes(reader, start.attributes(), ["itemType"])?;

                    new_state = ParseState::List {
                        item: self.resolve_optional(item)?,
                        inline_item: None,
                    };
                }

                "union" => {
                    let [members] = get_attributes(reader, start.attributes(), ["memberTypes"])?;

                    let members = members
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(|member| self.resolve_namespace(member))
                        .collect::<Result<Vec<_>, _>>()?;

                    new_state = ParseState::Union { members };
                }

                "annotation" => new_state = ParseState::Annotation(None),

                _ => debug!(element = %local_name, "ignoring element inside simpleType"),
            },

            Some(ParseState::Restriction { .. }) => match local_name.as_str() {
                "enumeration" => {
                    let [value] = get_attributes(reader, start.attributes(), ["value"])?;

                    new_state = ParseState::Enumeration(Enumeration {
                        value: required(value, "value", "enumeration")?,
                        documentation: None,
                    });
                }

                "simpleType" => new_state = self.start_simple_type(reader, start, offset)?,

                _ => debug!(facet = %local_name, "ignoring restriction facet"),
            },

            Some(ParseState::List { .. }) | Some(ParseState::Union { .. }) => {
                if local_name == "simpleType" {
                    new_state = self.start_simple_type(reader, start, offset)?;
                }
            }

            Some(ParseState::Enumeration(_))
            | Some(ParseState::Attribute(_))
            | Some(ParseState::Element(_))
            | Some(ParseState::ComplexType(_))
            | Some(ParseState::ModelGroup(_))
            | Some(ParseState::Derivation(_))
            | Some(ParseState::Operation(_))
            | Some(ParseState::Fault(_))
            | Some(ParseState::PortType(_))
                if local_name == "annotation" || local_name == "documentation" =>
            {
                new_state = if local_name == "annotation" {
                    ParseState::Annotation(None)
                } else {
                    ParseState::Documentation(String::new())
                };
            }

            Some(ParseState::Element(_)) => match local_name.as_str() {
                "complexType" => new_state = self.start_complex_type(reader, start, offset)?,
                "simpleType" => new_state = self.start_simple_type(reader, start, offset)?,

                _ => debug!(element = %local_name, "ignoring element inside element"),
            },

            Some(ParseState::Attribute(_)) => {
                if local_name == "simpleType" {
                    new_state = self.start_simple_type(reader, start, offset)?;
                }
            }

            Some(ParseState::ComplexType(_)) => match local_name.as_str() {
                "simpleContent" => {
                    new_state = ParseState::Content {
                        kind: ContentKind::Simple,
                        derived: None,
                    }
                }

                "complexContent" => {
                    new_state = ParseState::Content {
                        kind: ContentKind::Complex,
                        derived: None,
                    }
                }

                "attribute" => new_state = self.start_attribute(reader, start, offset)?,
                "attributeGroup" => new_state = self.start_attribute_group_ref(reader, start, offset)?,
                "group" => new_state = self.start_group_ref(reader, start, offset)?,

                other => match compositor(other) {
                    Some(compositor) => new_state = self.start_group(reader, start, compositor)?,
                    None => debug!(element = %local_name, "ignoring element inside complexType"),
                },
            },

            Some(ParseState::ModelGroup(_)) => match compositor(&local_name) {
                Some(compositor) => new_state = self.start_group(reader, start, compositor)?,
                None => debug!(element = %local_name, "ignoring element inside group"),
            },

            Some(ParseState::AttributeGroup(_)) => match local_name.as_str() {
                "attribute" => new_state = self.start_attribute(reader, start, offset)?,
                "attributeGroup" => new_state = self.start_attribute_group_ref(reader, start, offset)?,

                _ => debug!(element = %local_name, "ignoring element inside attributeGroup"),
            },

            Some(ParseState::Content { kind, .. }) => match local_name.as_str() {
                "extension" | "restriction" => {
                    let [base] = get_attributes(reader, start.attributes(), ["base"])?;
                    let base = self.resolve_namespace(&required(base, "base", &local_name)?)?;

                    let method = if local_name == "extension" {
                        DerivationMethod::Extension
                    } else {
                        DerivationMethod::Restriction
                    };

                    new_state = ParseState::Derivation(DerivedContent {
                        derivation: Derivation {
                            method,
                            content: *kind,
                            base,
                        },
                        particle: None,
                        attributes: Vec::new(),
                        attribute_groups: Vec::new(),
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside content"),
            },

            Some(ParseState::Derivation(_)) => match local_name.as_str() {
                "attribute" => new_state = self.start_attribute(reader, start, offset)?,
                "attributeGroup" => new_state = self.start_attribute_group_ref(reader, start, offset)?,
                "group" => new_state = self.start_group_ref(reader, start, offset)?,

                other => match compositor(other) {
                    Some(compositor) => new_state = self.start_group(reader, start, compositor)?,
                    None => debug!(element = %local_name, "ignoring element inside derivation"),
                },
            },

            Some(ParseState::Group(group)) => match local_name.as_str() {
                "element" => new_state = self.start_element(reader, start, offset)?,
                "group" => new_state = self.start_group_ref(reader, start, offset)?,

                "any" => {
                    let [max_occurs] = get_attributes(reader, start.attributes(), ["maxOccurs"])?;

                    group.particles.push(Particle::Any {
                        max_occurs: parse_max_occurs(max_occurs)?,
                    });
                }

                other => match compositor(other) {
                    Some(compositor) => new_state = self.start_group(reader, start, compositor)?,
                    None => debug!(element = %local_name, "ignoring element inside group"),
                },
            },

            Some(ParseState::Message(message)) => match local_name.as_str() {
                "part" => {
                    let [name, element, ty] =
                        get_attributes(reader, start.attributes(), ["name", "element", "type"])?;

                    let part = Part {
                        name: required(name, "name", "part")?,
                        element: self.resolve_optional(element)?,
                        ty: self.resolve_optional(ty)?,
                    };

                    message.parts.push(part);
                }

                _ => debug!(element = %local_name, "ignoring element inside message"),
            },

            Some(ParseState::PortType(_)) => match local_name.as_str() {
                "operation" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::Operation(Operation {
                        name: required(name, "name", "operation")?,
                        documentation: None,
                        input: None,
                        output: None,
                        faults: Vec::new(),
                        offset,
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside portType"),
            },

            Some(ParseState::Operation(operation)) => match local_name.as_str() {
                "input" | "output" => {
                    let [message] = get_attributes(reader, start.attributes(), ["message"])?;
                    let message = self.resolve_namespace(&required(message, "message", &local_name)?)?;

                    if local_name == "input" {
                        operation.input = Some(message);
                    } else {
                        operation.output = Some(message);
                    }
                }

                "fault" => {
                    let [name, message] =
                        get_attributes(reader, start.attributes(), ["name", "message"])?;

                    new_state = ParseState::Fault(Fault {
                        name: required(name, "name", "fault")?,
                        message: self.resolve_namespace(&required(message, "message", "fault")?)?,
                        documentation: None,
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside operation"),
            },

            Some(ParseState::Binding(_)) => match local_name.as_str() {
                "operation" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::BindingOperation(BindingOperation {
                        name: required(name, "name", "operation")?,
                        action: None,
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside binding"),
            },

            Some(ParseState::BindingOperation(operation)) => {
                if local_name == "operation" {
                    let [action] = get_attributes(reader, start.attributes(), ["soapAction"])?;

                    if operation.action.is_none() {
                        operation.action = action;
                    }
                }
            }

            Some(ParseState::Service(_)) => match local_name.as_str() {
                "port" => {
                    let [name, binding] =
                        get_attributes(reader, start.attributes(), ["name", "binding"])?;

                    new_state = ParseState::Port(Port {
                        name: required(name, "name", "port")?,
                        binding: self.resolve_namespace(&required(binding, "binding", "port")?)?,
                        location: None,
                    });
                }

                _ => debug!(element = %local_name, "ignoring element inside service"),
            },

            Some(ParseState::Port(port)) => {
                if local_name == "address" {
                    let [location] = get_attributes(reader, start.attributes(), ["location"])?;
                    port.location = location;
                }
            }

            Some(ParseState::Annotation(_)) => {
                if local_name == "documentation" {
                    new_state = ParseState::Documentation(String::new());
                }
            }

            Some(state @ ParseState::Enumeration(_))
            | Some(state @ ParseState::GroupRef(_))
            | Some(state @ ParseState::AttributeGroupRef(_))
            | Some(state @ ParseState::Fault(_))
            | Some(state @ ParseState::Documentation(_))
            | Some(state @ ParseState::Other(_)) => {
                debug!(element = %local_name, parent = state.describe(), "ignoring element");
            }
        }

        stack.push(new_state);
        Ok(())
    }

    fn start_schema<B: BufRead>(
        &mut self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        fallback_namespace: Option<String>,
    ) -> Result<ParseState, Malformed> {
        let [namespace] = get_attributes(reader, start.attributes(), ["targetNamespace"])?;
        let namespace = namespace.or(fallback_namespace).unwrap_or_default();

        self.target.push(namespace.clone());
        Ok(ParseState::Schema(SchemaDocument::new(
            self.location.clone(),
            namespace,
        )))
    }

    fn start_simple_type<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [name] = get_attributes(reader, start.attributes(), ["name"])?;

        Ok(ParseState::SimpleType(SimpleType {
            name,
            documentation: None,
            offset,
            kind: SimpleTypeKind::Empty,
        }))
    }

    fn start_complex_type<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [name] = get_attributes(reader, start.attributes(), ["name"])?;

        Ok(ParseState::ComplexType(ComplexType {
            name,
            documentation: None,
            offset,
            derivation: None,
            particle: None,
            attributes: Vec::new(),
            attribute_groups: Vec::new(),
        }))
    }

    fn start_group<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        compositor: Compositor,
    ) -> Result<ParseState, Malformed> {
        let [min_occurs, max_occurs] =
            get_attributes(reader, start.attributes(), ["minOccurs", "maxOccurs"])?;

        Ok(ParseState::Group(Group {
            compositor,
            min_occurs: parse_min_occurs(min_occurs)?,
            max_occurs: parse_max_occurs(max_occurs)?,
            particles: Vec::new(),
        }))
    }

    fn start_element<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [name, reference, ty, min_occurs, max_occurs, nillable] = get_attributes(
            reader,
            start.attributes(),
            ["name", "ref", "type", "minOccurs", "maxOccurs", "nillable"],
        )?;

        let reference = self.resolve_optional(reference)?;
        if name.is_none() && reference.is_none() {
            return Err(Malformed(
                "<element> needs either a `name` or a `ref` attribute".into(),
            ));
        }

        Ok(ParseState::Element(Element {
            name: name.unwrap_or_default(),
            reference,
            ty: self.resolve_optional(ty)?,
            inline: None,
            min_occurs: parse_min_occurs(min_occurs)?,
            max_occurs: parse_max_occurs(max_occurs)?,
            nillable: nillable.as_deref().map(str::trim) == Some("true"),
            documentation: None,
            offset,
        }))
    }

    fn start_attribute<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [name, reference, ty, usage] =
            get_attributes(reader, start.attributes(), ["name", "ref", "type", "use"])?;

        let reference = self.resolve_optional(reference)?;
        let name = match (name, &reference) {
            (Some(name), _) => name,
            (None, Some(reference)) => reference.name.clone(),
            (None, None) => {
                return Err(Malformed(
                    "<attribute> needs either a `name` or a `ref` attribute".into(),
                ))
            }
        };

        Ok(ParseState::Attribute(Attribute {
            name,
            reference,
            ty: self.resolve_optional(ty)?,
            inline: None,
            required: usage.as_deref() == Some("required"),
            documentation: None,
            offset,
        }))
    }

    fn start_group_ref<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [reference, min_occurs, max_occurs] =
            get_attributes(reader, start.attributes(), ["ref", "minOccurs", "maxOccurs"])?;

        Ok(ParseState::GroupRef(GroupRef {
            reference: self.resolve_namespace(&required(reference, "ref", "group")?)?,
            min_occurs: parse_min_occurs(min_occurs)?,
            max_occurs: parse_max_occurs(max_occurs)?,
            offset,
        }))
    }

    fn start_attribute_group_ref<B: BufRead>(
        &self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        offset: usize,
    ) -> Result<ParseState, Malformed> {
        let [reference] = get_attributes(reader, start.attributes(), ["ref"])?;

        Ok(ParseState::AttributeGroupRef(AttributeGroupRef {
            reference: self.resolve_namespace(&required(reference, "ref", "attributeGroup")?)?,
            offset,
        }))
    }

    fn handle_end(&mut self, stack: &mut Vec<ParseState>) -> Result<(), Malformed> {
        self.scopes.pop();

        let finished_state = stack
            .pop()
            .ok_or_else(|| Malformed("closing tag without an open element".into()))?;
        let next_state = stack.last_mut();

        match finished_state {
            ParseState::Definitions => {
                self.target.pop();
            }

            ParseState::Schema(schema) => {
                self.target.pop();
                self.schemas.push(schema);
            }

            ParseState::SimpleType(simple_type) => match next_state {
                Some(ParseState::Schema(schema)) => {
                    if simple_type.name.is_none() {
                        return Err(Malformed("top-level <simpleType> without a name".into()));
                    }
                    schema.simple_types.push(simple_type);
                }

                Some(ParseState::Element(element)) => {
                    element.inline = Some(Box::new(InlineType::Simple(simple_type)))
                }

                Some(ParseState::Attribute(attribute)) => attribute.inline = Some(simple_type),

                Some(ParseState::Restriction { inline_base, .. }) => {
                    *inline_base = Some(Box::new(simple_type))
                }

                Some(ParseState::List { inline_item, .. }) => {
                    *inline_item = Some(Box::new(simple_type))
                }

                _ => (),
            },

            ParseState::Restriction {
                base,
                inline_base,
                enumeration,
            } => {
                if let Some(ParseState::SimpleType(simple_type)) = next_state {
                    simple_type.kind = SimpleTypeKind::Restriction {
                        base,
                        inline_base,
                        enumeration,
                    };
                }
            }

            ParseState::List { item, inline_item } => {
                if let Some(ParseState::SimpleType(simple_type)) = next_state {
                    simple_type.kind = SimpleTypeKind::List { item, inline_item };
                }
            }

            ParseState::Union { members } => {
                if let Some(ParseState::SimpleType(simple_type)) = next_state {
                    simple_type.kind = SimpleTypeKind::Union { members };
                }
            }

            ParseState::Enumeration(value) => {
                if let Some(ParseState::Restriction { enumeration, .. }) = next_state {
                    enumeration.push(value);
                }
            }

            ParseState::ComplexType(complex_type) => match next_state {
                Some(ParseState::Schema(schema)) => {
                    if complex_type.name.is_none() {
                        return Err(Malformed("top-level <complexType> without a name".into()));
                    }
                    schema.complex_types.push(complex_type);
                }

                Some(ParseState::Element(element)) => {
                    element.inline = Some(Box::new(InlineType::Complex(complex_type)))
                }

                _ => (),
            },

            ParseState::Content { derived, .. } => {
                if let (Some(ParseState::ComplexType(complex_type)), Some(derived)) =
                    (next_state, derived)
                {
                    complex_type.derivation = Some(derived.derivation);
                    if derived.particle.is_some() {
                        complex_type.particle = derived.particle;
                    }
                    complex_type.attributes.extend(derived.attributes);
                    complex_type.attribute_groups.extend(derived.attribute_groups);
                }
            }

            ParseState::Derivation(content) => {
                if let Some(ParseState::Content { derived, .. }) = next_state {
                    *derived = Some(content);
                }
            }

            ParseState::Group(group) => match next_state {
                Some(ParseState::ComplexType(ComplexType { particle, .. }))
                | Some(ParseState::Derivation(DerivedContent { particle, .. }))
                | Some(ParseState::ModelGroup(ModelGroup { particle, .. })) => *particle = Some(group),

                Some(ParseState::Group(parent)) => parent.particles.push(Particle::Group(group)),

                _ => (),
            },

            ParseState::GroupRef(group_ref) => match next_state {
                // A reference standing in for the whole content model.
                Some(ParseState::ComplexType(ComplexType { particle, .. }))
                | Some(ParseState::Derivation(DerivedContent { particle, .. })) => {
                    *particle = Some(Group {
                        compositor: Compositor::Sequence,
                        min_occurs: 1,
                        max_occurs: MaxOccurs::Bounded(1),
                        particles: vec![Particle::GroupRef(group_ref)],
                    })
                }

                Some(ParseState::Group(parent)) => parent.particles.push(Particle::GroupRef(group_ref)),

                _ => (),
            },

            ParseState::ModelGroup(group) => {
                if let Some(ParseState::Schema(schema)) = next_state {
                    schema.groups.push(group);
                }
            }

            ParseState::AttributeGroup(group) => {
                if let Some(ParseState::Schema(schema)) = next_state {
                    schema.attribute_groups.push(group);
                }
            }

            ParseState::AttributeGroupRef(group_ref) => match next_state {
                Some(ParseState::ComplexType(ComplexType { attribute_groups, .. }))
                | Some(ParseState::Derivation(DerivedContent { attribute_groups, .. }))
                | Some(ParseState::AttributeGroup(AttributeGroup { attribute_groups, .. })) => {
                    attribute_groups.push(group_ref)
                }

                _ => (),
            },

            ParseState::Element(element) => match next_state {
                Some(ParseState::Schema(schema)) => {
                    if element.name.is_empty() {
                        return Err(Malformed("top-level <element> without a name".into()));
                    }
                    schema.elements.push(element);
                }

                Some(ParseState::Group(group)) => group.particles.push(Particle::Element(element)),

                _ => (),
            },

            ParseState::Attribute(attribute) => match next_state {
                Some(ParseState::ComplexType(ComplexType { attributes, .. }))
                | Some(ParseState::Derivation(DerivedContent { attributes, .. }))
                | Some(ParseState::AttributeGroup(AttributeGroup { attributes, .. })) => {
                    attributes.push(attribute)
                }

                Some(ParseState::Schema(schema)) => {
                    if attribute.reference.is_some() {
                        return Err(Malformed("top-level <attribute> without a name".into()));
                    }
                    schema.attributes.push(attribute);
                }

                _ => (),
            },

            ParseState::Annotation(Some(text)) | ParseState::Documentation(text) => {
                if let Some(state) = next_state {
                    if !text.is_empty() {
                        state.set_documentation(text);
                    }
                }
            }

            ParseState::Message(message) => {
                if let Some(definition) = self.definition.as_mut() {
                    definition.messages.push(message);
                }
            }

            ParseState::PortType(port_type) => {
                if let Some(definition) = self.definition.as_mut() {
                    definition.port_types.push(port_type);
                }
            }

            ParseState::Operation(operation) => {
                if let Some(ParseState::PortType(port_type)) = next_state {
                    port_type.operations.push(operation);
                }
            }

            ParseState::Fault(fault) => {
                if let Some(ParseState::Operation(operation)) = next_state {
                    operation.faults.push(fault);
                }
            }

            ParseState::Binding(binding) => {
                if let Some(definition) = self.definition.as_mut() {
                    definition.bindings.push(binding);
                }
            }

            ParseState::BindingOperation(operation) => {
                if let Some(ParseState::Binding(binding)) = next_state {
                    binding.operations.push(operation);
                }
            }

            ParseState::Service(service) => {
                if let Some(definition) = self.definition.as_mut() {
                    definition.services.push(service);
                }
            }

            ParseState::Port(port) => {
                if let Some(ParseState::Service(service)) = next_state {
                    service.ports.push(port);
                }
            }

            ParseState::Types | ParseState::Annotation(None) | ParseState::Other(_) => (),
        }

        Ok(())
    }

    fn handle_text<B: BufRead>(
        &mut self,
        stack: &mut [ParseState],
        reader: &Reader<B>,
        text: &BytesText<'_>,
    ) -> Result<(), Malformed> {
        if let Some(ParseState::Documentation(docs)) = stack.last_mut() {
            let unescaped = text.unescaped()?;
            let text = reader.decode(unescaped.as_ref())?.trim();

            if !text.is_empty() {
                if !docs.is_empty() {
                    docs.push(' ');
                }
                docs.push_str(text);
            }
        }

        Ok(())
    }
}

/// Parses one fetched document, WSDL or standalone XSD.
pub fn parse(location: &Url, bytes: &[u8]) -> Result<ParsedDocument, error::Error> {
    Parser::new(location).parse(Reader::from_reader(bytes))
}
