use std::collections::HashMap;

use tracing::debug;

use super::{
    error::{Error, Location},
    types::{
        Attribute, AttributeGroup, Binding, ComplexType, Definition, Element, Group, ImportKind,
        InlineType, Message, ModelGroup, NamespacedName, ParsedDocument, Particle,
        SchemaDocument, SimpleType, SimpleTypeKind,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemId {
    pub document: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeId {
    Simple(ItemId),
    Complex(ItemId),
}

#[derive(Debug, Clone, Copy)]
pub enum TypeDeclaration<'g> {
    Simple(&'g SimpleType),
    Complex(&'g ComplexType),
}

/// A global declaration together with the document declaring it, so that
/// anything expanded from it can be located.
#[derive(Debug, Clone, Copy)]
pub struct Declared<'g, T> {
    pub document: &'g SchemaDocument,
    pub item: &'g T,
}

#[derive(Debug, Clone)]
struct Entry<I> {
    id: I,
    location: Location,
}

/// Every schema and WSDL definition of one run, merged and indexed by
/// `(namespace, name)`. Immutable once built.
#[derive(Debug, Default)]
pub struct SchemaGraph {
    documents: Vec<SchemaDocument>,
    definitions: Vec<Definition>,

    types: HashMap<NamespacedName, Entry<TypeId>>,
    elements: HashMap<NamespacedName, Entry<ItemId>>,
    attributes: HashMap<NamespacedName, Entry<ItemId>>,
    groups: HashMap<NamespacedName, Entry<ItemId>>,
    attribute_groups: HashMap<NamespacedName, Entry<ItemId>>,
    messages: HashMap<NamespacedName, Entry<ItemId>>,
    port_types: HashMap<NamespacedName, Entry<ItemId>>,
    bindings: HashMap<NamespacedName, Entry<ItemId>>,
}

fn insert<I: Copy>(
    map: &mut HashMap<NamespacedName, Entry<I>>,
    key: NamespacedName,
    id: I,
    location: Location,
) -> Result<(), Error> {
    if let Some(existing) = map.get(&key) {
        return Err(Error::DuplicateTypeDeclaration {
            key,
            first: existing.location.clone(),
            second: location,
        });
    }

    map.insert(key, Entry { id, location });
    Ok(())
}

/// Qualifies the references a chameleon schema made to its own
/// declarations.
trait AdoptNamespace {
    fn adopt_namespace(&mut self, namespace: &str);
}

impl AdoptNamespace for NamespacedName {
    fn adopt_namespace(&mut self, namespace: &str) {
        if self.namespace.is_empty() {
            self.namespace = namespace.to_owned();
        }
    }
}

impl<T: AdoptNamespace> AdoptNamespace for Option<T> {
    fn adopt_namespace(&mut self, namespace: &str) {
        if let Some(inner) = self {
            inner.adopt_namespace(namespace);
        }
    }
}

impl<T: AdoptNamespace> AdoptNamespace for Box<T> {
    fn adopt_namespace(&mut self, namespace: &str) {
        (**self).adopt_namespace(namespace);
    }
}

impl<T: AdoptNamespace> AdoptNamespace for Vec<T> {
    fn adopt_namespace(&mut self, namespace: &str) {
        self.iter_mut().for_each(|item| item.adopt_namespace(namespace));
    }
}

impl AdoptNamespace for SimpleType {
    fn adopt_namespace(&mut self, namespace: &str) {
        match &mut self.kind {
            SimpleTypeKind::Restriction {
                base, inline_base, ..
            } => {
                base.adopt_namespace(namespace);
                inline_base.adopt_namespace(namespace);
            }
            SimpleTypeKind::List { item, inline_item } => {
                item.adopt_namespace(namespace);
                inline_item.adopt_namespace(namespace);
            }
            SimpleTypeKind::Union { members } => members.adopt_namespace(namespace),
            SimpleTypeKind::Empty => (),
        }
    }
}

impl AdoptNamespace for ComplexType {
    fn adopt_namespace(&mut self, namespace: &str) {
        if let Some(derivation) = &mut self.derivation {
            derivation.base.adopt_namespace(namespace);
        }
        self.particle.adopt_namespace(namespace);
        self.attributes.adopt_namespace(namespace);
        for group in &mut self.attribute_groups {
            group.reference.adopt_namespace(namespace);
        }
    }
}

impl AdoptNamespace for Group {
    fn adopt_namespace(&mut self, namespace: &str) {
        for particle in &mut self.particles {
            match particle {
                Particle::Element(element) => element.adopt_namespace(namespace),
                Particle::Group(group) => group.adopt_namespace(namespace),
                Particle::GroupRef(group) => group.reference.adopt_namespace(namespace),
                Particle::Any { .. } => (),
            }
        }
    }
}

impl AdoptNamespace for Element {
    fn adopt_namespace(&mut self, namespace: &str) {
        self.reference.adopt_namespace(namespace);
        self.ty.adopt_namespace(namespace);

        match self.inline.as_deref_mut() {
            Some(InlineType::Simple(simple)) => simple.adopt_namespace(namespace),
            Some(InlineType::Complex(complex)) => complex.adopt_namespace(namespace),
            None => (),
        }
    }
}

impl AdoptNamespace for Attribute {
    fn adopt_namespace(&mut self, namespace: &str) {
        self.reference.adopt_namespace(namespace);
        self.ty.adopt_namespace(namespace);
        self.inline.adopt_namespace(namespace);
    }
}

impl AdoptNamespace for SchemaDocument {
    fn adopt_namespace(&mut self, namespace: &str) {
        self.simple_types.adopt_namespace(namespace);
        self.complex_types.adopt_namespace(namespace);
        self.elements.adopt_namespace(namespace);
        self.attributes.adopt_namespace(namespace);

        for group in &mut self.groups {
            group.particle.adopt_namespace(namespace);
        }

        for group in &mut self.attribute_groups {
            group.attributes.adopt_namespace(namespace);
            for nested in &mut group.attribute_groups {
                nested.reference.adopt_namespace(namespace);
            }
        }
    }
}

impl SchemaGraph {
    /// Merges parsed documents, in load order, into one graph.
    pub fn build(parsed: Vec<ParsedDocument>) -> Result<Self, Error> {
        let mut graph = Self::default();

        for document in parsed {
            graph.documents.extend(document.schemas);
            graph.definitions.extend(document.definition);
        }

        graph.adopt_chameleon_includes();

        for (document_index, document) in graph.documents.iter().enumerate() {
            let location = |offset| Location {
                document: document.location.clone(),
                offset,
            };
            let key = |name: &str| NamespacedName::new(document.target_namespace.clone(), name);

            for (index, simple_type) in document.simple_types.iter().enumerate() {
                let id = TypeId::Simple(ItemId {
                    document: document_index,
                    index,
                });
                let name = simple_type.name.as_deref().unwrap_or_default();
                insert(&mut graph.types, key(name), id, location(simple_type.offset))?;
            }

            for (index, complex_type) in document.complex_types.iter().enumerate() {
                let id = TypeId::Complex(ItemId {
                    document: document_index,
                    index,
                });
                let name = complex_type.name.as_deref().unwrap_or_default();
                insert(&mut graph.types, key(name), id, location(complex_type.offset))?;
            }

            let id = |index| ItemId {
                document: document_index,
                index,
            };

            for (index, element) in document.elements.iter().enumerate() {
                insert(&mut graph.elements, key(&element.name), id(index), location(element.offset))?;
            }

            for (index, attribute) in document.attributes.iter().enumerate() {
                insert(&mut graph.attributes, key(&attribute.name), id(index), location(attribute.offset))?;
            }

            for (index, group) in document.groups.iter().enumerate() {
                insert(&mut graph.groups, key(&group.name), id(index), location(group.offset))?;
            }

            for (index, group) in document.attribute_groups.iter().enumerate() {
                insert(&mut graph.attribute_groups, key(&group.name), id(index), location(group.offset))?;
            }
        }

        for (definition_index, definition) in graph.definitions.iter().enumerate() {
            let location = |offset| Location {
                document: definition.location.clone(),
                offset,
            };
            let id = |index| ItemId {
                document: definition_index,
                index,
            };

            for (index, message) in definition.messages.iter().enumerate() {
                insert(&mut graph.messages, message.name.clone(), id(index), location(message.offset))?;
            }

            for (index, port_type) in definition.port_types.iter().enumerate() {
                insert(&mut graph.port_types, port_type.name.clone(), id(index), location(port_type.offset))?;
            }

            for (index, binding) in definition.bindings.iter().enumerate() {
                insert(&mut graph.bindings, binding.name.clone(), id(index), location(binding.offset))?;
            }
        }

        debug!(
            documents = graph.documents.len(),
            definitions = graph.definitions.len(),
            types = graph.types.len(),
            elements = graph.elements.len(),
            "schema graph built"
        );

        Ok(graph)
    }

    /// An included schema without a target namespace takes the namespace of
    /// the schema including it, along with every unqualified reference in it.
    fn adopt_chameleon_includes(&mut self) {
        loop {
            let mut adopted = Vec::new();

            for includer in &self.documents {
                if includer.target_namespace.is_empty() {
                    continue;
                }

                for import in &includer.imports {
                    let target = match (import.kind, import.location.as_deref()) {
                        (ImportKind::Include, Some(location)) => includer.location.join(location),
                        _ => continue,
                    };

                    let target = match target {
                        Ok(mut target) => {
                            target.set_fragment(None);
                            target
                        }
                        Err(_) => continue,
                    };

                    for (index, included) in self.documents.iter().enumerate() {
                        if included.location == target && included.target_namespace.is_empty() {
                            adopted.push((index, includer.target_namespace.clone()));
                        }
                    }
                }
            }

            if adopted.is_empty() {
                break;
            }

            for (index, namespace) in adopted {
                let document = &mut self.documents[index];
                debug!(document = %document.location, %namespace, "adopting namespace");

                document.adopt_namespace(&namespace);
                document.target_namespace = namespace;
            }
        }
    }

    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    fn type_id(&self, key: &NamespacedName) -> Option<TypeId> {
        self.types.get(key).map(|entry| entry.id)
    }

    pub fn type_declaration(&self, key: &NamespacedName) -> Option<TypeDeclaration<'_>> {
        self.type_id(key).map(|id| match id {
            TypeId::Simple(item) => {
                TypeDeclaration::Simple(&self.documents[item.document].simple_types[item.index])
            }
            TypeId::Complex(item) => {
                TypeDeclaration::Complex(&self.documents[item.document].complex_types[item.index])
            }
        })
    }

    pub fn element(&self, key: &NamespacedName) -> Option<&Element> {
        self.elements
            .get(key)
            .map(|entry| &self.documents[entry.id.document].elements[entry.id.index])
    }

    pub fn message(&self, key: &NamespacedName) -> Option<&Message> {
        self.messages
            .get(key)
            .map(|entry| &self.definitions[entry.id.document].messages[entry.id.index])
    }

    fn declared<'g, T>(
        &'g self,
        entry: Option<&Entry<ItemId>>,
        items: impl Fn(&'g SchemaDocument) -> &'g [T],
    ) -> Option<Declared<'g, T>> {
        entry.map(|entry| {
            let document = &self.documents[entry.id.document];
            Declared {
                document,
                item: &items(document)[entry.id.index],
            }
        })
    }

    /// A global attribute declaration.
    pub fn attribute(&self, key: &NamespacedName) -> Option<Declared<'_, Attribute>> {
        self.declared(self.attributes.get(key), |document| document.attributes.as_slice())
    }

    /// A named model group.
    pub fn group(&self, key: &NamespacedName) -> Option<Declared<'_, ModelGroup>> {
        self.declared(self.groups.get(key), |document| document.groups.as_slice())
    }

    pub fn attribute_group(&self, key: &NamespacedName) -> Option<Declared<'_, AttributeGroup>> {
        self.declared(self.attribute_groups.get(key), |document| document.attribute_groups.as_slice())
    }

    pub fn binding(&self, key: &NamespacedName) -> Option<&Binding> {
        self.bindings
            .get(key)
            .map(|entry| &self.definitions[entry.id.document].bindings[entry.id.index])
    }

    /// Bindings of every definition, in declaration order.
    pub fn all_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.definitions
            .iter()
            .flat_map(|definition| definition.bindings.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loader::tests::MemoryFetcher, loader::ImportFailure, loader::Loader, parser};
    use url::Url;

    fn graph_from(fetcher: MemoryFetcher, entry: &str) -> Result<SchemaGraph, Error> {
        let loader = Loader::with_fetcher(fetcher, ImportFailure::Abort);
        let documents = loader.load(&Url::parse(entry).unwrap())?;

        let parsed = documents
            .iter()
            .map(|document| parser::parse(&document.location, &document.bytes))
            .collect::<Result<Vec<_>, _>>()?;

        SchemaGraph::build(parsed)
    }

    #[test]
    fn duplicate_declarations_name_both_documents() {
        let a = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
            <xs:import namespace="urn:x2" schemaLocation="b.xsd"/>
            <xs:complexType name="Thing"/>
        </xs:schema>"#;
        let b = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
            <xs:simpleType name="Thing"><xs:restriction base="xs:string"/></xs:simpleType>
        </xs:schema>"#;

        let fetcher = MemoryFetcher::default()
            .with("http://host/a.xsd", a)
            .with("http://host/b.xsd", b);

        match graph_from(fetcher, "http://host/a.xsd").unwrap_err() {
            Error::DuplicateTypeDeclaration { key, first, second } => {
                assert_eq!(key, NamespacedName::new("urn:x", "Thing"));
                assert_eq!(first.document.as_str(), "http://host/a.xsd");
                assert_eq!(second.document.as_str(), "http://host/b.xsd");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn same_name_in_different_namespaces_is_fine() {
        let a = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
            <xs:import namespace="urn:b" schemaLocation="b.xsd"/>
            <xs:complexType name="Thing"/>
            <xs:element name="Thing" type="xs:string"/>
        </xs:schema>"#;
        let b = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:b">
            <xs:complexType name="Thing"/>
        </xs:schema>"#;

        let fetcher = MemoryFetcher::default()
            .with("http://host/a.xsd", a)
            .with("http://host/b.xsd", b);

        let graph = graph_from(fetcher, "http://host/a.xsd").unwrap();
        assert!(graph.type_declaration(&NamespacedName::new("urn:a", "Thing")).is_some());
        assert!(graph.type_declaration(&NamespacedName::new("urn:b", "Thing")).is_some());
        assert!(graph.element(&NamespacedName::new("urn:a", "Thing")).is_some());
    }

    #[test]
    fn chameleon_include_adopts_namespace() {
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
            <xs:include schemaLocation="parts.xsd"/>
        </xs:schema>"#;
        let parts = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:complexType name="Part"/>
        </xs:schema>"#;

        let fetcher = MemoryFetcher::default()
            .with("http://host/main.xsd", main)
            .with("http://host/parts.xsd", parts);

        let graph = graph_from(fetcher, "http://host/main.xsd").unwrap();
        assert!(matches!(
            graph.type_declaration(&NamespacedName::new("urn:main", "Part")),
            Some(TypeDeclaration::Complex(_))
        ));
    }

    #[test]
    fn chameleon_include_qualifies_its_own_references() {
        let main = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
            <xs:include schemaLocation="parts.xsd"/>
        </xs:schema>"#;
        let parts = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="Sku"><xs:restriction base="xs:string"/></xs:simpleType>
            <xs:group name="Labels">
                <xs:sequence><xs:element name="label" type="xs:string"/></xs:sequence>
            </xs:group>
            <xs:complexType name="Part">
                <xs:sequence>
                    <xs:element name="sku" type="Sku"/>
                    <xs:group ref="Labels"/>
                </xs:sequence>
            </xs:complexType>
        </xs:schema>"#;

        let fetcher = MemoryFetcher::default()
            .with("http://host/main.xsd", main)
            .with("http://host/parts.xsd", parts);

        let graph = graph_from(fetcher, "http://host/main.xsd").unwrap();
        let part = match graph.type_declaration(&NamespacedName::new("urn:main", "Part")) {
            Some(TypeDeclaration::Complex(part)) => part,
            other => panic!("unexpected declaration {:?}", other),
        };

        let particles = &part.particle.as_ref().unwrap().particles;
        match (&particles[0], &particles[1]) {
            (Particle::Element(sku), Particle::GroupRef(labels)) => {
                assert_eq!(sku.ty, Some(NamespacedName::new("urn:main", "Sku")));
                assert_eq!(labels.reference, NamespacedName::new("urn:main", "Labels"));
            }
            other => panic!("unexpected particles {:?}", other),
        }

        assert!(graph.group(&NamespacedName::new("urn:main", "Labels")).is_some());
    }

    #[test]
    fn groups_and_global_attributes_are_indexed() {
        let xsd = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
            <xs:attribute name="lang" type="xs:language"/>
            <xs:attributeGroup name="Audit">
                <xs:attribute name="createdBy" type="xs:string"/>
            </xs:attributeGroup>
            <xs:group name="Names">
                <xs:sequence><xs:element name="first" type="xs:string"/></xs:sequence>
            </xs:group>
        </xs:schema>"#;

        let fetcher = MemoryFetcher::default().with("http://host/x.xsd", xsd);
        let graph = graph_from(fetcher, "http://host/x.xsd").unwrap();

        let lang = graph.attribute(&NamespacedName::new("urn:x", "lang")).unwrap();
        assert_eq!(lang.document.location.as_str(), "http://host/x.xsd");
        assert_eq!(lang.item.name, "lang");

        let audit = graph.attribute_group(&NamespacedName::new("urn:x", "Audit")).unwrap();
        assert_eq!(audit.item.attributes.len(), 1);

        let names = graph.group(&NamespacedName::new("urn:x", "Names")).unwrap();
        assert!(names.item.particle.is_some());
        assert!(graph.group(&NamespacedName::new("urn:x", "Audit")).is_none());
    }

    #[test]
    fn duplicate_port_types_are_rejected() {
        let wsdl = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" targetNamespace="urn:x">
            <portType name="People"/>
            <portType name="People"/>
        </definitions>"#;

        let fetcher = MemoryFetcher::default().with("http://host/people.wsdl", wsdl);

        match graph_from(fetcher, "http://host/people.wsdl").unwrap_err() {
            Error::DuplicateTypeDeclaration { key, .. } => {
                assert_eq!(key, NamespacedName::new("urn:x", "People"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
