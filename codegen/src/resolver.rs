use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;
use url::Url;
use wsdlc_wsdl::{
    error::Location,
    graph::{SchemaGraph, TypeDeclaration},
    types::{
        Attribute, AttributeGroupRef, ComplexType, Compositor, ContentKind, DerivationMethod,
        Element, Enumeration, Group, GroupRef, InlineType, Message, NamespacedName, Part,
        Particle, SimpleType, SimpleTypeKind, XML_NAMESPACE,
    },
};

use super::{
    error::Error,
    naming::{self, NameTable},
    options::{NamespaceAliases, Options, Visibility},
    types::{
        Builtin, EnumConstant, Field, FieldKind, OpaqueReference, ResolvedGraph, ResolvedKind,
        ResolvedType, Shape, Target, TypeRef,
    },
};

#[derive(Clone, Copy)]
struct Scope<'a> {
    document: &'a Url,
}

impl Scope<'_> {
    fn at(&self, offset: usize) -> Location {
        Location {
            document: self.document.clone(),
            offset,
        }
    }
}

/// The struct whose fields are being collected.
struct Owner<'a> {
    name: &'a str,
    scope: Scope<'a>,
    offset: usize,
    field_names: NameTable,
}

struct Resolver<'g> {
    graph: &'g SchemaGraph,
    aliases: NamespaceAliases,
    names: NameTable,

    type_names: HashMap<NamespacedName, String>,
    element_names: HashMap<NamespacedName, String>,
    cyclic: HashSet<NamespacedName>,
    /// Model and attribute groups currently being expanded.
    expanding_groups: Vec<NamespacedName>,
    expanding_attribute_groups: Vec<NamespacedName>,

    types: Vec<ResolvedType>,
    type_indices: HashMap<NamespacedName, usize>,
    elements: HashMap<NamespacedName, TypeRef>,
    opaque: Vec<OpaqueReference>,
}

fn unresolvable(referrer: Location, key: &NamespacedName) -> Error {
    Error::UnresolvableReference {
        referrer,
        key: key.clone(),
    }
}

/// A complex type with simple content and no attributes carries nothing but
/// its base's value.
fn is_simple_alias(complex: &ComplexType) -> bool {
    let simple_content = matches!(
        &complex.derivation,
        Some(derivation) if derivation.content == ContentKind::Simple
    );

    simple_content && complex.attributes.is_empty() && complex.attribute_groups.is_empty()
}

fn enum_constants(ty: &str, values: &[Enumeration]) -> Result<Vec<EnumConstant>, Error> {
    let mut constants: Vec<EnumConstant> = Vec::new();

    for enumeration in values {
        if constants.iter().any(|constant| constant.value == enumeration.value) {
            continue;
        }

        let name = naming::variant_name(&enumeration.value);
        if let Some(existing) = constants.iter().find(|constant| constant.name == name) {
            return Err(Error::EnumNameCollision {
                ty: ty.to_owned(),
                value: enumeration.value.clone(),
                existing: existing.value.clone(),
            });
        }

        constants.push(EnumConstant {
            name,
            value: enumeration.value.clone(),
            documentation: enumeration.documentation.clone(),
        });
    }

    Ok(constants)
}

impl<'g> Resolver<'g> {
    /// Assigns every global declaration its Rust name up front, so that names
    /// never depend on the order references are followed in.
    fn new(graph: &'g SchemaGraph, aliases: &NamespaceAliases) -> Self {
        let mut resolver = Self {
            graph,
            aliases: aliases.clone(),
            names: NameTable::default(),
            type_names: HashMap::new(),
            element_names: HashMap::new(),
            cyclic: HashSet::new(),
            expanding_groups: Vec::new(),
            expanding_attribute_groups: Vec::new(),
            types: Vec::new(),
            type_indices: HashMap::new(),
            elements: HashMap::new(),
            opaque: Vec::new(),
        };

        let mut type_bases = HashSet::new();

        for document in graph.documents() {
            let namespace = &document.target_namespace;

            let simple = document.simple_types.iter().filter_map(|ty| ty.name.as_deref());
            let complex = document.complex_types.iter().filter_map(|ty| ty.name.as_deref());

            for local in simple.chain(complex) {
                let base = naming::qualified_type_name(aliases, namespace, local);
                type_bases.insert((namespace.as_str(), base.clone()));

                let name = resolver.names.claim(base);
                resolver
                    .type_names
                    .insert(NamespacedName::new(namespace.clone(), local), name);
            }
        }

        for document in graph.documents() {
            let namespace = &document.target_namespace;

            for element in &document.elements {
                let base = naming::qualified_type_name(aliases, namespace, &element.name);

                let same_as_type = element.inline.is_none()
                    && element
                        .ty
                        .as_ref()
                        .and_then(|ty| resolver.type_names.get(ty))
                        == Some(&base);
                if same_as_type {
                    continue;
                }

                let base = if type_bases.contains(&(namespace.as_str(), base.clone())) {
                    format!("{}Element", base)
                } else {
                    base
                };

                let name = resolver.names.claim(base);
                resolver
                    .element_names
                    .insert(NamespacedName::new(namespace.clone(), &element.name), name);
            }
        }

        resolver
    }

    fn type_keys(&self) -> Vec<NamespacedName> {
        self.graph
            .documents()
            .iter()
            .flat_map(|document| {
                let simple = document.simple_types.iter().filter_map(|ty| ty.name.as_deref());
                let complex = document.complex_types.iter().filter_map(|ty| ty.name.as_deref());

                simple
                    .chain(complex)
                    .map(move |name| NamespacedName::new(document.target_namespace.clone(), name))
            })
            .collect()
    }

    /// The declaration a type is an alias of or derives from. Every type has
    /// at most one.
    fn derivation_edge(&self, key: &NamespacedName) -> Option<NamespacedName> {
        match self.graph.type_declaration(key)? {
            TypeDeclaration::Simple(simple) => match &simple.kind {
                SimpleTypeKind::Restriction {
                    base: Some(base),
                    enumeration,
                    ..
                } if enumeration.is_empty() => Some(base.clone()),
                SimpleTypeKind::List { item: Some(item), .. } => Some(item.clone()),
                _ => None,
            },

            TypeDeclaration::Complex(complex) => {
                complex.derivation.as_ref().map(|derivation| derivation.base.clone())
            }
        }
    }

    /// Marks every type sitting on an alias or derivation cycle.
    fn find_alias_cycles(&mut self) {
        let mut done = HashSet::new();

        for start in self.type_keys() {
            let mut path: Vec<NamespacedName> = Vec::new();
            let mut current = Some(start);

            while let Some(key) = current {
                if done.contains(&key) {
                    break;
                }

                if let Some(index) = path.iter().position(|visited| *visited == key) {
                    debug!(cycle = %key, length = path.len() - index, "alias cycle");
                    self.cyclic.extend(path[index..].iter().cloned());
                    break;
                }

                current = self.derivation_edge(&key);
                path.push(key);
            }

            done.extend(path);
        }
    }

    fn opaque_ref(&mut self, location: Location, construct: impl Into<String>) -> TypeRef {
        self.opaque.push(OpaqueReference {
            location,
            construct: construct.into(),
        });

        TypeRef::opaque()
    }

    fn reference(&mut self, key: &NamespacedName, referrer: Location) -> Result<TypeRef, Error> {
        if key.is_builtin() {
            return Ok(match Builtin::from_xsd(&key.name) {
                Some(builtin) => TypeRef::builtin(builtin),
                None => self.opaque_ref(referrer, key.to_string()),
            });
        }

        match self.type_names.get(key) {
            Some(name) => Ok(TypeRef::named(name.clone())),
            None => Err(unresolvable(referrer, key)),
        }
    }

    fn element_ref(&mut self, key: &NamespacedName, referrer: Location) -> Result<TypeRef, Error> {
        if let Some(name) = self.element_names.get(key) {
            return Ok(TypeRef::named(name.clone()));
        }

        let graph = self.graph;
        let element = graph
            .element(key)
            .ok_or_else(|| unresolvable(referrer.clone(), key))?;

        match &element.ty {
            Some(ty) => self.reference(ty, referrer),
            None => Ok(self.opaque_ref(referrer, format!("element {} without a type", key))),
        }
    }

    fn is_struct(&self, key: &NamespacedName) -> bool {
        matches!(
            self.graph.type_declaration(key),
            Some(TypeDeclaration::Complex(complex)) if !is_simple_alias(complex)
        )
    }

    fn push(&mut self, resolved: ResolvedType) -> usize {
        self.types.push(resolved);
        self.types.len() - 1
    }

    fn resolve_declarations(&mut self) -> Result<(), Error> {
        let graph = self.graph;

        for document in graph.documents() {
            let scope = Scope {
                document: &document.location,
            };
            let key_of = |name: &str| NamespacedName::new(document.target_namespace.clone(), name);

            for simple in &document.simple_types {
                let xml_name = simple.name.as_deref().unwrap_or_default();
                let key = key_of(xml_name);
                let name = match self.type_names.get(&key) {
                    Some(name) => name.clone(),
                    None => continue,
                };

                let resolved = if self.cyclic.contains(&key) {
                    let target = self.opaque_ref(
                        scope.at(simple.offset),
                        format!("alias cycle through {}", key),
                    );

                    ResolvedType {
                        name,
                        key: Some(key.clone()),
                        xml_name: xml_name.to_owned(),
                        documentation: simple.documentation.clone(),
                        kind: ResolvedKind::Alias {
                            target,
                            underlying: Target::Opaque,
                        },
                    }
                } else {
                    self.resolve_simple(&name, Some(key.clone()), xml_name, simple, scope)?
                };

                let index = self.push(resolved);
                self.type_indices.insert(key, index);
            }

            for complex in &document.complex_types {
                let xml_name = complex.name.as_deref().unwrap_or_default();
                let key = key_of(xml_name);
                let name = match self.type_names.get(&key) {
                    Some(name) => name.clone(),
                    None => continue,
                };

                let cyclic = self.cyclic.contains(&key);
                let resolved =
                    self.resolve_complex(&name, Some(key.clone()), xml_name, complex, scope, cyclic)?;

                let index = self.push(resolved);
                self.type_indices.insert(key, index);
            }

            for element in &document.elements {
                let key = key_of(&element.name);

                match self.element_names.get(&key) {
                    Some(name) => {
                        let name = name.clone();
                        let resolved = self.resolve_element(&name, key.clone(), element, scope)?;
                        self.push(resolved);
                        self.elements.insert(key, TypeRef::named(name));
                    }

                    None => {
                        let target = self.element_ref(&key, scope.at(element.offset))?;
                        self.elements.insert(key, target);
                    }
                }
            }
        }

        Ok(())
    }

    fn resolve_simple(
        &mut self,
        name: &str,
        key: Option<NamespacedName>,
        xml_name: &str,
        simple: &SimpleType,
        scope: Scope<'_>,
    ) -> Result<ResolvedType, Error> {
        let kind = match &simple.kind {
            SimpleTypeKind::Restriction {
                base,
                inline_base,
                enumeration,
            } if !enumeration.is_empty() => {
                let base =
                    self.restriction_base(name, base.as_ref(), inline_base.as_deref(), simple, scope)?;

                ResolvedKind::Enumeration {
                    underlying: base.target.clone(),
                    base,
                    constants: enum_constants(name, enumeration)?,
                }
            }

            _ => {
                let target = self.simple_target(name, xml_name, simple, scope)?;

                ResolvedKind::Alias {
                    underlying: target.target.clone(),
                    target,
                }
            }
        };

        Ok(ResolvedType {
            name: name.to_owned(),
            key,
            xml_name: xml_name.to_owned(),
            documentation: simple.documentation.clone(),
            kind,
        })
    }

    /// The type an alias of `simple` stands for.
    fn simple_target(
        &mut self,
        hint: &str,
        xml_name: &str,
        simple: &SimpleType,
        scope: Scope<'_>,
    ) -> Result<TypeRef, Error> {
        let location = scope.at(simple.offset);

        match &simple.kind {
            SimpleTypeKind::Restriction {
                base, inline_base, ..
            } => self.restriction_base(hint, base.as_ref(), inline_base.as_deref(), simple, scope),

            SimpleTypeKind::List {
                item: Some(item), ..
            } => Ok(self.reference(item, location)?.with_shape(Shape::Sequence)),

            SimpleTypeKind::List {
                inline_item: Some(inline),
                ..
            } => {
                let hint = format!("{}Item", hint);
                let item = self.inline_simple(&hint, xml_name, inline, scope)?;
                Ok(item.with_shape(Shape::Sequence))
            }

            SimpleTypeKind::List { .. } => Ok(self
                .opaque_ref(location, "list without an item type")
                .with_shape(Shape::Sequence)),

            // Union values are only ever known lexically.
            SimpleTypeKind::Union { .. } => Ok(TypeRef::builtin(Builtin::String)),

            SimpleTypeKind::Empty => Ok(self.opaque_ref(location, "simple type without content")),
        }
    }

    fn restriction_base(
        &mut self,
        hint: &str,
        base: Option<&NamespacedName>,
        inline_base: Option<&SimpleType>,
        simple: &SimpleType,
        scope: Scope<'_>,
    ) -> Result<TypeRef, Error> {
        match (base, inline_base) {
            (Some(base), _) => self.reference(base, scope.at(simple.offset)),

            (None, Some(inline)) => {
                let hint = format!("{}Base", hint);
                self.inline_simple(&hint, &hint, inline, scope)
            }

            (None, None) => Ok(self.opaque_ref(scope.at(simple.offset), "restriction without a base")),
        }
    }

    /// An anonymous simple type: enumerations become a named enum, anything
    /// else collapses to what it aliases.
    fn inline_simple(
        &mut self,
        hint: &str,
        xml_name: &str,
        simple: &SimpleType,
        scope: Scope<'_>,
    ) -> Result<TypeRef, Error> {
        match &simple.kind {
            SimpleTypeKind::Restriction { enumeration, .. } if !enumeration.is_empty() => {
                let name = self.names.claim(hint.to_owned());
                let resolved = self.resolve_simple(&name, None, xml_name, simple, scope)?;
                self.push(resolved);

                Ok(TypeRef::named(name))
            }

            _ => self.simple_target(hint, xml_name, simple, scope),
        }
    }

    fn resolve_complex(
        &mut self,
        name: &str,
        key: Option<NamespacedName>,
        xml_name: &str,
        complex: &ComplexType,
        scope: Scope<'_>,
        cyclic: bool,
    ) -> Result<ResolvedType, Error> {
        let location = scope.at(complex.offset);

        let mut owner = Owner {
            name,
            scope,
            offset: complex.offset,
            field_names: NameTable::default(),
        };
        let mut fields = Vec::new();

        if let Some(derivation) = &complex.derivation {
            let embeds_base = derivation.content == ContentKind::Simple
                || derivation.method == DerivationMethod::Extension;

            if !embeds_base {
                // A complex restriction restates its content in full.
                if !derivation.base.is_builtin() && !self.type_names.contains_key(&derivation.base) {
                    return Err(unresolvable(location, &derivation.base));
                }
            } else {
                let base = if cyclic {
                    self.opaque_ref(
                        location.clone(),
                        format!("derivation cycle through {}", derivation.base),
                    )
                } else {
                    self.reference(&derivation.base, location.clone())?
                };

                if is_simple_alias(complex) {
                    return Ok(ResolvedType {
                        name: name.to_owned(),
                        key,
                        xml_name: xml_name.to_owned(),
                        documentation: complex.documentation.clone(),
                        kind: ResolvedKind::Alias {
                            underlying: base.target.clone(),
                            target: base,
                        },
                    });
                }

                let flatten = !base.is_opaque() && self.is_struct(&derivation.base);

                if flatten {
                    fields.push(Field {
                        name: owner.field_names.claim("base".into()),
                        xml_name: "base".into(),
                        kind: FieldKind::Flatten,
                        ty: base,
                        documentation: None,
                    });
                } else if derivation.content == ContentKind::Simple {
                    fields.push(Field {
                        name: owner.field_names.claim("value".into()),
                        xml_name: "$text".into(),
                        kind: FieldKind::Text,
                        ty: base,
                        documentation: None,
                    });
                }
            }
        }

        if let Some(group) = &complex.particle {
            self.group_fields(&mut owner, group, scope, false, false, &mut fields)?;
        }

        self.attribute_fields(
            &mut owner,
            &complex.attributes,
            &complex.attribute_groups,
            scope,
            &mut fields,
        )?;

        Ok(ResolvedType {
            name: name.to_owned(),
            key,
            xml_name: xml_name.to_owned(),
            documentation: complex.documentation.clone(),
            kind: ResolvedKind::Struct { fields },
        })
    }

    fn group_fields(
        &mut self,
        owner: &mut Owner<'_>,
        group: &Group,
        scope: Scope<'_>,
        optional: bool,
        many: bool,
        fields: &mut Vec<Field>,
    ) -> Result<(), Error> {
        let optional =
            optional || group.min_occurs == 0 || group.compositor == Compositor::Choice;
        let many = many || group.max_occurs.is_many();

        for particle in &group.particles {
            match particle {
                Particle::Element(element) => {
                    let field = self.element_field(owner, element, scope, optional, many)?;
                    fields.push(field);
                }

                Particle::Group(inner) => {
                    self.group_fields(owner, inner, scope, optional, many, fields)?
                }

                Particle::GroupRef(group_ref) => {
                    self.group_ref_fields(owner, group_ref, scope, optional, many, fields)?
                }

                Particle::Any { max_occurs } => {
                    let shape = if many || max_occurs.is_many() {
                        Shape::Sequence
                    } else {
                        Shape::Optional
                    };

                    let location = owner.scope.at(owner.offset);
                    let construct = format!("wildcard content in {}", owner.name);
                    let ty = self.opaque_ref(location, construct).with_shape(shape);

                    fields.push(Field {
                        name: owner.field_names.claim("items".into()),
                        xml_name: "$value".into(),
                        kind: FieldKind::Any,
                        ty,
                        documentation: None,
                    });
                }
            }
        }

        Ok(())
    }

    /// Expands a named model group in place, in the scope of the document
    /// declaring it.
    fn group_ref_fields(
        &mut self,
        owner: &mut Owner<'_>,
        group_ref: &GroupRef,
        scope: Scope<'_>,
        optional: bool,
        many: bool,
        fields: &mut Vec<Field>,
    ) -> Result<(), Error> {
        let location = scope.at(group_ref.offset);
        let key = &group_ref.reference;

        let graph = self.graph;
        let declared = graph
            .group(key)
            .ok_or_else(|| unresolvable(location.clone(), key))?;

        if self.expanding_groups.contains(key) {
            let ty = self
                .opaque_ref(location, format!("recursive group {}", key))
                .with_shape(Shape::Optional);

            fields.push(Field {
                name: owner.field_names.claim("items".into()),
                xml_name: "$value".into(),
                kind: FieldKind::Any,
                ty,
                documentation: None,
            });
            return Ok(());
        }

        let group = match &declared.item.particle {
            Some(group) => group,
            None => return Ok(()),
        };

        let scope = Scope {
            document: &declared.document.location,
        };
        let optional = optional || group_ref.min_occurs == 0;
        let many = many || group_ref.max_occurs.is_many();

        self.expanding_groups.push(key.clone());
        let result = self.group_fields(owner, group, scope, optional, many, fields);
        self.expanding_groups.pop();

        result
    }

    fn element_field(
        &mut self,
        owner: &mut Owner<'_>,
        element: &Element,
        scope: Scope<'_>,
        optional: bool,
        many: bool,
    ) -> Result<Field, Error> {
        let location = scope.at(element.offset);
        let graph = self.graph;

        let (xml_name, ty, documentation) = match &element.reference {
            Some(reference) => {
                let target = graph
                    .element(reference)
                    .ok_or_else(|| unresolvable(location.clone(), reference))?;
                let ty = self.element_ref(reference, location)?;
                let documentation = element
                    .documentation
                    .clone()
                    .or_else(|| target.documentation.clone());

                (target.name.clone(), ty, documentation)
            }

            None => {
                let ty = self.local_element_type(owner, element, scope)?;
                (element.name.clone(), ty, element.documentation.clone())
            }
        };

        // The referencing element's own cardinality wins over the target's.
        let shape = if ty.shape == Shape::Sequence || many || element.max_occurs.is_many() {
            Shape::Sequence
        } else if optional || element.min_occurs == 0 || element.nillable {
            Shape::Optional
        } else {
            ty.shape
        };

        Ok(Field {
            name: owner.field_names.claim(naming::field_name(&xml_name)),
            xml_name,
            kind: FieldKind::Element,
            ty: ty.with_shape(shape),
            documentation,
        })
    }

    fn local_element_type(
        &mut self,
        owner: &Owner<'_>,
        element: &Element,
        scope: Scope<'_>,
    ) -> Result<TypeRef, Error> {
        let location = scope.at(element.offset);

        if let Some(ty) = &element.ty {
            return self.reference(ty, location);
        }

        let hint = format!("{}{}", owner.name, naming::type_name(&element.name));

        match element.inline.as_deref() {
            Some(InlineType::Complex(complex)) => {
                let name = self.names.claim(hint);
                let resolved =
                    self.resolve_complex(&name, None, &element.name, complex, scope, false)?;
                self.push(resolved);

                Ok(TypeRef::named(name))
            }

            Some(InlineType::Simple(simple)) => self.inline_simple(&hint, &element.name, simple, scope),

            None => Ok(self.opaque_ref(location, format!("element {} without a type", element.name))),
        }
    }

    /// Attributes declared directly, then those of each referenced
    /// attribute group, in document order.
    fn attribute_fields(
        &mut self,
        owner: &mut Owner<'_>,
        attributes: &[Attribute],
        groups: &[AttributeGroupRef],
        scope: Scope<'_>,
        fields: &mut Vec<Field>,
    ) -> Result<(), Error> {
        for attribute in attributes {
            let field = self.attribute_field(owner, attribute, scope)?;
            fields.push(field);
        }

        let graph = self.graph;
        for group_ref in groups {
            let key = &group_ref.reference;
            let location = scope.at(group_ref.offset);

            let declared = graph
                .attribute_group(key)
                .ok_or_else(|| unresolvable(location.clone(), key))?;

            if self.expanding_attribute_groups.contains(key) {
                self.opaque_ref(location, format!("recursive attribute group {}", key));
                continue;
            }

            let group = declared.item;
            let scope = Scope {
                document: &declared.document.location,
            };

            self.expanding_attribute_groups.push(key.clone());
            let result = self.attribute_fields(
                owner,
                &group.attributes,
                &group.attribute_groups,
                scope,
                fields,
            );
            self.expanding_attribute_groups.pop();
            result?;
        }

        Ok(())
    }

    fn attribute_field(
        &mut self,
        owner: &mut Owner<'_>,
        attribute: &Attribute,
        scope: Scope<'_>,
    ) -> Result<Field, Error> {
        let location = scope.at(attribute.offset);
        let graph = self.graph;

        // A `ref` borrows the type of the global declaration.
        let (declaration, scope) = match &attribute.reference {
            Some(reference) if reference.namespace == XML_NAMESPACE => (None, scope),

            Some(reference) => {
                let declared = graph
                    .attribute(reference)
                    .ok_or_else(|| unresolvable(location.clone(), reference))?;
                let scope = Scope {
                    document: &declared.document.location,
                };

                (Some(declared.item), scope)
            }

            None => (Some(attribute), scope),
        };

        let ty = match declaration {
            Some(declaration) => match (&declaration.ty, &declaration.inline) {
                (Some(ty), _) => self.reference(ty, scope.at(declaration.offset))?,

                (None, Some(inline)) => {
                    let hint = format!("{}{}", owner.name, naming::type_name(&attribute.name));
                    self.inline_simple(&hint, &attribute.name, inline, scope)?
                }

                (None, None) => TypeRef::builtin(Builtin::String),
            },

            // `xml:lang`, `xml:space` and friends.
            None => TypeRef::builtin(Builtin::String),
        };

        let ty = if ty.shape != Shape::Sequence && !attribute.required {
            ty.with_shape(Shape::Optional)
        } else {
            ty
        };

        let documentation = attribute
            .documentation
            .clone()
            .or_else(|| declaration.and_then(|declared| declared.documentation.clone()));

        Ok(Field {
            name: owner.field_names.claim(naming::field_name(&attribute.name)),
            xml_name: format!("@{}", attribute.name),
            kind: FieldKind::Attribute,
            ty,
            documentation,
        })
    }

    fn resolve_element(
        &mut self,
        name: &str,
        key: NamespacedName,
        element: &Element,
        scope: Scope<'_>,
    ) -> Result<ResolvedType, Error> {
        let location = scope.at(element.offset);

        let target = match (&element.ty, element.inline.as_deref()) {
            (_, Some(InlineType::Complex(complex))) => {
                return self.resolve_complex(name, Some(key), &element.name, complex, scope, false)
            }

            (_, Some(InlineType::Simple(simple))) => {
                return self.resolve_simple(name, Some(key), &element.name, simple, scope)
            }

            (Some(ty), None) => self.reference(ty, location)?,

            (None, None) => self.opaque_ref(location, format!("element {} without a type", key)),
        };

        Ok(ResolvedType {
            name: name.to_owned(),
            key: Some(key),
            xml_name: element.name.clone(),
            documentation: element.documentation.clone(),
            kind: ResolvedKind::Alias {
                underlying: target.target.clone(),
                target,
            },
        })
    }

    fn resolve_messages(&mut self) -> Result<HashMap<NamespacedName, Option<TypeRef>>, Error> {
        let graph = self.graph;
        let mut messages = HashMap::new();

        for definition in graph.definitions() {
            let scope = Scope {
                document: &definition.location,
            };

            for message in &definition.messages {
                let location = scope.at(message.offset);

                let ty = match message.parts.as_slice() {
                    [] => None,

                    [Part {
                        element: Some(element),
                        ..
                    }] => Some(self.element_ref(element, location)?),

                    parts => Some(self.message_wrapper(message, parts, scope)?),
                };

                messages.insert(message.name.clone(), ty);
            }
        }

        Ok(messages)
    }

    /// A struct with one field per part, for messages that are not a single
    /// element.
    fn message_wrapper(
        &mut self,
        message: &Message,
        parts: &[Part],
        scope: Scope<'_>,
    ) -> Result<TypeRef, Error> {
        let location = scope.at(message.offset);
        let base =
            naming::qualified_type_name(&self.aliases, &message.name.namespace, &message.name.name);
        let name = self.names.claim(base);

        let mut field_names = NameTable::default();
        let mut fields = Vec::new();

        for part in parts {
            let ty = match (&part.element, &part.ty) {
                (Some(element), _) => self.element_ref(element, location.clone())?,
                (None, Some(ty)) => self.reference(ty, location.clone())?,
                (None, None) => self.opaque_ref(
                    location.clone(),
                    format!("part {} of {} without a type", part.name, message.name),
                ),
            };

            fields.push(Field {
                name: field_names.claim(naming::field_name(&part.name)),
                xml_name: part.name.clone(),
                kind: FieldKind::Element,
                ty,
                documentation: None,
            });
        }

        self.push(ResolvedType {
            name: name.clone(),
            key: None,
            xml_name: message.name.name.clone(),
            documentation: None,
            kind: ResolvedKind::Struct { fields },
        });

        Ok(TypeRef::named(name))
    }
}

/// Follows aliases to the item or scalar at the end of the chain.
fn terminal(types: &[ResolvedType], by_name: &HashMap<String, usize>, target: &TypeRef) -> Target {
    let mut target = target;

    for _ in 0..=types.len() {
        let name = match &target.target {
            Target::Named(name) => name,
            other => return other.clone(),
        };

        match by_name.get(name).map(|&index| &types[index].kind) {
            Some(ResolvedKind::Alias { target: next, .. }) => target = next,
            Some(_) => return Target::Named(name.clone()),
            None => return Target::Opaque,
        }
    }

    Target::Opaque
}

fn fill_underlying(types: &mut [ResolvedType], by_name: &HashMap<String, usize>) {
    let view: &[ResolvedType] = types;
    let underlying: Vec<Option<Target>> = view
        .iter()
        .map(|ty| match &ty.kind {
            ResolvedKind::Alias { target, .. } => Some(terminal(view, by_name, target)),
            ResolvedKind::Enumeration { base, .. } => Some(terminal(view, by_name, base)),
            ResolvedKind::Struct { .. } => None,
        })
        .collect();

    for (ty, resolved) in types.iter_mut().zip(underlying) {
        match (&mut ty.kind, resolved) {
            (ResolvedKind::Alias { underlying, .. }, Some(resolved))
            | (ResolvedKind::Enumeration { underlying, .. }, Some(resolved)) => *underlying = resolved,
            _ => (),
        }
    }
}

/// Refines `Scalar` to `Struct` for references to structs.
fn classify_shapes(
    types: &mut [ResolvedType],
    by_name: &HashMap<String, usize>,
    elements: &mut HashMap<NamespacedName, TypeRef>,
    messages: &mut HashMap<NamespacedName, Option<TypeRef>>,
) {
    let view: &[ResolvedType] = types;
    let structs: HashSet<String> = view
        .iter()
        .filter(|ty| {
            let target = TypeRef::named(ty.name.clone());
            match terminal(view, by_name, &target) {
                Target::Named(name) => by_name
                    .get(&name)
                    .map_or(false, |&index| matches!(view[index].kind, ResolvedKind::Struct { .. })),
                _ => false,
            }
        })
        .map(|ty| ty.name.clone())
        .collect();

    let classify = |ty: &mut TypeRef| {
        if ty.shape == Shape::Scalar && ty.name().map_or(false, |name| structs.contains(name)) {
            ty.shape = Shape::Struct;
        }
    };

    for ty in types.iter_mut() {
        match &mut ty.kind {
            ResolvedKind::Struct { fields } => fields.iter_mut().for_each(|field| classify(&mut field.ty)),
            ResolvedKind::Alias { target, .. } => classify(target),
            ResolvedKind::Enumeration { .. } => (),
        }
    }

    elements.values_mut().for_each(classify);
    messages.values_mut().flatten().for_each(classify);
}

/// Boxes every struct field whose type can reach back to the struct by
/// value, which leaves no unsized cycles regardless of declaration order.
fn break_cycles(types: &mut [ResolvedType], by_name: &HashMap<String, usize>) {
    let by_value = |ty: &TypeRef| -> Option<usize> {
        if ty.shape == Shape::Sequence {
            return None;
        }
        ty.name().and_then(|name| by_name.get(name).copied())
    };

    let edges: Vec<Vec<usize>> = types
        .iter()
        .map(|ty| match &ty.kind {
            ResolvedKind::Struct { fields } => {
                fields.iter().filter_map(|field| by_value(&field.ty)).collect()
            }
            ResolvedKind::Alias { target, .. } => by_value(target).into_iter().collect(),
            ResolvedKind::Enumeration { .. } => Vec::new(),
        })
        .collect();

    let reaches = |from: usize, to: usize| -> bool {
        let mut seen = vec![false; edges.len()];
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut seen[current], true) {
                continue;
            }
            queue.extend(edges[current].iter().copied());
        }

        false
    };

    let mut boxed = Vec::new();
    for (owner, ty) in types.iter().enumerate() {
        for (index, field) in ty.fields().iter().enumerate() {
            if let Some(target) = by_value(&field.ty) {
                if reaches(target, owner) {
                    boxed.push((owner, index));
                }
            }
        }
    }

    for (owner, index) in boxed {
        let ty = &mut types[owner];
        if let ResolvedKind::Struct { fields } = &mut ty.kind {
            debug!(ty = %ty.name, field = %fields[index].name, "boxing recursive field");
            fields[index].ty.boxed = true;
        }
    }
}

pub fn resolve(graph: &SchemaGraph, options: &Options) -> Result<ResolvedGraph, Error> {
    let mut resolver = Resolver::new(graph, &options.aliases);
    resolver.find_alias_cycles();
    resolver.resolve_declarations()?;
    let mut messages = resolver.resolve_messages()?;

    let Resolver {
        aliases,
        mut types,
        type_indices,
        mut elements,
        opaque,
        ..
    } = resolver;

    let by_name: HashMap<String, usize> = types
        .iter()
        .enumerate()
        .map(|(index, ty)| (ty.name.clone(), index))
        .collect();

    fill_underlying(&mut types, &by_name);
    classify_shapes(&mut types, &by_name, &mut elements, &mut messages);
    break_cycles(&mut types, &by_name);

    debug!(
        types = types.len(),
        elements = elements.len(),
        messages = messages.len(),
        opaque = opaque.len(),
        "types resolved"
    );

    Ok(ResolvedGraph {
        visibility: Visibility::from_exported(options.exported),
        aliases,
        types,
        by_name,
        by_type_key: type_indices,
        elements,
        messages,
        opaque,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wsdlc_wsdl::parse_document;

    pub(crate) fn graph(documents: &[(&str, &str)]) -> SchemaGraph {
        let parsed = documents
            .iter()
            .map(|(location, body)| {
                parse_document(&Url::parse(location).unwrap(), body.as_bytes()).unwrap()
            })
            .collect();

        SchemaGraph::build(parsed).unwrap()
    }

    pub(crate) fn schema(body: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="urn:example" targetNamespace="urn:example">{}</xs:schema>"#,
            body
        )
    }

    fn resolve_schema(body: &str) -> Result<ResolvedGraph, Error> {
        resolve(&graph(&[("http://host/a.xsd", &schema(body))]), &Options::default())
    }

    fn key(name: &str) -> NamespacedName {
        NamespacedName::new("urn:example", name)
    }

    #[test]
    fn person_maps_to_struct_with_scalar_fields() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Person">
                <xs:sequence>
                    <xs:element name="name" type="xs:string"/>
                    <xs:element name="age" type="xs:int"/>
                </xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let person = resolved.lookup(&key("Person")).unwrap();
        assert_eq!(person.name, "Person");

        let fields = person.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "name");
        assert_eq!(fields[0].ty, TypeRef::builtin(Builtin::String));
        assert_eq!(fields[1].name, "age");
        assert_eq!(fields[1].ty, TypeRef::builtin(Builtin::I32));
    }

    #[test]
    fn cardinality_picks_shapes() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Order">
                <xs:sequence>
                    <xs:element name="id" type="xs:long"/>
                    <xs:element name="note" type="xs:string" minOccurs="0"/>
                    <xs:element name="line" type="xs:string" maxOccurs="unbounded"/>
                    <xs:element name="customer" type="tns:Customer" nillable="true"/>
                    <xs:element name="owner" type="tns:Customer"/>
                </xs:sequence>
                <xs:attribute name="status" type="xs:string"/>
                <xs:attribute name="type" type="xs:string" use="required"/>
            </xs:complexType>
            <xs:complexType name="Customer"/>"#,
        )
        .unwrap();

        let order = resolved.lookup(&key("Order")).unwrap();
        let shape = |name: &str| order.field(name).unwrap().ty.shape;

        assert_eq!(shape("id"), Shape::Scalar);
        assert_eq!(shape("note"), Shape::Optional);
        assert_eq!(shape("line"), Shape::Sequence);
        assert_eq!(shape("customer"), Shape::Optional);
        assert_eq!(shape("owner"), Shape::Struct);
        assert_eq!(shape("status"), Shape::Optional);
        assert_eq!(shape("type_"), Shape::Scalar);
        assert_eq!(order.field("type_").unwrap().xml_name, "@type");
    }

    #[test]
    fn choice_members_are_optional() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Contact">
                <xs:choice>
                    <xs:element name="email" type="xs:string"/>
                    <xs:element name="phone" type="xs:string"/>
                </xs:choice>
            </xs:complexType>"#,
        )
        .unwrap();

        let contact = resolved.lookup(&key("Contact")).unwrap();
        assert!(contact.fields().iter().all(|field| field.ty.shape == Shape::Optional));
    }

    #[test]
    fn self_reference_is_boxed_and_terminates() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Node">
                <xs:sequence>
                    <xs:element name="value" type="xs:string"/>
                    <xs:element name="next" type="tns:Node" minOccurs="0"/>
                    <xs:element name="children" type="tns:Node" maxOccurs="unbounded"/>
                </xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let node = resolved.lookup(&key("Node")).unwrap();
        let next = node.field("next").unwrap();
        assert_eq!(next.ty.target, Target::Named("Node".into()));
        assert!(next.ty.boxed);
        assert!(!node.field("children").unwrap().ty.boxed);
    }

    #[test]
    fn mutual_recursion_boxes_both_sides() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Parent">
                <xs:sequence><xs:element name="child" type="tns:Child"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="Child">
                <xs:sequence><xs:element name="parent" type="tns:Parent" minOccurs="0"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="Holder">
                <xs:sequence><xs:element name="parent" type="tns:Parent"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let boxed = |ty: &str, field: &str| {
            resolved.lookup(&key(ty)).unwrap().field(field).unwrap().ty.boxed
        };

        assert!(boxed("Parent", "child"));
        assert!(boxed("Child", "parent"));
        assert!(!boxed("Holder", "parent"));
    }

    #[test]
    fn alias_chain_ends_at_scalar() {
        let resolved = resolve_schema(
            r#"<xs:simpleType name="A"><xs:restriction base="tns:B"/></xs:simpleType>
            <xs:simpleType name="B"><xs:restriction base="tns:C"/></xs:simpleType>
            <xs:simpleType name="C"><xs:restriction base="tns:D"/></xs:simpleType>
            <xs:simpleType name="D"><xs:restriction base="xs:unsignedShort"/></xs:simpleType>"#,
        )
        .unwrap();

        match &resolved.lookup(&key("A")).unwrap().kind {
            ResolvedKind::Alias { target, underlying } => {
                assert_eq!(target.target, Target::Named("B".into()));
                assert_eq!(*underlying, Target::Builtin(Builtin::U16));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn alias_cycle_becomes_opaque() {
        let resolved = resolve_schema(
            r#"<xs:simpleType name="Ping"><xs:restriction base="tns:Pong"/></xs:simpleType>
            <xs:simpleType name="Pong"><xs:restriction base="tns:Ping"/></xs:simpleType>
            <xs:simpleType name="Outside"><xs:restriction base="tns:Ping"/></xs:simpleType>"#,
        )
        .unwrap();

        for name in ["Ping", "Pong"] {
            match &resolved.lookup(&key(name)).unwrap().kind {
                ResolvedKind::Alias { target, .. } => assert!(target.is_opaque()),
                other => panic!("unexpected kind {:?}", other),
            }
        }

        match &resolved.lookup(&key("Outside")).unwrap().kind {
            ResolvedKind::Alias { target, underlying } => {
                assert_eq!(target.target, Target::Named("Ping".into()));
                assert_eq!(*underlying, Target::Opaque);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        assert_eq!(resolved.opaque_references().len(), 2);
    }

    #[test]
    fn enumeration_constants_are_unique() {
        let resolved = resolve_schema(
            r#"<xs:simpleType name="Status">
                <xs:restriction base="xs:string">
                    <xs:enumeration value="in-progress"/>
                    <xs:enumeration value="done"/>
                    <xs:enumeration value="done"/>
                    <xs:enumeration value="3"/>
                </xs:restriction>
            </xs:simpleType>"#,
        )
        .unwrap();

        let status = resolved.lookup(&key("Status")).unwrap();
        let names: Vec<_> = status.constants().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["InProgress", "Done", "Value3"]);
    }

    #[test]
    fn colliding_enumeration_constants_fail() {
        let err = resolve_schema(
            r#"<xs:simpleType name="Mode">
                <xs:restriction base="xs:string">
                    <xs:enumeration value="read-write"/>
                    <xs:enumeration value="read_write"/>
                </xs:restriction>
            </xs:simpleType>"#,
        )
        .unwrap_err();

        match err {
            Error::EnumNameCollision {
                ty,
                value,
                existing,
            } => {
                assert_eq!(ty, "Mode");
                assert_eq!(value, "read_write");
                assert_eq!(existing, "read-write");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn missing_type_is_unresolvable() {
        let err = resolve_schema(
            r#"<xs:complexType name="Broken">
                <xs:sequence><xs:element name="thing" type="tns:Missing"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap_err();

        match err {
            Error::UnresolvableReference { referrer, key: missing } => {
                assert_eq!(missing, key("Missing"));
                assert_eq!(referrer.document.as_str(), "http://host/a.xsd");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn missing_element_ref_is_unresolvable() {
        let err = resolve_schema(
            r#"<xs:complexType name="Broken">
                <xs:sequence><xs:element ref="tns:missing"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap_err();

        assert!(matches!(err, Error::UnresolvableReference { key: missing, .. } if missing == key("missing")));
    }

    #[test]
    fn element_ref_adopts_target_name_and_keeps_own_cardinality() {
        let resolved = resolve_schema(
            r#"<xs:element name="tag" type="xs:string"/>
            <xs:complexType name="Post">
                <xs:sequence><xs:element ref="tns:tag" maxOccurs="unbounded"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let post = resolved.lookup(&key("Post")).unwrap();
        let tag = post.field("tag").unwrap();
        assert_eq!(tag.xml_name, "tag");
        assert_eq!(tag.ty.target, Target::Named("Tag".into()));
        assert_eq!(tag.ty.shape, Shape::Sequence);
    }

    #[test]
    fn element_with_same_named_type_yields_no_item() {
        let resolved = resolve_schema(
            r#"<xs:element name="Person" type="tns:Person"/>
            <xs:element name="Pet" type="tns:Animal"/>
            <xs:complexType name="Person"/>
            <xs:complexType name="Animal"/>"#,
        )
        .unwrap();

        assert_eq!(
            resolved.element(&key("Person")).unwrap().target,
            Target::Named("Person".into())
        );
        assert!(resolved.get("Pet").is_some());
        assert_eq!(resolved.types().len(), 3);
    }

    #[test]
    fn element_colliding_with_type_gets_suffix() {
        let resolved = resolve_schema(
            r#"<xs:element name="Item">
                <xs:complexType><xs:sequence><xs:element name="id" type="xs:int"/></xs:sequence></xs:complexType>
            </xs:element>
            <xs:simpleType name="Item"><xs:restriction base="xs:string"/></xs:simpleType>"#,
        )
        .unwrap();

        assert_eq!(resolved.lookup(&key("Item")).unwrap().name, "Item");
        assert_eq!(
            resolved.element(&key("Item")).unwrap().target,
            Target::Named("ItemElement".into())
        );
    }

    #[test]
    fn anonymous_types_are_named_after_owner_and_field() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Shipment">
                <xs:sequence>
                    <xs:element name="address">
                        <xs:complexType>
                            <xs:sequence><xs:element name="city" type="xs:string"/></xs:sequence>
                        </xs:complexType>
                    </xs:element>
                    <xs:element name="priority">
                        <xs:simpleType>
                            <xs:restriction base="xs:string">
                                <xs:enumeration value="low"/>
                                <xs:enumeration value="high"/>
                            </xs:restriction>
                        </xs:simpleType>
                    </xs:element>
                </xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let address = resolved.get("ShipmentAddress").unwrap();
        assert_eq!(address.fields().len(), 1);
        assert_eq!(resolved.get("ShipmentPriority").unwrap().constants().len(), 2);

        let shipment = resolved.lookup(&key("Shipment")).unwrap();
        assert_eq!(shipment.field("address").unwrap().ty.shape, Shape::Struct);
    }

    #[test]
    fn extension_embeds_base() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Animal">
                <xs:sequence><xs:element name="name" type="xs:string"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="Dog">
                <xs:complexContent>
                    <xs:extension base="tns:Animal">
                        <xs:sequence><xs:element name="breed" type="xs:string"/></xs:sequence>
                    </xs:extension>
                </xs:complexContent>
            </xs:complexType>"#,
        )
        .unwrap();

        let dog = resolved.lookup(&key("Dog")).unwrap();
        let fields = dog.fields();
        assert_eq!(fields[0].kind, FieldKind::Flatten);
        assert_eq!(fields[0].ty.target, Target::Named("Animal".into()));
        assert_eq!(fields[1].name, "breed");
    }

    #[test]
    fn simple_content_carries_text_and_attributes() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Price">
                <xs:simpleContent>
                    <xs:extension base="xs:decimal">
                        <xs:attribute name="currency" type="xs:string" use="required"/>
                    </xs:extension>
                </xs:simpleContent>
            </xs:complexType>
            <xs:complexType name="Label">
                <xs:simpleContent><xs:extension base="xs:string"/></xs:simpleContent>
            </xs:complexType>"#,
        )
        .unwrap();

        let price = resolved.lookup(&key("Price")).unwrap();
        let fields = price.fields();
        assert_eq!(fields[0].kind, FieldKind::Text);
        assert_eq!(fields[0].ty, TypeRef::builtin(Builtin::F64));
        assert_eq!(fields[1].xml_name, "@currency");

        assert!(matches!(
            resolved.lookup(&key("Label")).unwrap().kind,
            ResolvedKind::Alias { .. }
        ));
    }

    #[test]
    fn unknown_builtins_are_reported_as_opaque() {
        let resolved = resolve_schema(
            r#"<xs:complexType name="Envelope">
                <xs:sequence>
                    <xs:element name="payload" type="xs:anyType"/>
                    <xs:any maxOccurs="unbounded"/>
                </xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let envelope = resolved.lookup(&key("Envelope")).unwrap();
        assert!(envelope.field("payload").unwrap().ty.is_opaque());
        assert_eq!(envelope.field("items").unwrap().kind, FieldKind::Any);
        assert_eq!(resolved.opaque_references().len(), 2);
    }

    #[test]
    fn namespace_aliases_prefix_and_unmapped_collisions_get_suffixes() {
        let a = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
            <xs:import namespace="urn:b" schemaLocation="b.xsd"/>
            <xs:import namespace="urn:c" schemaLocation="c.xsd"/>
            <xs:complexType name="Thing"/>
        </xs:schema>"#;
        let b = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:b">
            <xs:complexType name="Thing"/>
        </xs:schema>"#;
        let c = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:c">
            <xs:complexType name="Thing"/>
        </xs:schema>"#;

        let graph = graph(&[
            ("http://host/a.xsd", a),
            ("http://host/b.xsd", b),
            ("http://host/c.xsd", c),
        ]);

        let mut options = Options::default();
        options.aliases.insert("urn:c", "Legacy");

        let resolved = resolve(&graph, &options).unwrap();
        let name = |ns: &str| resolved.lookup(&NamespacedName::new(ns, "Thing")).unwrap().name.clone();

        assert_eq!(name("urn:a"), "Thing");
        assert_eq!(name("urn:b"), "Thing2");
        assert_eq!(name("urn:c"), "LegacyThing");
    }

    #[test]
    fn resolution_is_independent_of_declaration_order() {
        let forward = resolve_schema(
            r#"<xs:complexType name="Tree">
                <xs:sequence><xs:element name="leaf" type="tns:Leaf" minOccurs="0"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="Leaf">
                <xs:sequence><xs:element name="tree" type="tns:Tree" minOccurs="0"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        let backward = resolve_schema(
            r#"<xs:complexType name="Leaf">
                <xs:sequence><xs:element name="tree" type="tns:Tree" minOccurs="0"/></xs:sequence>
            </xs:complexType>
            <xs:complexType name="Tree">
                <xs:sequence><xs:element name="leaf" type="tns:Leaf" minOccurs="0"/></xs:sequence>
            </xs:complexType>"#,
        )
        .unwrap();

        for resolved in [&forward, &backward] {
            assert!(resolved.lookup(&key("Tree")).unwrap().field("leaf").unwrap().ty.boxed);
            assert!(resolved.lookup(&key("Leaf")).unwrap().field("tree").unwrap().ty.boxed);
        }
    }

    #[test]
    fn chameleon_include_resolves_its_own_references() {
        let main = schema(
            r#"<xs:include schemaLocation="parts.xsd"/>
            <xs:complexType name="Order">
                <xs:sequence><xs:element name="part" type="tns:Part"/></xs:sequence>
            </xs:complexType>"#,
        );
        let parts = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
            <xs:simpleType name="Sku"><xs:restriction base="xs:string"/></xs:simpleType>
            <xs:complexType name="Part">
                <xs:sequence><xs:element name="sku" type="Sku"/></xs:sequence>
            </xs:complexType>
        </xs:schema>"#;

        let graph = graph(&[("http://host/main.xsd", &main), ("http://host/parts.xsd", parts)]);
        let resolved = resolve(&graph, &Options::default()).unwrap();

        let part = resolved.lookup(&key("Part")).unwrap();
        assert_eq!(part.field("sku").unwrap().ty.name(), Some("Sku"));

        let order = resolved.lookup(&key("Order")).unwrap();
        assert_eq!(order.field("part").unwrap().ty.name(), Some("Part"));
        assert!(resolved.opaque_references().is_empty());
    }

    #[test]
    fn model_groups_are_expanded_in_place() {
        let resolved = resolve_schema(
            r#"<xs:group name="Names">
                <xs:sequence>
                    <xs:element name="first" type="xs:string"/>
                    <xs:element name="last" type="xs:string"/>
                </xs:sequence>
            </xs:group>
            <xs:complexType name="User">
                <xs:sequence>
                    <xs:group ref="tns:Names"/>
                    <xs:element name="id" type="xs:int"/>
                    <xs:group ref="tns:Names" minOccurs="0" maxOccurs="unbounded"/>
                </xs:sequence>
            </xs:complexType>
            <xs:complexType name="Alias">
                <xs:group ref="tns:Names"/>
            </xs:complexType>"#,
        )
        .unwrap();

        let user = resolved.lookup(&key("User")).unwrap();
        let names: Vec<&str> = user.fields().iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["first", "last", "id", "first2", "last2"]);
        assert_eq!(user.field("first").unwrap().ty.shape, Shape::Scalar);
        assert_eq!(user.field("last2").unwrap().ty.shape, Shape::Sequence);
        assert_eq!(user.field("first2").unwrap().xml_name, "first");

        let alias = resolved.lookup(&key("Alias")).unwrap();
        assert_eq!(alias.fields().len(), 2);
        assert!(resolved.opaque_references().is_empty());
    }

    #[test]
    fn attribute_groups_and_attribute_refs_keep_their_types() {
        let resolved = resolve_schema(
            r#"<xs:attribute name="revision" type="xs:unsignedInt">
                <xs:annotation><xs:documentation>Edit counter.</xs:documentation></xs:annotation>
            </xs:attribute>
            <xs:attributeGroup name="Stamp">
                <xs:attribute name="at" type="xs:dateTime" use="required"/>
            </xs:attributeGroup>
            <xs:attributeGroup name="Audit">
                <xs:attribute name="createdBy" type="xs:string"/>
                <xs:attributeGroup ref="tns:Stamp"/>
            </xs:attributeGroup>
            <xs:complexType name="User">
                <xs:sequence><xs:element name="id" type="xs:int"/></xs:sequence>
                <xs:attribute ref="tns:revision" use="required"/>
                <xs:attribute ref="xml:lang"/>
                <xs:attributeGroup ref="tns:Audit"/>
            </xs:complexType>
            <xs:complexType name="Note">
                <xs:simpleContent>
                    <xs:extension base="xs:string">
                        <xs:attributeGroup ref="tns:Stamp"/>
                    </xs:extension>
                </xs:simpleContent>
            </xs:complexType>"#,
        )
        .unwrap();

        let user = resolved.lookup(&key("User")).unwrap();
        let names: Vec<&str> = user.fields().iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["id", "revision", "lang", "created_by", "at"]);

        let revision = user.field("revision").unwrap();
        assert_eq!(revision.ty, TypeRef::builtin(Builtin::U32));
        assert_eq!(revision.xml_name, "@revision");
        assert_eq!(revision.documentation.as_deref(), Some("Edit counter."));

        assert_eq!(user.field("lang").unwrap().ty.shape, Shape::Optional);
        assert_eq!(user.field("at").unwrap().ty, TypeRef::builtin(Builtin::DateTime));

        let note = resolved.lookup(&key("Note")).unwrap();
        assert_eq!(note.field("value").unwrap().kind, FieldKind::Text);
        assert!(note.field("at").is_some());
    }

    #[test]
    fn missing_groups_are_unresolvable() {
        for body in [
            r#"<xs:complexType name="User"><xs:sequence><xs:group ref="tns:Nope"/></xs:sequence></xs:complexType>"#,
            r#"<xs:complexType name="User"><xs:attributeGroup ref="tns:Nope"/></xs:complexType>"#,
            r#"<xs:complexType name="User"><xs:attribute ref="tns:nope"/></xs:complexType>"#,
        ] {
            match resolve_schema(body).unwrap_err() {
                Error::UnresolvableReference { key: missing, .. } => {
                    assert_eq!(missing.namespace, "urn:example")
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn recursive_groups_terminate() {
        let resolved = resolve_schema(
            r#"<xs:group name="Loop">
                <xs:sequence>
                    <xs:element name="step" type="xs:string"/>
                    <xs:group ref="tns:Loop" minOccurs="0"/>
                </xs:sequence>
            </xs:group>
            <xs:complexType name="Walk"><xs:group ref="tns:Loop"/></xs:complexType>"#,
        )
        .unwrap();

        let walk = resolved.lookup(&key("Walk")).unwrap();
        assert!(walk.field("step").is_some());
        assert_eq!(walk.field("items").unwrap().kind, FieldKind::Any);
        assert_eq!(resolved.opaque_references().len(), 1);
    }
}
