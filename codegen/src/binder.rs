use std::collections::HashSet;

use tracing::debug;
use wsdlc_wsdl::{
    error::Location,
    graph::SchemaGraph,
    types::{self as wsdl, NamespacedName},
};

use super::{
    error::Error,
    naming::{self, NameTable},
    types::{Fault, Operation, PortTypeInterface, ResolvedGraph, TypeRef},
};

fn message_type(
    resolved: &ResolvedGraph,
    key: &NamespacedName,
    referrer: &Location,
) -> Result<Option<TypeRef>, Error> {
    resolved
        .message(key)
        .map(|ty| ty.cloned())
        .ok_or_else(|| Error::UnresolvableReference {
            referrer: referrer.clone(),
            key: key.clone(),
        })
}

/// The SOAP action of an operation, from the first binding of its port type
/// that declares one.
fn soap_action(graph: &SchemaGraph, port_type: &NamespacedName, operation: &str) -> String {
    graph
        .all_bindings()
        .filter(|binding| binding.ty == *port_type)
        .flat_map(|binding| binding.operations.iter())
        .filter(|bound| bound.name == operation)
        .find_map(|bound| bound.action.clone())
        .unwrap_or_default()
}

fn endpoint(graph: &SchemaGraph, port_type: &NamespacedName) -> Option<String> {
    graph
        .definitions()
        .iter()
        .flat_map(|definition| definition.services.iter())
        .flat_map(|service| service.ports.iter())
        .filter(|port| {
            graph
                .binding(&port.binding)
                .map_or(false, |binding| binding.ty == *port_type)
        })
        .find_map(|port| port.location.clone())
}

fn bind_operation(
    graph: &SchemaGraph,
    resolved: &ResolvedGraph,
    port_type: &wsdl::PortType,
    operation: &wsdl::Operation,
    location: Location,
    method_names: &mut HashSet<String>,
) -> Result<Operation, Error> {
    let request = match &operation.input {
        Some(input) => message_type(resolved, input, &location)?,
        None => None,
    };

    let response = match &operation.output {
        Some(output) => message_type(resolved, output, &location)?,
        None => None,
    };

    let faults = operation
        .faults
        .iter()
        .map(|fault| {
            Ok(Fault {
                name: fault.name.clone(),
                ty: message_type(resolved, &fault.message, &location)?,
                documentation: fault.documentation.clone(),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let base = naming::field_name(&operation.name);
    let mut method_name = base.clone();
    let mut suffix = 2;
    while !method_names.insert(method_name.clone()) {
        method_name = format!("{}_{}", base, suffix);
        suffix += 1;
    }

    Ok(Operation {
        name: operation.name.clone(),
        method_name,
        request,
        response,
        faults,
        action: soap_action(graph, &port_type.name, &operation.name),
        documentation: operation.documentation.clone(),
    })
}

/// One interface per port type, in declaration order, with every operation
/// bound to its resolved message types.
///
/// Each interface also emits a `{Name}Client` struct, so both names are
/// claimed together.
pub fn bind(graph: &SchemaGraph, resolved: &ResolvedGraph) -> Result<Vec<PortTypeInterface>, Error> {
    let mut interfaces = Vec::new();
    let mut names = NameTable::default();

    for definition in graph.definitions() {
        for port_type in &definition.port_types {
            let key = &port_type.name;
            let base = naming::qualified_type_name(&resolved.aliases, &key.namespace, &key.name);
            let name = names.claim_with(base, &["Client"]);

            let mut method_names = HashSet::new();
            let operations = port_type
                .operations
                .iter()
                .map(|operation| {
                    let location = Location {
                        document: definition.location.clone(),
                        offset: operation.offset,
                    };
                    bind_operation(graph, resolved, port_type, operation, location, &mut method_names)
                })
                .collect::<Result<Vec<_>, _>>()?;

            debug!(port_type = %port_type.name, operations = operations.len(), "bound port type");

            interfaces.push(PortTypeInterface {
                name,
                key: port_type.name.clone(),
                documentation: port_type.documentation.clone(),
                endpoint: endpoint(graph, &port_type.name),
                operations,
            });
        }
    }

    Ok(interfaces)
}
