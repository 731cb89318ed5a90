use proc_macro2::TokenStream;
use tracing::{info, warn};
use wsdlc_wsdl::SchemaGraph;

mod binder;
mod codegen;
mod naming;
mod resolver;

pub mod error;
pub mod options;
pub mod types;

pub use binder::bind;
pub use codegen::Codegen;
pub use error::Error;
pub use options::{NamespaceAliases, Options, Visibility};
pub use resolver::resolve;

/// A fully resolved service description, ready to be emitted.
#[derive(Debug, Clone)]
pub struct Generated {
    pub types: types::ResolvedGraph,
    pub interfaces: Vec<types::PortTypeInterface>,
}

pub fn generate(graph: &SchemaGraph, options: &Options) -> Result<Generated, Error> {
    let types = resolve(graph, options)?;

    for opaque in types.opaque_references() {
        warn!(location = %opaque.location, construct = %opaque.construct, "mapped to the opaque type");
    }

    let interfaces = bind(graph, &types)?;
    info!(
        types = types.types().len(),
        interfaces = interfaces.len(),
        "service description resolved"
    );

    Ok(Generated { types, interfaces })
}

/// Loads, resolves and renders the service description at `url` (a URL or a
/// filesystem path).
pub fn from_url<S: AsRef<str>>(url: S, options: &Options) -> Result<String, Error> {
    let graph = wsdlc_wsdl::load(url, &options.load)?;
    generate(&graph, options)?.render()
}

impl Generated {
    pub fn tokens(&self) -> TokenStream {
        codegen::codegen(&self.types, &self.interfaces)
    }

    pub fn render(&self) -> Result<String, Error> {
        codegen::render(self.tokens())
    }
}
