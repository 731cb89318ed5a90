use tracing::info;
use url::Url;

mod parser;

pub mod error;
pub mod graph;
pub mod loader;
pub mod types;

pub use graph::SchemaGraph;
pub use loader::{Fetch, ImportFailure, LoadOptions, Loader};
pub use parser::parse as parse_document;

/// Loads the entry document at `location` (a URL or a filesystem path) and
/// everything it references, and merges the result into one graph.
pub fn load<S: AsRef<str>>(
    location: S,
    options: &LoadOptions,
) -> Result<SchemaGraph, error::Error> {
    let entry = loader::entry_url(location.as_ref())?;
    let loader = Loader::new(options)?;
    load_with(&loader, &entry)
}

pub fn load_with<F: Fetch>(loader: &Loader<F>, entry: &Url) -> Result<SchemaGraph, error::Error> {
    let documents = loader.load(entry)?;
    info!(%entry, documents = documents.len(), "documents loaded");

    let parsed = documents
        .iter()
        .map(|document| parser::parse(&document.location, &document.bytes))
        .collect::<Result<Vec<_>, _>>()?;

    SchemaGraph::build(parsed)
}
