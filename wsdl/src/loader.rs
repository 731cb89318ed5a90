use std::{
    collections::{HashSet, VecDeque},
    path::Path,
};

use quick_xml::{events::Event, Reader};
use tracing::{debug, warn};
use url::Url;

use super::{error::Error, parser::get_attributes};

/// What to do when an imported or included document cannot be fetched.
/// The entry document always aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportFailure {
    #[default]
    Abort,
    Warn,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Skip TLS certificate verification for HTTPS fetches.
    pub insecure: bool,
    pub import_failure: ImportFailure,
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub location: Url,
    pub bytes: Vec<u8>,
}

pub trait Fetch {
    fn fetch(&self, location: &Url) -> Result<Vec<u8>, Error>;
}

/// Fetches `file`, `http` and `https` locations.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

pub struct Loader<F> {
    fetcher: F,
    import_failure: ImportFailure,
}

impl HttpFetcher {
    pub fn new(insecure: bool) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, location: &Url) -> Result<Vec<u8>, Error> {
        match location.scheme() {
            "file" => {
                let path = location
                    .to_file_path()
                    .map_err(|()| Error::PathConversionError(None))?;

                std::fs::read(&path).map_err(|err| Error::unreachable(location, err))
            }

            "http" | "https" => {
                let response = self
                    .client
                    .get(location.clone())
                    .send()
                    .map_err(|err| Error::unreachable(location, err))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Error::unreachable(location, format!("HTTP status {}", status)));
                }

                let bytes = response
                    .bytes()
                    .map_err(|err| Error::unreachable(location, err))?;

                Ok(bytes.to_vec())
            }

            other => Err(Error::UnsupportedScheme(other.into())),
        }
    }
}

impl Loader<HttpFetcher> {
    pub fn new(options: &LoadOptions) -> Result<Self, Error> {
        Ok(Self::with_fetcher(
            HttpFetcher::new(options.insecure)?,
            options.import_failure,
        ))
    }
}

impl<F: Fetch> Loader<F> {
    pub fn with_fetcher(fetcher: F, import_failure: ImportFailure) -> Self {
        Self {
            fetcher,
            import_failure,
        }
    }

    /// Fetches the entry document and, breadth-first, every document it
    /// transitively imports or includes. Each location is fetched once; the
    /// result is in discovery order with the entry first.
    pub fn load(&self, entry: &Url) -> Result<Vec<RawDocument>, Error> {
        let entry = canonical(entry.clone());

        let mut seen = HashSet::new();
        seen.insert(entry.clone());

        let mut queue = VecDeque::new();
        queue.push_back(entry.clone());

        let mut documents = Vec::new();

        while let Some(location) = queue.pop_front() {
            debug!(%location, "fetching");

            let bytes = match self.fetcher.fetch(&location) {
                Ok(bytes) => bytes,

                Err(err) if location != entry && self.import_failure == ImportFailure::Warn => {
                    warn!(%location, error = %err, "skipping unreachable import");
                    continue;
                }

                Err(err) => return Err(err),
            };

            for reference in scan_references(&location, &bytes)? {
                let target = canonical(location.join(&reference)?);

                if seen.insert(target.clone()) {
                    debug!(from = %location, to = %target, "discovered reference");
                    queue.push_back(target);
                }
            }

            documents.push(RawDocument { location, bytes });
        }

        Ok(documents)
    }
}

fn canonical(mut location: Url) -> Url {
    location.set_fragment(None);
    location
}

/// Turns a command-line style location into a URL; anything that is not an
/// absolute URL is treated as a filesystem path.
pub fn entry_url(location: &str) -> Result<Url, Error> {
    match Url::parse(location) {
        Ok(url) => Ok(url),

        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let path = Path::new(location)
                .canonicalize()
                .map_err(|err| Error::PathConversionError(Some(err)))?;

            Url::from_file_path(&path).map_err(|()| Error::PathConversionError(None))
        }

        Err(err) => Err(err.into()),
    }
}

/// Lists the locations a document points at through WSDL `import` and XSD
/// `import`/`include`/`redefine`.
pub fn scan_references(location: &Url, bytes: &[u8]) -> Result<Vec<String>, Error> {
    let mut reader = Reader::from_reader(bytes);
    let mut buffer = Vec::new();
    let mut references = Vec::new();

    let malformed = |offset: usize, err: quick_xml::Error| Error::MalformedDocument {
        document: location.clone(),
        offset,
        message: err.to_string(),
    };

    loop {
        let offset = reader.buffer_position();

        match reader.read_event(&mut buffer) {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                if matches!(start.local_name(), b"import" | b"include" | b"redefine") {
                    let [schema_location, location] =
                        get_attributes(&reader, start.attributes(), ["schemaLocation", "location"])
                            .map_err(|err| malformed(offset, err))?;

                    references.extend(schema_location.or(location));
                }
            }

            Ok(Event::Eof) => break,
            Ok(_) => (),
            Err(err) => return Err(malformed(offset, err)),
        }

        buffer.clear();
    }

    Ok(references)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{cell::RefCell, collections::HashMap};

    /// Serves documents from memory and records every fetch.
    #[derive(Default)]
    pub(crate) struct MemoryFetcher {
        pub documents: HashMap<Url, String>,
        pub fetched: RefCell<Vec<Url>>,
    }

    impl MemoryFetcher {
        pub fn with(mut self, location: &str, body: &str) -> Self {
            self.documents
                .insert(Url::parse(location).unwrap(), body.to_owned());
            self
        }
    }

    impl Fetch for MemoryFetcher {
        fn fetch(&self, location: &Url) -> Result<Vec<u8>, Error> {
            self.fetched.borrow_mut().push(location.clone());
            self.documents
                .get(location)
                .map(|body| body.clone().into_bytes())
                .ok_or_else(|| Error::unreachable(location, "not found"))
        }
    }

    fn schema_importing(target: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:{0}">
                <xs:import namespace="urn:other" schemaLocation="{0}"/>
            </xs:schema>"#,
            target
        )
    }

    #[test]
    fn import_cycle_is_fetched_once_per_document() {
        let fetcher = MemoryFetcher::default()
            .with("http://host/xsd/a.xsd", &schema_importing("b.xsd"))
            .with("http://host/xsd/b.xsd", &schema_importing("a.xsd"));
        let loader = Loader::with_fetcher(fetcher, ImportFailure::Abort);

        let entry = Url::parse("http://host/xsd/a.xsd").unwrap();
        let documents = loader.load(&entry).unwrap();

        let locations: Vec<_> = documents.iter().map(|doc| doc.location.as_str()).collect();
        assert_eq!(locations, ["http://host/xsd/a.xsd", "http://host/xsd/b.xsd"]);
        assert_eq!(loader.fetcher.fetched.borrow().len(), 2);
    }

    #[test]
    fn relative_locations_resolve_against_importer() {
        let wsdl = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" targetNamespace="urn:s">
            <import location="../shared/common.wsdl"/>
        </definitions>"#;

        let fetcher = MemoryFetcher::default()
            .with("http://host/api/v1/service.wsdl", wsdl)
            .with("http://host/api/shared/common.wsdl", &schema_importing("types.xsd"))
            .with("http://host/api/shared/types.xsd", &schema_importing("types.xsd"));
        let loader = Loader::with_fetcher(fetcher, ImportFailure::Abort);

        let entry = Url::parse("http://host/api/v1/service.wsdl").unwrap();
        let documents = loader.load(&entry).unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(
            documents[2].location.as_str(),
            "http://host/api/shared/types.xsd"
        );
    }

    #[test]
    fn nested_failure_aborts_by_default() {
        let fetcher = MemoryFetcher::default().with("http://host/a.xsd", &schema_importing("missing.xsd"));
        let loader = Loader::with_fetcher(fetcher, ImportFailure::Abort);

        let err = loader.load(&Url::parse("http://host/a.xsd").unwrap()).unwrap_err();
        match err {
            Error::UnreachableResource { location, .. } => {
                assert_eq!(location.as_str(), "http://host/missing.xsd")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn nested_failure_can_be_skipped() {
        let fetcher = MemoryFetcher::default().with("http://host/a.xsd", &schema_importing("missing.xsd"));
        let loader = Loader::with_fetcher(fetcher, ImportFailure::Warn);

        let documents = loader.load(&Url::parse("http://host/a.xsd").unwrap()).unwrap();
        assert_eq!(documents.len(), 1);
    }

    #[test]
    fn entry_failure_always_aborts() {
        let loader = Loader::with_fetcher(MemoryFetcher::default(), ImportFailure::Warn);

        let err = loader.load(&Url::parse("http://host/gone.wsdl").unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnreachableResource { .. }));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let fetcher = HttpFetcher::new(false).unwrap();
        let err = fetcher
            .fetch(&Url::parse("ftp://host/service.wsdl").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(scheme) if scheme == "ftp"));
    }
}
