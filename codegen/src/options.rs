use std::collections::BTreeMap;

use wsdlc_wsdl::LoadOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Generated items are `pub`.
    Public,
    /// Generated items are `pub(crate)`.
    Crate,
}

/// Namespace URI to short identifier; types from an aliased namespace are
/// always prefixed with the alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceAliases(BTreeMap<String, String>);

#[derive(Debug, Clone)]
pub struct Options {
    pub load: LoadOptions,
    /// Whether generated items are exported from the generated module.
    pub exported: bool,
    pub aliases: NamespaceAliases,
}

impl NamespaceAliases {
    /// The aliases used for well-known service families.
    pub fn well_known() -> Self {
        [
            ("http://schemas.xmlsoap.org/wsdl/soap12/", "Soap"),
            ("http://www.onvif.org/ver10/media/wsdl", "Media"),
            ("http://www.onvif.org/ver10/schema", "Onvif"),
            ("http://docs.oasis-open.org/wsn/b-2", "B2"),
        ]
        .into_iter()
        .collect()
    }

    pub fn insert(&mut self, namespace: impl Into<String>, alias: impl Into<String>) {
        self.0.insert(namespace.into(), alias.into());
    }

    pub fn get(&self, namespace: &str) -> Option<&str> {
        self.0.get(namespace).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, A: Into<String>> FromIterator<(N, A)> for NamespaceAliases {
    fn from_iter<I: IntoIterator<Item = (N, A)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(namespace, alias)| (namespace.into(), alias.into()))
                .collect(),
        )
    }
}

impl Visibility {
    pub fn from_exported(exported: bool) -> Self {
        if exported {
            Visibility::Public
        } else {
            Visibility::Crate
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            exported: true,
            aliases: NamespaceAliases::default(),
        }
    }
}
