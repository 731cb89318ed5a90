use thiserror::Error;
use wsdlc_wsdl::{error::Location, types::NamespacedName};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Wsdl(#[from] wsdlc_wsdl::error::Error),

    #[error("{referrer} refers to {key}, which is not declared")]
    UnresolvableReference {
        referrer: Location,
        key: NamespacedName,
    },

    #[error("Enumeration {ty}: {value:?} maps to the same constant as {existing:?}")]
    EnumNameCollision {
        ty: String,
        value: String,
        existing: String,
    },

    #[error("Unable to render generated code")]
    Render(#[from] syn::Error),
}
