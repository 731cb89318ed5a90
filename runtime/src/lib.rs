//! Support types for code generated by `wsdlc`.

pub use serde;

mod scalar;
mod transport;

pub use scalar::{AnyType, XsdDate, XsdDateTime, XsdTime};
pub use transport::{Call, Context, Error, Transport};
