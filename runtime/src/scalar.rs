use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! lexical_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new<S: Into<String>>(value: S) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

lexical_type!(
    /// An `xs:dateTime`, kept in its lexical form.
    XsdDateTime
);

lexical_type!(
    /// An `xs:date`, kept in its lexical form.
    XsdDate
);

lexical_type!(
    /// An `xs:time`, kept in its lexical form.
    XsdTime
);

lexical_type!(
    /// Content of a schema construct with no typed mapping, as raw text.
    AnyType
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_plain_string() {
        let value = XsdDateTime::new("2021-11-05T10:00:00Z");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""2021-11-05T10:00:00Z""#);

        let parsed: XsdDate = serde_json::from_str(r#""2021-11-05""#).unwrap();
        assert_eq!(parsed.as_str(), "2021-11-05");
    }

    #[test]
    fn displays_lexical_form() {
        assert_eq!(AnyType::from("<any/>").to_string(), "<any/>");
        assert_eq!(XsdTime::default().as_str(), "");
    }
}
