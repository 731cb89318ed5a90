use std::collections::HashSet;

use check_keyword::CheckKeyword;
use heck::{ToSnakeCase, ToUpperCamelCase};

use super::options::NamespaceAliases;

/// Names the generated code relies on being the prelude items.
const RESERVED_TYPE_NAMES: &[&str] = &[
    "Box", "Default", "Err", "None", "Ok", "Option", "Result", "Self", "Some", "String", "Vec",
];

fn sanitize(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());

    for (index, c) in raw.trim().chars().enumerate() {
        match c {
            c if c.is_ascii_alphanumeric() => sanitized.push(c),
            '-' if index == 0 => sanitized.push_str("minus_"),
            '+' => sanitized.push_str("_plus_"),
            _ => sanitized.push('_'),
        }
    }

    sanitized
}

fn starts_with_digit(name: &str) -> bool {
    name.chars().next().map_or(false, |c| c.is_ascii_digit())
}

/// `UpperCamelCase` name for a struct, enum or alias.
pub fn type_name(raw: &str) -> String {
    let name = sanitize(raw).to_upper_camel_case();

    if name.is_empty() {
        "Type".into()
    } else if starts_with_digit(&name) {
        format!("Type{}", name)
    } else if RESERVED_TYPE_NAMES.contains(&name.as_str()) {
        format!("{}Type", name)
    } else {
        name
    }
}

/// `snake_case` name for a field or method.
pub fn field_name(raw: &str) -> String {
    let name = sanitize(raw).to_snake_case();

    if name.is_empty() {
        "value".into()
    } else if starts_with_digit(&name) {
        format!("field_{}", name)
    } else if name.is_keyword() {
        format!("{}_", name)
    } else {
        name
    }
}

/// Type name for a declaration; namespaces with an alias always get it as a
/// prefix.
pub fn qualified_type_name(aliases: &NamespaceAliases, namespace: &str, local: &str) -> String {
    match aliases.get(namespace) {
        Some(alias) => type_name(&format!("{}_{}", alias, local)),
        None => type_name(local),
    }
}

/// `UpperCamelCase` name for an enumeration value.
pub fn variant_name(raw: &str) -> String {
    let name = sanitize(raw).to_upper_camel_case();

    if name.is_empty() {
        "Empty".into()
    } else if starts_with_digit(&name) {
        format!("Value{}", name)
    } else if name == "Self" {
        "SelfValue".into()
    } else {
        name
    }
}

/// Hands out unique names, suffixing `2`, `3`, ... on collision.
#[derive(Debug, Default)]
pub struct NameTable(HashSet<String>);

impl NameTable {
    pub fn claim(&mut self, base: String) -> String {
        self.claim_with(base, &[])
    }

    /// Claims `base` together with `base` + each of `companions`, suffixing
    /// all of them alike until every one is free.
    pub fn claim_with(&mut self, base: String, companions: &[&str]) -> String {
        let mut candidate = base.clone();
        let mut suffix = 2;

        loop {
            let free = !self.0.contains(&candidate)
                && companions
                    .iter()
                    .all(|companion| !self.0.contains(&format!("{}{}", candidate, companion)));

            if free {
                for companion in companions {
                    self.0.insert(format!("{}{}", candidate, companion));
                }
                self.0.insert(candidate.clone());
                return candidate;
            }

            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
    }
}
