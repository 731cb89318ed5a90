use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{
    error::Error,
    options::Visibility,
    types::{
        Builtin, Field, FieldKind, Operation, PortTypeInterface, ResolvedGraph, ResolvedKind,
        ResolvedType, Shape, Target, TypeRef,
    },
};

pub trait Codegen {
    fn codegen(&self, graph: &ResolvedGraph) -> TokenStream;
}

fn codegen_all(all: &[impl Codegen], graph: &ResolvedGraph) -> Vec<TokenStream> {
    all.iter().map(|item| item.codegen(graph)).collect()
}

fn visibility(graph: &ResolvedGraph) -> TokenStream {
    match graph.visibility {
        Visibility::Public => quote! { pub },
        Visibility::Crate => quote! { pub(crate) },
    }
}

fn doc_attributes(documentation: Option<&str>) -> TokenStream {
    let lines = documentation
        .into_iter()
        .flat_map(str::lines)
        .map(|line| format!(" {}", line.trim()));

    quote! { #(#[doc = #lines])* }
}

fn builtin_tokens(builtin: Builtin) -> TokenStream {
    match builtin {
        Builtin::String => quote! { String },
        Builtin::Bool => quote! { bool },
        Builtin::I8 => quote! { i8 },
        Builtin::I16 => quote! { i16 },
        Builtin::I32 => quote! { i32 },
        Builtin::I64 => quote! { i64 },
        Builtin::U8 => quote! { u8 },
        Builtin::U16 => quote! { u16 },
        Builtin::U32 => quote! { u32 },
        Builtin::U64 => quote! { u64 },
        Builtin::F32 => quote! { f32 },
        Builtin::F64 => quote! { f64 },
        Builtin::DateTime => quote! { wsdlc_runtime::XsdDateTime },
        Builtin::Date => quote! { wsdlc_runtime::XsdDate },
        Builtin::Time => quote! { wsdlc_runtime::XsdTime },
        Builtin::Bytes => quote! { Vec<u8> },
    }
}

/// `path` prefixes generated names, for use outside the `types` module.
fn type_tokens(ty: &TypeRef, path: &TokenStream) -> TokenStream {
    let inner = match &ty.target {
        Target::Builtin(builtin) => builtin_tokens(*builtin),
        Target::Named(name) => {
            let ident = format_ident!("{}", name);
            quote! { #path #ident }
        }
        Target::Opaque => quote! { wsdlc_runtime::AnyType },
    };

    let inner = if ty.boxed {
        quote! { Box<#inner> }
    } else {
        inner
    };

    match ty.shape {
        Shape::Scalar | Shape::Struct => inner,
        Shape::Optional => quote! { Option<#inner> },
        Shape::Sequence => quote! { Vec<#inner> },
    }
}

impl Codegen for ResolvedType {
    fn codegen(&self, graph: &ResolvedGraph) -> TokenStream {
        let vis = visibility(graph);
        let name = format_ident!("{}", self.name);
        let docs = doc_attributes(self.documentation.as_deref());
        let xml_name = &self.xml_name;

        match &self.kind {
            ResolvedKind::Alias { target, .. } => {
                let target = type_tokens(target, &quote! {});

                quote! {
                    #docs
                    #vis type #name = #target;
                }
            }

            ResolvedKind::Enumeration { constants, .. } => {
                let variants = constants.iter().enumerate().map(|(index, constant)| {
                    let ident = format_ident!("{}", constant.name);
                    let value = &constant.value;
                    let docs = doc_attributes(constant.documentation.as_deref());
                    let default = if index == 0 {
                        quote! { #[default] }
                    } else {
                        quote! {}
                    };

                    quote! {
                        #docs
                        #default
                        #[serde(rename = #value)]
                        #ident,
                    }
                });

                let arms = constants.iter().map(|constant| {
                    let ident = format_ident!("{}", constant.name);
                    let value = &constant.value;
                    quote! { Self::#ident => #value, }
                });

                quote! {
                    #docs
                    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, wsdlc_runtime::serde::Serialize, wsdlc_runtime::serde::Deserialize)]
                    #[serde(crate = "wsdlc_runtime::serde")]
                    #vis enum #name {
                        #(#variants)*
                    }

                    impl #name {
                        /// The value as it appears on the wire.
                        #vis fn as_str(&self) -> &'static str {
                            match self {
                                #(#arms)*
                            }
                        }
                    }

                    impl std::fmt::Display for #name {
                        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                            f.write_str(self.as_str())
                        }
                    }
                }
            }

            ResolvedKind::Struct { fields } => {
                let fields = codegen_all(fields, graph);

                quote! {
                    #docs
                    #[derive(Debug, Clone, Default, PartialEq, wsdlc_runtime::serde::Serialize, wsdlc_runtime::serde::Deserialize)]
                    #[serde(crate = "wsdlc_runtime::serde", rename = #xml_name)]
                    #vis struct #name {
                        #(#fields)*
                    }
                }
            }
        }
    }
}

impl Codegen for Field {
    fn codegen(&self, graph: &ResolvedGraph) -> TokenStream {
        let vis = visibility(graph);
        let name = format_ident!("{}", self.name);
        let docs = doc_attributes(self.documentation.as_deref());
        let ty = type_tokens(&self.ty, &quote! {});
        let rename = &self.xml_name;

        let serde = match (self.kind, self.ty.shape) {
            (FieldKind::Flatten, _) => quote! { #[serde(flatten)] },
            (_, Shape::Optional) => {
                quote! { #[serde(rename = #rename, default, skip_serializing_if = "Option::is_none")] }
            }
            (_, Shape::Sequence) => {
                quote! { #[serde(rename = #rename, default, skip_serializing_if = "Vec::is_empty")] }
            }
            _ => quote! { #[serde(rename = #rename)] },
        };

        quote! {
            #docs
            #serde
            #vis #name: #ty,
        }
    }
}

fn operation_docs(operation: &Operation) -> TokenStream {
    let mut text = operation.documentation.clone().unwrap_or_default();

    if !operation.faults.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str("# Faults\n");

        for fault in &operation.faults {
            let ty = fault.ty.as_ref().and_then(TypeRef::name).unwrap_or("()");
            text.push_str(&format!("\n- `{}`: [`super::types::{}`]", fault.name, ty));
        }
    }

    doc_attributes(Some(&text).filter(|text| !text.is_empty()).map(String::as_str))
}

fn signature(operation: &Operation) -> TokenStream {
    let types = quote! { super::types:: };
    let method = format_ident!("{}", operation.method_name);

    let request = operation.request.as_ref().map(|ty| {
        let ty = type_tokens(ty, &types);
        quote! { , request: &#ty }
    });

    let response = match &operation.response {
        Some(ty) => type_tokens(ty, &types),
        None => quote! { () },
    };

    quote! {
        fn #method(&self, ctx: &wsdlc_runtime::Context #request) -> Result<#response, wsdlc_runtime::Error>
    }
}

impl Codegen for Operation {
    fn codegen(&self, _: &ResolvedGraph) -> TokenStream {
        let docs = operation_docs(self);
        let signature = signature(self);

        quote! {
            #docs
            #signature;
        }
    }
}

fn client_method(operation: &Operation) -> TokenStream {
    let signature = signature(operation);
    let action = &operation.action;
    let name = &operation.name;

    let request = if operation.request.is_some() {
        quote! { Some(request) }
    } else {
        quote! { None::<&()> }
    };

    quote! {
        #signature {
            let call = wsdlc_runtime::Call {
                endpoint: &self.endpoint,
                action: #action,
                operation: #name,
            };

            self.transport.call(ctx, &call, #request)
        }
    }
}

impl Codegen for PortTypeInterface {
    fn codegen(&self, graph: &ResolvedGraph) -> TokenStream {
        let vis = visibility(graph);
        let name = format_ident!("{}", self.name);
        let client = format_ident!("{}Client", self.name);
        let docs = doc_attributes(self.documentation.as_deref());

        let signatures = codegen_all(&self.operations, graph);
        let methods = self.operations.iter().map(client_method);

        let default_endpoint = self.endpoint.as_ref().map(|endpoint| {
            quote! {
                /// The endpoint declared by the service description.
                #vis const DEFAULT_ENDPOINT: &'static str = #endpoint;

                #vis fn with_default_endpoint(transport: T) -> Self {
                    Self::new(transport, Self::DEFAULT_ENDPOINT)
                }
            }
        });

        quote! {
            #docs
            #vis trait #name {
                #(#signatures)*
            }

            #vis struct #client<T> {
                transport: T,
                endpoint: String,
            }

            impl<T: wsdlc_runtime::Transport> #client<T> {
                #default_endpoint

                #vis fn new(transport: T, endpoint: impl Into<String>) -> Self {
                    Self {
                        transport,
                        endpoint: endpoint.into(),
                    }
                }

                #vis fn endpoint(&self) -> &str {
                    &self.endpoint
                }
            }

            impl<T: wsdlc_runtime::Transport> #name for #client<T> {
                #(#methods)*
            }
        }
    }
}

pub fn codegen(graph: &ResolvedGraph, interfaces: &[PortTypeInterface]) -> TokenStream {
    let types = codegen_all(graph.types(), graph);
    let interfaces = codegen_all(interfaces, graph);

    quote! {
        #[allow(dead_code, clippy::all)]
        pub mod types {
            #(#types)*
        }

        #[allow(dead_code, clippy::all)]
        pub mod operations {
            #(#interfaces)*
        }
    }
}

/// Pretty-prints generated tokens as a source file.
pub fn render(tokens: TokenStream) -> Result<String, Error> {
    let file = syn::parse2::<syn::File>(tokens)?;
    Ok(prettyplease::unparse(&file))
}
