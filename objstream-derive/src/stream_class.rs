//! Derive macro implementation for `StreamClass`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitInt, LitStr};

#[derive(Default)]
struct ClassAttrs {
    name: Option<String>,
    version: Option<i64>,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    unshared: bool,
    skip: bool,
}

pub fn derive_stream_class_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "StreamClass cannot be derived for generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "StreamClass only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "StreamClass can only be derived for structs",
            ))
        }
    };

    let class_attrs = parse_class_attrs(&input.attrs)?;
    let class_name = class_attrs.name.unwrap_or_else(|| ident.to_string());
    let version = class_attrs
        .version
        .map(|v| quote! { .serial_version(#v) });

    let mut declarations = Vec::new();
    let mut stores = Vec::new();
    let mut loads = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let field_ty = &field.ty;
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            loads.push(quote! { #field_ident: ::core::default::Default::default() });
            continue;
        }
        let wire_name = attrs.rename.unwrap_or_else(|| field_ident.to_string());
        let field_type =
            quote! { <#field_ty as ::objstream_core::model::StreamType>::field_type() };

        declarations.push(if attrs.unshared {
            quote! { .unshared_field(#wire_name, #field_type) }
        } else {
            quote! { .field(#wire_name, #field_type) }
        });
        stores.push(quote! {
            object.set_field(
                #wire_name,
                ::objstream_core::model::StreamType::to_value(&self.#field_ident)?,
            )?;
        });
        loads.push(quote! {
            #field_ident: ::objstream_core::model::required_field::<#field_ty>(object, #wire_name)?
        });
    }

    Ok(quote! {
        impl ::objstream_core::model::StreamClass for #ident {
            fn class_definition() -> ::objstream_core::model::ClassRef {
                static CLASS: ::std::sync::OnceLock<::objstream_core::model::ClassRef> =
                    ::std::sync::OnceLock::new();
                CLASS
                    .get_or_init(|| {
                        ::objstream_core::model::ClassDefinition::builder(#class_name)
                            .serializable()
                            #(#declarations)*
                            #version
                            .build()
                    })
                    .clone()
            }

            fn to_object(&self) -> ::objstream_core::Result<::objstream_core::model::ObjectRef> {
                let object = ::objstream_core::model::ObjectRef::instance(
                    &<Self as ::objstream_core::model::StreamClass>::class_definition(),
                );
                #(#stores)*
                Ok(object)
            }

            fn from_object(
                object: &::objstream_core::model::ObjectRef,
            ) -> ::objstream_core::Result<Self> {
                Ok(Self {
                    #(#loads,)*
                })
            }
        }

        impl ::objstream_core::model::StreamType for #ident {
            fn field_type() -> ::objstream_core::model::FieldType {
                ::objstream_core::model::FieldType::object(#class_name)
            }

            fn to_value(&self) -> ::objstream_core::Result<::objstream_core::model::Value> {
                ::objstream_core::model::StreamClass::to_object(self)
                    .map(::objstream_core::model::Value::Object)
            }

            fn from_value(
                value: ::objstream_core::model::Value,
            ) -> ::objstream_core::Result<Self> {
                match value.as_object() {
                    Some(object) => ::objstream_core::model::StreamClass::from_object(object),
                    None => Err(::objstream_core::StreamError::InvalidObject(::std::format!(
                        "expected {}, found {}",
                        #class_name,
                        value.type_name()
                    ))),
                }
            }
        }
    })
}

fn parse_class_attrs(attrs: &[Attribute]) -> syn::Result<ClassAttrs> {
    let mut parsed = ClassAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("stream")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("version") {
                parsed.version = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported stream attribute; expected `name` or `version`"))
            }
        })?;
    }
    Ok(parsed)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("stream")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("unshared") {
                parsed.unshared = true;
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else {
                return Err(meta.error(
                    "unsupported stream field attribute; expected `rename`, `unshared` or `skip`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}
