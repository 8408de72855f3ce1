//! Procedural macros for cql_sync
//!
//! This crate provides `#[derive(Record)]`, which binds a struct with named
//! fields to a table.
//!
//! ```ignore
//! #[derive(Record)]
//! #[cql(table = "users", virtual_values = "computed")]
//! struct User {
//!     id: uuid::Uuid,
//!     #[cql(rename = "email_address")]
//!     email: String,
//!     #[cql(skip)]
//!     cache: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr};

/// Derive `cql_sync::Record` for a struct with named fields
#[proc_macro_derive(Record, attributes(cql))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_record(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Struct level `#[cql(...)]` options
#[derive(Default)]
struct RecordArgs {
    table: Option<String>,
    virtual_values: Option<Ident>,
}

/// Field level `#[cql(...)]` options
#[derive(Default)]
struct FieldArgs {
    skip: bool,
    rename: Option<String>,
}

fn parse_record_args(attrs: &[Attribute]) -> syn::Result<RecordArgs> {
    let mut args = RecordArgs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("cql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                args.table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("virtual_values") {
                let method: LitStr = meta.value()?.parse()?;
                args.virtual_values = Some(method.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported cql attribute, expected `table` or `virtual_values`"))
            }
        })?;
    }

    Ok(args)
}

fn parse_field_args(attrs: &[Attribute]) -> syn::Result<FieldArgs> {
    let mut args = FieldArgs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("cql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                args.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                args.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported cql field attribute, expected `skip` or `rename`"))
            }
        })?;
    }

    Ok(args)
}

/// `UserProfile` becomes `user_profile`
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }

    out
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Record can only be derived for structs")),
    };

    let args = parse_record_args(&input.attrs)?;
    let table = args.table.unwrap_or_else(|| snake_case(&name.to_string()));

    let mut inserts = Vec::new();
    for field in fields {
        let field_args = parse_field_args(&field.attrs)?;
        if field_args.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let column = field_args.rename.unwrap_or_else(|| ident.to_string());
        inserts.push(quote! {
            values.insert(
                ::std::string::String::from(#column),
                ::cql_sync::Value::from(::std::clone::Clone::clone(&self.#ident)),
            );
        });
    }

    let virtual_values = args.virtual_values.map(|method| {
        quote! {
            fn virtual_values(&self) -> ::cql_sync::indexmap::IndexMap<::std::string::String, ::cql_sync::Value> {
                self.#method()
            }
        }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::cql_sync::Record for #name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }

            fn to_values(&self) -> ::cql_sync::indexmap::IndexMap<::std::string::String, ::cql_sync::Value> {
                let mut values = ::cql_sync::indexmap::IndexMap::new();
                #(#inserts)*
                values
            }

            #virtual_values
        }
    })
}
