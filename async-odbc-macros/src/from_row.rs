//! FromRow derive macro implementation.

use heck::{ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, spanned::Spanned};

#[derive(Clone, Copy)]
enum RenameAll {
    Snake,
    Lower,
    Upper,
    Camel,
    Pascal,
    ScreamingSnake,
}

impl RenameAll {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "snake_case" => Self::Snake,
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "camelCase" => Self::Camel,
            "PascalCase" => Self::Pascal,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            other => {
                return Err(syn::Error::new_spanned(
                    lit,
                    format!("unknown rename_all style `{other}`"),
                ));
            }
        })
    }

    fn apply(self, name: &str) -> String {
        match self {
            Self::Snake => name.to_snake_case(),
            Self::Lower => name.to_lowercase(),
            Self::Upper => name.to_uppercase(),
            Self::Camel => name.to_lower_camel_case(),
            Self::Pascal => name.to_upper_camel_case(),
            Self::ScreamingSnake => name.to_shouty_snake_case(),
        }
    }
}

fn container_rename_all(attrs: &[Attribute]) -> syn::Result<RenameAll> {
    let mut rename_all = RenameAll::Snake;
    for attr in attrs.iter().filter(|a| a.path().is_ident("odbc")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                rename_all = RenameAll::parse(&meta.value()?.parse()?)?;
                Ok(())
            } else {
                Err(meta.error("unsupported container attribute"))
            }
        })?;
    }
    Ok(rename_all)
}

pub fn expand_derive_from_row(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "FromRow cannot be derived for tuple structs",
                ));
            }
            Fields::Unit => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "FromRow cannot be derived for unit structs",
                ));
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input,
                "FromRow can only be derived for structs with named fields",
            ));
        }
    };

    let rename_all = container_rename_all(&input.attrs)?;
    let mut field_initializers = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let field_ty = &field.ty;

        let mut column_name = rename_all.apply(&field_ident.to_string());
        let mut skip = false;
        let mut use_default = false;
        let mut flatten = false;

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("odbc")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    column_name = lit.value();
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("default") {
                    use_default = true;
                } else if meta.path.is_ident("flatten") {
                    flatten = true;
                } else {
                    return Err(meta.error("unsupported field attribute"));
                }
                Ok(())
            })?;
        }

        let initializer = if skip {
            quote_spanned! { field.span() =>
                #field_ident: ::std::default::Default::default()
            }
        } else if flatten {
            quote_spanned! { field.span() =>
                #field_ident: <#field_ty as ::async_odbc::FromRow>::from_row(row)?
            }
        } else if use_default {
            // missing columns and NULLs fall back to the default, decode errors do not
            quote_spanned! { field.span() =>
                #field_ident: match row.try_get::<::std::option::Option<#field_ty>, _>(#column_name) {
                    ::std::result::Result::Ok(::std::option::Option::Some(value)) => value,
                    ::std::result::Result::Ok(::std::option::Option::None)
                    | ::std::result::Result::Err(::async_odbc::Error::ColumnNotFound(_)) => {
                        ::std::default::Default::default()
                    }
                    ::std::result::Result::Err(e) => return ::std::result::Result::Err(e),
                }
            }
        } else {
            quote_spanned! { field.span() =>
                #field_ident: row.try_get::<#field_ty, _>(#column_name)?
            }
        };

        field_initializers.push(initializer);
    }

    Ok(quote! {
        impl #impl_generics ::async_odbc::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: &::async_odbc::Row) -> ::async_odbc::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#field_initializers),*
                })
            }
        }
    })
}
