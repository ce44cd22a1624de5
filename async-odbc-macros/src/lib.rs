//! Procedural macros for async-odbc.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "derive")]
#[cfg_attr(docsrs, doc(cfg(feature = "derive")))]
mod from_row;

/// Derive macro for implementing the `FromRow` trait.
///
/// Each named field is read from the column with the same name, decoded
/// through `Decode`.
///
/// # Example
///
/// ```ignore
/// use async_odbc::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[odbc(rename_all = "camelCase")]` on the struct - derive column names
///   from field names in another case (`snake_case`, `lowercase`, `UPPERCASE`,
///   `camelCase`, `PascalCase`, `SCREAMING_SNAKE_CASE`)
/// - `#[odbc(rename = "column_name")]` - read a differently named column
/// - `#[odbc(skip)]` - do not read the field, use `Default::default()`
/// - `#[odbc(default)]` - use `Default::default()` if the column is NULL or missing
/// - `#[odbc(flatten)]` - build a nested `FromRow` struct from the same row
#[cfg(feature = "derive")]
#[cfg_attr(docsrs, doc(cfg(feature = "derive")))]
#[proc_macro_derive(FromRow, attributes(odbc))]
pub fn derive_from_row(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    from_row::expand_derive_from_row(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
