//! Procedural macros for sqlmapper.
//!
//! `#[derive(Entity)]` turns a struct with named fields into a table-mapped
//! entity: it implements `sqlmapper_core::Entity` with static table/column
//! metadata and row conversion, and adds one typed `Field<Self>` constant per
//! column for use with lambda wrappers (`User::NAME`, `User::AGE`).
//!
//! Generated code refers to `sqlmapper_core`, so crates deriving `Entity`
//! depend on it directly.

use proc_macro::TokenStream;
use syn::ext::IdentExt;

mod parse;
mod validate;

use parse::{EntityDef, FieldDef, option_inner_type, parse_entity};

/// Derive macro for the `Entity` trait.
///
/// # Attributes
///
/// On the struct:
/// - `#[entity(table = "name")]` - Table name (defaults to the snake_case struct name)
/// - `#[entity(mapper = "UserMapper")]` - Mapper identifier (defaults to `<Struct>Mapper`)
/// - `#[entity(data_source = "name")]` - Data source key (defaults to `"default"`)
///
/// On fields:
/// - `#[entity(primary_key)]` - Mark the primary key (defaults to a field named `id`)
/// - `#[entity(auto_increment)]` - The database generates the key on insert
/// - `#[entity(column = "name")]` - Column name (defaults to the field name)
/// - `#[entity(skip)]` - Not persisted; loaded as `Default::default()`
///
/// # Example
///
/// ```ignore
/// use sqlmapper::Entity;
///
/// #[derive(Entity)]
/// #[entity(table = "users")]
/// struct User {
///     #[entity(primary_key, auto_increment)]
///     id: Option<i64>,
///
///     name: String,
///
///     #[entity(column = "user_age")]
///     age: Option<i32>,
/// }
///
/// assert_eq!(User::AGE.column(), "user_age");
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let entity = match parse_entity(&input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_entity(&entity) {
        return e.to_compile_error().into();
    }

    generate_entity_impl(&entity).into()
}

/// Generate the `Entity` implementation and the typed column constants.
fn generate_entity_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let table_name = &entity.table_name;
    let mapper = &entity.mapper;
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();

    // validate_entity guarantees a primary key
    let Some(pk) = entity.primary_key_field() else {
        return syn::Error::new(name.span(), "no primary key").to_compile_error();
    };
    let pk_column = &pk.column_name;

    let data_source = entity.data_source.as_ref().map(|ds| {
        quote::quote! { const DATA_SOURCE: &'static str = #ds; }
    });

    let field_infos = generate_field_infos(entity, pk);
    let to_row_body = generate_to_row(entity);
    let from_row_body = generate_from_row(entity);
    let pk_name = &pk.name;
    let set_generated_key = generate_set_generated_key(pk);
    let field_consts = generate_field_consts(entity);

    quote::quote! {
        impl #impl_generics sqlmapper_core::Entity for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const PRIMARY_KEY: &'static str = #pk_column;
            const MAPPER: &'static str = #mapper;
            #data_source

            fn fields() -> &'static [sqlmapper_core::FieldInfo] {
                static FIELDS: &[sqlmapper_core::FieldInfo] = &[
                    #(#field_infos),*
                ];
                FIELDS
            }

            fn to_row(&self) -> Vec<(&'static str, sqlmapper_core::Value)> {
                #to_row_body
            }

            fn from_row(row: &sqlmapper_core::Row) -> sqlmapper_core::Result<Self> {
                #from_row_body
            }

            fn primary_key_value(&self) -> sqlmapper_core::Value {
                sqlmapper_core::Value::from(self.#pk_name.clone())
            }

            #set_generated_key
        }

        impl #impl_generics #name #ty_generics #where_clause {
            #(#field_consts)*
        }
    }
}

fn generate_field_infos(entity: &EntityDef, pk: &FieldDef) -> Vec<proc_macro2::TokenStream> {
    entity
        .column_fields()
        .map(|field| {
            let field_name = field.name.unraw().to_string();
            let column_name = &field.column_name;
            let nullable = field.nullable;
            let primary_key = field.name == pk.name;
            let auto_increment = field.auto_increment;
            quote::quote! {
                sqlmapper_core::FieldInfo::new(#field_name, #column_name)
                    .nullable(#nullable)
                    .primary_key(#primary_key)
                    .auto_increment(#auto_increment)
            }
        })
        .collect()
}

/// `to_row` keys values by column name; `Option` fields become NULL when `None`.
fn generate_to_row(entity: &EntityDef) -> proc_macro2::TokenStream {
    let pairs = entity.column_fields().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        quote::quote! {
            (#column_name, sqlmapper_core::Value::from(self.#field_name.clone()))
        }
    });

    quote::quote! {
        vec![#(#pairs),*]
    }
}

/// Columns missing from a projected row read as NULL.
fn generate_from_row(entity: &EntityDef) -> proc_macro2::TokenStream {
    let assignments = entity.fields.iter().map(|field| {
        let field_name = &field.name;
        if field.skip {
            return quote::quote! { #field_name: Default::default() };
        }
        let column_name = &field.column_name;
        quote::quote! { #field_name: row.get_projected(#column_name)? }
    });

    quote::quote! {
        Ok(Self {
            #(#assignments,)*
        })
    }
}

/// Only auto-increment keys receive generated ids. Ids that do not fit the
/// key's type are dropped.
fn generate_set_generated_key(pk: &FieldDef) -> Option<proc_macro2::TokenStream> {
    if !pk.auto_increment {
        return None;
    }
    let field_name = &pk.name;
    let body = match option_inner_type(&pk.ty) {
        Some(inner) => quote::quote! {
            if let Ok(key) = <#inner as ::core::convert::TryFrom<i64>>::try_from(id) {
                self.#field_name = Some(key);
            }
        },
        None => {
            let ty = &pk.ty;
            quote::quote! {
                if let Ok(key) = <#ty as ::core::convert::TryFrom<i64>>::try_from(id) {
                    self.#field_name = key;
                }
            }
        }
    };

    Some(quote::quote! {
        fn set_generated_key(&mut self, id: i64) {
            #body
        }
    })
}

/// One `Field<Self>` constant per column, named after the upper-cased field.
fn generate_field_consts(entity: &EntityDef) -> Vec<proc_macro2::TokenStream> {
    entity
        .column_fields()
        .map(|field| {
            let const_name = syn::Ident::new(
                &field.name.unraw().to_string().to_uppercase(),
                field.name.span(),
            );
            let column_name = &field.column_name;
            let doc = format!("Column `{column_name}`.");
            quote::quote! {
                #[doc = #doc]
                #[allow(dead_code)]
                pub const #const_name: sqlmapper_core::Field<Self> =
                    sqlmapper_core::Field::new(#column_name);
            }
        })
        .collect()
}
