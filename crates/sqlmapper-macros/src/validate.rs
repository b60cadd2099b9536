//! Compile-time validation for the `Entity` derive macro.
//!
//! Every problem found is reported at once, each pointing at the offending
//! struct or field.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::{Error, Type};

use crate::parse::{EntityDef, FieldDef, option_inner_type};

/// Names the `Entity` trait already uses as associated constants.
const RESERVED_CONSTS: &[&str] = &["TABLE_NAME", "PRIMARY_KEY", "MAPPER", "DATA_SOURCE"];

/// Validate a parsed entity definition.
pub fn validate_entity(entity: &EntityDef) -> Result<(), Error> {
    let mut errors = Vec::new();
    let span = entity.name.span();

    if entity.column_fields().next().is_none() {
        errors.push(Error::new(span, "Entity struct must have at least one column field"));
    }
    validate_identifier("table name", &entity.table_name, span, &mut errors);
    if entity.mapper.trim().is_empty() {
        errors.push(Error::new(span, "mapper name cannot be empty"));
    }
    if let Some(data_source) = &entity.data_source {
        if data_source.trim().is_empty() {
            errors.push(Error::new(span, "data_source cannot be empty"));
        }
    }

    validate_primary_key(entity, &mut errors);
    validate_no_duplicate_columns(entity, &mut errors);

    for field in &entity.fields {
        validate_type(&field.ty, field.name.span(), &mut errors);
        if field.skip {
            continue;
        }
        validate_identifier("column name", &field.column_name, field.name.span(), &mut errors);
        validate_const_name(field, &mut errors);
    }

    match errors.into_iter().reduce(|mut combined, err| {
        combined.combine(err);
        combined
    }) {
        None => Ok(()),
        Some(combined) => Err(combined),
    }
}

/// Identifiers are `name` or `schema.name`, letters, digits and underscores.
fn validate_identifier(kind: &str, ident: &str, span: Span, errors: &mut Vec<Error>) {
    let part_ok = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = ident.split('.').collect();
    if parts.len() > 2 || !parts.iter().copied().all(part_ok) {
        errors.push(Error::new(
            span,
            format!(
                "invalid {kind} '{ident}'; use letters, digits and underscores, \
                 optionally qualified as schema.name"
            ),
        ));
    }
}

fn validate_primary_key(entity: &EntityDef, errors: &mut Vec<Error>) {
    let marked: Vec<&FieldDef> = entity.column_fields().filter(|f| f.primary_key).collect();
    if marked.len() > 1 {
        for field in &marked[1..] {
            errors.push(Error::new(
                field.name.span(),
                "only one field can be #[entity(primary_key)]",
            ));
        }
    }

    if entity.primary_key_field().is_none() {
        errors.push(Error::new(
            entity.name.span(),
            "no primary key; mark a field with #[entity(primary_key)] or name it `id`",
        ));
    }

    for field in entity.column_fields() {
        if field.auto_increment && !field.primary_key {
            errors.push(Error::new(
                field.name.span(),
                "auto_increment requires primary_key; add #[entity(primary_key)] to this field",
            ));
        }
    }
}

fn validate_no_duplicate_columns(entity: &EntityDef, errors: &mut Vec<Error>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for field in entity.column_fields() {
        if !seen.insert(&field.column_name) {
            errors.push(Error::new(
                field.name.span(),
                format!(
                    "duplicate column name '{}'; another field already maps to this column",
                    field.column_name
                ),
            ));
        }
    }
}

/// The generated `Field` constant must not shadow the trait's constants.
fn validate_const_name(field: &FieldDef, errors: &mut Vec<Error>) {
    let const_name = field.name.unraw().to_string().to_uppercase();
    if RESERVED_CONSTS.contains(&const_name.as_str()) {
        errors.push(Error::new(
            field.name.span(),
            format!(
                "field `{}` would generate a constant `{const_name}` that clashes with \
                 Entity::{const_name}; rename the field and use #[entity(column = \"...\")]",
                field.name
            ),
        ));
    }
}

fn validate_type(ty: &Type, span: Span, errors: &mut Vec<Error>) {
    if option_inner_type(ty).is_some_and(|inner| option_inner_type(inner).is_some()) {
        errors.push(Error::new(
            span,
            "nested Option<Option<T>> is ambiguous and not supported",
        ));
    }
    if matches!(ty, Type::Reference(_) | Type::Ptr(_)) {
        errors.push(Error::new(
            span,
            "reference and pointer types are not supported; use owned types instead",
        ));
    }
}
