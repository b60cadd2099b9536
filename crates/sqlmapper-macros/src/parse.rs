//! Parsing for the `Entity` derive macro.
//!
//! Extracts `#[entity(...)]` attributes from the struct and its fields into
//! `EntityDef` and `FieldDef`, which code generation consumes.

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Generics, Ident, LitStr,
    PathArguments, Result, Type,
};

/// Parsed entity definition from a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name (e.g., `User`).
    pub name: Ident,
    /// The SQL table name (e.g., `"user"`).
    pub table_name: String,
    /// Mapper identifier; statement ids are namespaced by it.
    pub mapper: String,
    /// Data source key, if the struct overrides the default.
    pub data_source: Option<String>,
    pub fields: Vec<FieldDef>,
    pub generics: Generics,
}

impl EntityDef {
    /// Fields that map to a column.
    pub fn column_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.skip)
    }

    /// The primary key field: the one marked `primary_key`, else a field
    /// named `id`.
    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.column_fields()
            .find(|f| f.primary_key)
            .or_else(|| self.column_fields().find(|f| f.name == "id"))
    }
}

/// Parsed field definition.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name (e.g., `user_name`).
    pub name: Ident,
    /// The SQL column name, the field name unless overridden.
    pub column_name: String,
    pub ty: Type,
    /// `Option<T>` fields are nullable.
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Not persisted; filled with `Default::default()` when loading.
    pub skip: bool,
}

/// Parse a derive input into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();
    let attrs = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let struct_name = name.to_string();
    Ok(EntityDef {
        table_name: attrs
            .table
            .unwrap_or_else(|| to_snake_case(&struct_name)),
        mapper: attrs.mapper.unwrap_or_else(|| format!("{struct_name}Mapper")),
        data_source: attrs.data_source,
        name,
        fields,
        generics: input.generics.clone(),
    })
}

#[derive(Default)]
struct StructAttrs {
    table: Option<String>,
    mapper: Option<String>,
    data_source: Option<String>,
}

/// Parse `#[entity(...)]` on the struct.
///
/// Supported keys: `table = "..."`, `mapper = "..."`, `data_source = "..."`.
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut parsed = StructAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("table") {
                &mut parsed.table
            } else if meta.path.is_ident("mapper") {
                &mut parsed.mapper
            } else if meta.path.is_ident("data_source") {
                &mut parsed.data_source
            } else {
                return Err(meta.error(
                    "unknown entity struct attribute (supported: table, mapper, data_source)",
                ));
            };
            if slot.is_some() {
                return Err(meta.error("duplicate entity attribute"));
            }
            let value: LitStr = meta.value()?.parse()?;
            *slot = Some(value.value());
            Ok(())
        })?;
    }

    Ok(parsed)
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with fields, not a unit struct",
        )),
    }
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut column: Option<String> = None;
    let mut primary_key = false;
    let mut auto_increment = false;
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                if column.is_some() {
                    return Err(meta.error("duplicate entity attribute: column"));
                }
                let value: LitStr = meta.value()?.parse()?;
                column = Some(value.value());
            } else if meta.path.is_ident("primary_key") {
                primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                auto_increment = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error(
                    "unknown entity field attribute \
                     (supported: column, primary_key, auto_increment, skip)",
                ));
            }
            Ok(())
        })?;
    }

    if skip && (primary_key || auto_increment || column.is_some()) {
        return Err(Error::new_spanned(
            &name,
            "#[entity(skip)] cannot be combined with column, primary_key or auto_increment",
        ));
    }

    Ok(FieldDef {
        column_name: column.unwrap_or_else(|| name.unraw().to_string()),
        nullable: is_option_type(&field.ty),
        ty: field.ty.clone(),
        name,
        primary_key,
        auto_increment,
        skip,
    })
}

/// Convert PascalCase to snake_case.
///
/// `UserAccount` becomes `user_account`, `HTTPLog` becomes `http_log`.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                // word boundary, or the last capital of an acronym
                if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

/// Check if a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    option_inner_type(ty).is_some()
}

/// The `T` of an `Option<T>`.
pub fn option_inner_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}
