//! `#[buddy(...)]` attribute parsing.

use syn::{Attribute, LitBool, LitStr, Result};

#[derive(Default)]
pub(crate) struct StructAttr {
    pub table: Option<String>,
}

/// Field-level flags. `column`, `insertable` and `updatable` together form a
/// column override; any one of them being present creates it.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub id: bool,
    pub generated: bool,
    pub transient: bool,
    pub column: Option<String>,
    pub insertable: Option<bool>,
    pub updatable: Option<bool>,
}

impl FieldAttr {
    pub fn has_column_override(&self) -> bool {
        self.column.is_some() || self.insertable.is_some() || self.updatable.is_some()
    }
}

pub(crate) fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttr> {
    let mut out = StructAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("buddy")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                out.table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported buddy attribute, expected `table`"))
            }
        })?;
    }
    Ok(out)
}

pub(crate) fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("buddy")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                out.id = true;
            } else if meta.path.is_ident("generated") {
                out.generated = true;
            } else if meta.path.is_ident("transient") {
                out.transient = true;
            } else if meta.path.is_ident("column") {
                let value: LitStr = meta.value()?.parse()?;
                out.column = Some(value.value());
            } else if meta.path.is_ident("insertable") {
                let value: LitBool = meta.value()?.parse()?;
                out.insertable = Some(value.value);
            } else if meta.path.is_ident("updatable") {
                let value: LitBool = meta.value()?.parse()?;
                out.updatable = Some(value.value);
            } else {
                return Err(meta.error(
                    "unsupported buddy attribute, expected one of `id`, `generated`, \
                     `transient`, `column`, `insertable`, `updatable`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(out)
}
