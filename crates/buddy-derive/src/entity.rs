//! Entity derive macro implementation

use crate::attrs::{FieldAttr, parse_field_attrs, parse_struct_attrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let type_name = name.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let struct_attr = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let table = struct_attr.table.map(|table| quote! { .table(#table) });

    let mut descriptors = Vec::with_capacity(fields.len());
    let mut builds = Vec::with_capacity(fields.len());
    let mut accessors = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let field_name = ident.unraw().to_string();
        let attr = parse_field_attrs(&field.attrs)?;

        if attr.transient {
            descriptors.push(quote! {
                .field(::buddy::FieldDescriptor::new(#field_name, ::buddy::DataType::Any).transient())
            });
            builds.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let flags = field_flags(&attr);
        descriptors.push(quote! {
            .field(::buddy::FieldDescriptor::of::<#ty>(#field_name) #flags)
        });
        builds.push(quote! {
            #ident: ::buddy::FromValue::from_value(
                #field_name,
                values.next().unwrap_or(::buddy::Value::Null),
            )?
        });
        accessors.push(quote! {
            #field_name => ::core::option::Option::Some(::buddy::Value::from(
                ::core::clone::Clone::clone(&self.#ident),
            ))
        });
    }

    Ok(quote! {
        impl #impl_generics ::buddy::Entity for #name #ty_generics #where_clause {
            fn descriptor() -> ::buddy::EntityDescriptor {
                ::buddy::EntityDescriptor::new(#type_name)
                    #table
                    #(#descriptors)*
            }

            fn constructor() -> ::buddy::Constructor<Self> {
                ::buddy::Constructor::AllArgs(|values| {
                    #[allow(unused_mut, unused_variables)]
                    let mut values = values.into_iter();
                    ::core::result::Result::Ok(Self {
                        #(#builds),*
                    })
                })
            }

            fn field_value(&self, field: &str) -> ::core::option::Option<::buddy::Value> {
                match field {
                    #(#accessors,)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl #impl_generics ::buddy::FromRecord for #name #ty_generics #where_clause {
            fn from_record(record: ::buddy::Record) -> ::buddy::BuddyResult<Self> {
                record.to_entity::<Self>()
            }
        }
    })
}

fn field_flags(attr: &FieldAttr) -> TokenStream {
    let id = attr.id.then(|| quote! { .id() });
    let generated = attr.generated.then(|| quote! { .generated() });
    let column = attr.has_column_override().then(|| {
        let column_name = attr.column.clone().unwrap_or_default();
        let insertable = attr.insertable.unwrap_or(true);
        let updatable = attr.updatable.unwrap_or(true);
        quote! {
            .column(
                ::buddy::ColumnOverride::named(#column_name)
                    .insertable(#insertable)
                    .updatable(#updatable),
            )
        }
    });
    quote! { #id #generated #column }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(src: &str) -> Result<String> {
        let input: DeriveInput = syn::parse_str(src)?;
        expand(input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn generates_descriptor_with_overrides() {
        let out = expand_str(
            r#"
            #[buddy(table = "people")]
            struct Person {
                #[buddy(id, generated)]
                id: Option<i64>,
                #[buddy(column = "years", updatable = false)]
                age: i32,
                #[buddy(transient)]
                scratch: Vec<String>,
            }
            "#,
        )
        .unwrap();
        assert!(out.contains(". table (\"people\")"), "{out}");
        assert!(out.contains(". id () . generated ()"), "{out}");
        assert!(out.contains("ColumnOverride :: named (\"years\") . insertable (true) . updatable (false)"), "{out}");
        assert!(out.contains(". transient ()"), "{out}");
        assert!(out.contains("scratch : :: core :: default :: Default :: default ()"), "{out}");
        assert!(!out.contains("\"scratch\" =>"), "{out}");
    }

    #[test]
    fn rejects_tuple_structs_and_unknown_keys() {
        assert!(expand_str("struct Pair(i32, i32);").is_err());
        assert!(expand_str("enum E { A }").is_err());
        let err = expand_str("struct S { #[buddy(primary)] id: i64 }").unwrap_err();
        assert!(err.to_string().contains("unsupported buddy attribute"));
    }
}
