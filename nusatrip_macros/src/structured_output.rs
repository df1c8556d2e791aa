use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemStruct};

use crate::schema_extraction::{
    collect_doc_comments, ensure_named_struct, parse_structured_output_args, resolve_description,
    resolve_schema_name,
};

pub fn structured_output(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = match parse_structured_output_args(attr) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    let item_struct = parse_macro_input!(item as ItemStruct);

    if let Err(err) = ensure_named_struct(&item_struct) {
        return err.to_compile_error().into();
    }

    if !item_struct.generics.params.is_empty() {
        return syn::Error::new(
            item_struct.generics.span(),
            "`#[structured_output]` cannot be applied to generic structs",
        )
        .to_compile_error()
        .into();
    }

    let schema_name = resolve_schema_name(&item_struct, args.name.as_ref());
    let description = resolve_description(
        args.description.as_ref(),
        collect_doc_comments(&item_struct.attrs),
    );
    let description_tokens = match description {
        Some(lit) => quote! { Some(#lit) },
        None => quote! { None },
    };

    let ident = &item_struct.ident;

    let expanded = quote! {
        #item_struct

        impl nusatrip_ai::schema::StructuredOutput for #ident {
            fn schema() -> &'static nusatrip_ai::schema::SchemaHandle {
                static HANDLE: std::sync::OnceLock<nusatrip_ai::schema::SchemaHandle> =
                    std::sync::OnceLock::new();
                HANDLE.get_or_init(|| {
                    nusatrip_ai::schema::SchemaHandle::new(
                        #schema_name,
                        #description_tokens,
                        schemars::schema_for!(Self),
                    )
                })
            }
        }
    };

    expanded.into()
}
