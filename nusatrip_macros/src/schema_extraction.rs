use proc_macro2::Span;
use syn::{
    parse::Parser, punctuated::Punctuated, spanned::Spanned, Attribute, Expr, ExprLit, Fields,
    ItemStruct, Lit, LitStr, MetaNameValue, Token,
};

/// Arguments accepted by `#[structured_output(...)]`.
#[derive(Default)]
pub struct StructuredOutputArgs {
    pub name: Option<LitStr>,
    pub description: Option<LitStr>,
}

pub fn parse_structured_output_args(
    attr: proc_macro::TokenStream,
) -> syn::Result<StructuredOutputArgs> {
    let mut args = StructuredOutputArgs::default();
    if attr.is_empty() {
        return Ok(args);
    }

    let pairs = Punctuated::<MetaNameValue, Token![,]>::parse_terminated.parse(attr)?;

    for pair in pairs {
        let key = pair
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new_spanned(&pair.path, "expected an identifier"))?;

        let Expr::Lit(ExprLit {
            lit: Lit::Str(value),
            ..
        }) = &pair.value
        else {
            return Err(syn::Error::new_spanned(
                &pair.value,
                "expected a string literal",
            ));
        };

        let slot = match key.to_string().as_str() {
            "name" => &mut args.name,
            "description" => &mut args.description,
            other => {
                return Err(syn::Error::new(
                    key.span(),
                    format!("unknown `structured_output` argument `{other}`"),
                ));
            }
        };

        if slot.is_some() {
            return Err(syn::Error::new(
                key.span(),
                format!("`{key}` given more than once"),
            ));
        }
        *slot = Some(value.clone());
    }

    Ok(args)
}

pub fn ensure_named_struct(item: &ItemStruct) -> syn::Result<()> {
    if matches!(item.fields, Fields::Named(_)) {
        Ok(())
    } else {
        Err(syn::Error::new(
            item.struct_token.span(),
            "`#[structured_output]` needs a struct with named fields",
        ))
    }
}

/// Joins `///` lines into one description string.
pub fn collect_doc_comments(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(MetaNameValue {
                value:
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(text),
                        ..
                    }),
                ..
            }) => Some(text.value().trim().to_string()),
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

pub fn resolve_schema_name(item: &ItemStruct, explicit: Option<&LitStr>) -> LitStr {
    explicit
        .cloned()
        .unwrap_or_else(|| LitStr::new(&item.ident.to_string(), Span::call_site()))
}

pub fn resolve_description(explicit: Option<&LitStr>, docs: Option<String>) -> Option<LitStr> {
    explicit
        .cloned()
        .or_else(|| docs.map(|text| LitStr::new(&text, Span::call_site())))
}
