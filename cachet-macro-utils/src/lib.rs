//! Shared utilities for cachet procedural macros
//!
//! Attribute parsing, return type analysis and the pieces of generated code
//! that every cachet attribute needs.

use proc_macro2::{Span, TokenStream as TokenStream2, TokenTree};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Expr, GenericArgument, Lit, LitInt, LitStr, MetaNameValue, PathArguments, Token, Type};

/// One attribute argument: either a bare literal or `key = literal`.
pub enum AttrArg {
    Positional(Lit),
    Named(MetaNameValue),
}

impl Parse for AttrArg {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(Lit) {
            Ok(AttrArg::Positional(input.parse()?))
        } else {
            Ok(AttrArg::Named(input.parse()?))
        }
    }
}

fn compile_error(msg: &str) -> TokenStream2 {
    quote! { compile_error!(#msg) }
}

fn parse_args(attr: TokenStream2) -> Result<Vec<AttrArg>, TokenStream2> {
    use syn::parse::Parser;

    let parser = Punctuated::<AttrArg, Token![,]>::parse_terminated;
    parser
        .parse2(attr)
        .map(|args| args.into_iter().collect())
        .map_err(|e| compile_error(&format!("Failed to parse attributes: {}", e)))
}

fn key_of(nv: &MetaNameValue) -> String {
    nv.path
        .get_ident()
        .map(|i| i.to_string())
        .unwrap_or_else(|| quote!(#nv).to_string())
}

/// Parse a string literal value, e.g. `name = "daily_candles"`
pub fn parse_str_value(nv: &MetaNameValue) -> Result<LitStr, TokenStream2> {
    match &nv.value {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(s) => Ok(s.clone()),
            _ => Err(compile_error(&format!(
                "Invalid literal for `{}`: expected string",
                key_of(nv)
            ))),
        },
        _ => Err(compile_error(&format!(
            "Invalid syntax for `{}`: expected `{} = \"...\"`",
            key_of(nv),
            key_of(nv)
        ))),
    }
}

/// Parse the refresh period of `cache_for_n_calls`; zero is rejected.
pub fn parse_calls_literal(lit: &LitInt) -> Result<usize, TokenStream2> {
    match lit.base10_parse::<usize>() {
        Ok(0) => Err(compile_error(
            "cache_for_n_calls requires n >= 1: a value of 0 would never refresh",
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(compile_error("n must be a positive integer")),
    }
}

/// Check a directory template at compile time.
pub fn validate_template(template: &LitStr) -> Result<(), TokenStream2> {
    cachet_core::PathTemplate::parse(&template.value())
        .map(|_| ())
        .map_err(|err| compile_error(&err.to_string()))
}

/// Parsed attributes of `dynamic_cache_to_json` / `dynamic_cache_to_binary`
pub struct DynamicCacheAttributes {
    pub template: LitStr,
    pub file_name: Option<LitStr>,
    pub custom_name: Option<String>,
}

/// Parse `("dir/{field}/", file_name = "...", name = "...")`
///
/// The template may also be given as `template = "..."`.
pub fn parse_dynamic_attributes(attr: TokenStream2) -> Result<DynamicCacheAttributes, TokenStream2> {
    let mut template = None;
    let mut file_name = None;
    let mut custom_name = None;

    for arg in parse_args(attr)? {
        match arg {
            AttrArg::Positional(Lit::Str(s)) if template.is_none() => template = Some(s),
            AttrArg::Positional(_) => {
                return Err(compile_error(
                    "Unexpected argument: expected a single template string such as \"cache/{exchange_name}/\"",
                ))
            }
            AttrArg::Named(nv) if nv.path.is_ident("template") => {
                template = Some(parse_str_value(&nv)?)
            }
            AttrArg::Named(nv) if nv.path.is_ident("file_name") => {
                file_name = Some(parse_str_value(&nv)?)
            }
            AttrArg::Named(nv) if nv.path.is_ident("name") => {
                custom_name = Some(parse_str_value(&nv)?.value())
            }
            AttrArg::Named(nv) => {
                return Err(compile_error(&format!(
                    "Unknown attribute `{}`: expected `template`, `file_name` or `name`",
                    key_of(&nv)
                )))
            }
        }
    }

    let template = template.ok_or_else(|| {
        compile_error("Missing cache directory template, e.g. #[dynamic_cache_to_json(\"cache/{exchange_name}/\")]")
    })?;
    validate_template(&template)?;

    if let Some(f) = &file_name {
        if f.value().is_empty() {
            return Err(compile_error("`file_name` cannot be empty"));
        }
    }

    Ok(DynamicCacheAttributes {
        template,
        file_name,
        custom_name,
    })
}

/// Parsed attributes of `cache_to_json` / `cache_to_binary`
pub struct StaticCacheAttributes {
    pub path: LitStr,
    pub custom_name: Option<String>,
}

/// Parse `("data/markets.json")` or `(path = "data/markets.json", name = "...")`
pub fn parse_static_attributes(attr: TokenStream2) -> Result<StaticCacheAttributes, TokenStream2> {
    let mut path = None;
    let mut custom_name = None;

    for arg in parse_args(attr)? {
        match arg {
            AttrArg::Positional(Lit::Str(s)) if path.is_none() => path = Some(s),
            AttrArg::Positional(_) => {
                return Err(compile_error(
                    "Unexpected argument: expected a single cache file path",
                ))
            }
            AttrArg::Named(nv) if nv.path.is_ident("path") => path = Some(parse_str_value(&nv)?),
            AttrArg::Named(nv) if nv.path.is_ident("name") => {
                custom_name = Some(parse_str_value(&nv)?.value())
            }
            AttrArg::Named(nv) => {
                return Err(compile_error(&format!(
                    "Unknown attribute `{}`: expected `path` or `name`",
                    key_of(&nv)
                )))
            }
        }
    }

    let path = path.ok_or_else(|| {
        compile_error("Missing cache file path, e.g. #[cache_to_json(path = \"cache/markets.json\")]")
    })?;
    if path.value().is_empty() {
        return Err(compile_error("Cache file path cannot be empty"));
    }

    Ok(StaticCacheAttributes { path, custom_name })
}

/// Parsed attributes of `cache_for_n_calls`
pub struct CallCountAttributes {
    pub every: usize,
    pub custom_name: Option<String>,
}

/// Parse `(3)` or `(n = 3, name = "...")`
pub fn parse_call_count_attributes(attr: TokenStream2) -> Result<CallCountAttributes, TokenStream2> {
    let mut every = None;
    let mut custom_name = None;

    for arg in parse_args(attr)? {
        match arg {
            AttrArg::Positional(Lit::Int(lit)) if every.is_none() => {
                every = Some(parse_calls_literal(&lit)?)
            }
            AttrArg::Positional(_) => {
                return Err(compile_error(
                    "Unexpected argument: expected the number of calls, e.g. #[cache_for_n_calls(3)]",
                ))
            }
            AttrArg::Named(nv) if nv.path.is_ident("n") => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: Lit::Int(lit), ..
                }) => every = Some(parse_calls_literal(lit)?),
                _ => return Err(compile_error("Invalid literal for `n`: expected integer")),
            },
            AttrArg::Named(nv) if nv.path.is_ident("name") => {
                custom_name = Some(parse_str_value(&nv)?.value())
            }
            AttrArg::Named(nv) => {
                return Err(compile_error(&format!(
                    "Unknown attribute `{}`: expected `n` or `name`",
                    key_of(&nv)
                )))
            }
        }
    }

    let every = every
        .ok_or_else(|| compile_error("Missing number of calls, e.g. #[cache_for_n_calls(3)]"))?;

    Ok(CallCountAttributes { every, custom_name })
}

/// What a cached function returns
pub enum ReturnShape {
    /// Any value; all of it is cached
    Plain(Type),
    /// `Result<T, E>` (or an alias like `io::Result<T>`); only `T` is cached
    Result(Type),
}

impl ReturnShape {
    /// The type stored in the cache
    pub fn cached_type(&self) -> &Type {
        match self {
            ReturnShape::Plain(ty) | ReturnShape::Result(ty) => ty,
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self, ReturnShape::Result(_))
    }
}

/// Classify a function's return type
pub fn analyze_return_type(output: &syn::ReturnType) -> ReturnShape {
    let ty = match output {
        syn::ReturnType::Default => return ReturnShape::Plain(syn::parse_quote! { () }),
        syn::ReturnType::Type(_, ty) => ty.as_ref(),
    };

    if let Type::Path(type_path) = ty {
        if let Some(last) = type_path.path.segments.last() {
            if last.ident == "Result" {
                if let PathArguments::AngleBracketed(args) = &last.arguments {
                    if let Some(GenericArgument::Type(ok)) = args.args.first() {
                        return ReturnShape::Result(ok.clone());
                    }
                }
            }
        }
    }

    ReturnShape::Plain(ty.clone())
}

/// Returns true if `Self` appears anywhere in the tokens
pub fn mentions_self_type(tokens: TokenStream2) -> bool {
    tokens.into_iter().any(|tt| match tt {
        TokenTree::Ident(ident) => ident == "Self",
        TokenTree::Group(group) => mentions_self_type(group.stream()),
        _ => false,
    })
}

/// Generate the per-function statistics static and its one-time registration
pub fn generate_stats_registration(stats_ident: &syn::Ident, name: &str) -> TokenStream2 {
    quote! {
        static #stats_ident: ::cachet::__core::CacheStats = ::cachet::__core::CacheStats::new();
        {
            static __CACHET_REGISTER: ::std::sync::Once = ::std::sync::Once::new();
            __CACHET_REGISTER.call_once(|| {
                ::cachet::__core::stats_registry::register(#name, &#stats_ident);
            });
        }
    }
}

/// `compile_error!` pointing at `span`
pub fn spanned_error(span: Span, msg: &str) -> TokenStream2 {
    syn::Error::new(span, msg).to_compile_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_dynamic_positional_template() {
        let attrs = parse_dynamic_attributes(quote! { "cache/{exchange_name}/" }).ok().unwrap();
        assert_eq!(attrs.template.value(), "cache/{exchange_name}/");
        assert!(attrs.file_name.is_none());
        assert!(attrs.custom_name.is_none());
    }

    #[test]
    fn test_dynamic_with_file_name_and_name() {
        let attrs = parse_dynamic_attributes(quote! {
            "cache/{exchange_name}/", file_name = "custom_data.json", name = "custom"
        })
        .ok()
        .unwrap();
        assert_eq!(attrs.file_name.unwrap().value(), "custom_data.json");
        assert_eq!(attrs.custom_name.as_deref(), Some("custom"));
    }

    #[test]
    fn test_dynamic_rejects_bad_template() {
        assert!(parse_dynamic_attributes(quote! { "cache/{exchange_name/" }).is_err());
        assert!(parse_dynamic_attributes(quote! {}).is_err());
        assert!(parse_dynamic_attributes(quote! { "a/", ttl = 3 }).is_err());
    }

    #[test]
    fn test_static_path_forms() {
        let a = parse_static_attributes(quote! { "data/x.json" }).ok().unwrap();
        let b = parse_static_attributes(quote! { path = "data/x.json" }).ok().unwrap();
        assert_eq!(a.path.value(), b.path.value());
        assert!(parse_static_attributes(quote! { path = "" }).is_err());
    }

    #[test]
    fn test_call_count_forms() {
        assert_eq!(parse_call_count_attributes(quote! { 3 }).ok().unwrap().every, 3);
        let named = parse_call_count_attributes(quote! { n = 5, name = "balance" })
            .ok()
            .unwrap();
        assert_eq!(named.every, 5);
        assert_eq!(named.custom_name.as_deref(), Some("balance"));
    }

    #[test]
    fn test_call_count_rejects_zero() {
        assert!(parse_call_count_attributes(quote! { 0 }).is_err());
        assert!(parse_call_count_attributes(quote! { n = "3" }).is_err());
        assert!(parse_call_count_attributes(quote! {}).is_err());
    }

    #[test]
    fn test_analyze_result_types() {
        let plain: syn::ReturnType = parse_quote! { -> Vec<u8> };
        assert!(!analyze_return_type(&plain).is_result());

        let result: syn::ReturnType = parse_quote! { -> Result<Ticker, ApiError> };
        let shape = analyze_return_type(&result);
        assert!(shape.is_result());
        let cached = shape.cached_type();
        assert_eq!(quote!(#cached).to_string(), "Ticker");

        let aliased: syn::ReturnType = parse_quote! { -> std::io::Result<String> };
        assert!(analyze_return_type(&aliased).is_result());

        let unit: syn::ReturnType = parse_quote! {};
        let cached = analyze_return_type(&unit);
        let cached = cached.cached_type();
        assert_eq!(quote!(#cached).to_string(), "()");
    }

    #[test]
    fn test_mentions_self_type() {
        assert!(mentions_self_type(quote! { Option<Self> }));
        assert!(!mentions_self_type(quote! { Vec<String> }));
    }
}
