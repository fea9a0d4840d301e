use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ItemFn, LitStr};

use cachet_macro_utils::{
    analyze_return_type, generate_stats_registration, mentions_self_type,
    parse_call_count_attributes, parse_dynamic_attributes, parse_static_attributes,
    spanned_error, ReturnShape,
};

/// Which file format a file-cache attribute writes
#[derive(Clone, Copy)]
enum FormatKind {
    Json,
    Binary,
}

impl ToTokens for FormatKind {
    fn to_tokens(&self, tokens: &mut TokenStream2) {
        tokens.extend(match self {
            FormatKind::Json => quote! { ::cachet::__core::CacheFormat::Json },
            FormatKind::Binary => quote! { ::cachet::__core::CacheFormat::Binary },
        });
    }
}

/// Reject signatures no cache attribute can handle
fn check_signature(input: &ItemFn) -> Result<(), TokenStream2> {
    if let Some(asyncness) = &input.sig.asyncness {
        return Err(spanned_error(
            asyncness.span(),
            "cachet attributes do not support async functions",
        ));
    }
    Ok(())
}

fn has_receiver(input: &ItemFn) -> bool {
    input
        .sig
        .inputs
        .iter()
        .any(|arg| matches!(arg, FnArg::Receiver(_)))
}

/// Body shared by every file-backed attribute: look up, run, store.
///
/// `resolve` must evaluate to `Option<FileCache<T>>`; `lookup` names the
/// `FileCache` read method.
fn generate_file_cache_body(
    input: &ItemFn,
    shape: &ReturnShape,
    stats_registration: TokenStream2,
    resolve: TokenStream2,
    lookup: TokenStream2,
) -> TokenStream2 {
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let ret_type = match &sig.output {
        syn::ReturnType::Type(_, ty) => quote! { #ty },
        syn::ReturnType::Default => quote! { () },
    };

    let (hit, store) = if shape.is_result() {
        (
            quote! { ::std::result::Result::Ok(__cached) },
            quote! { __cache.store_result(&__result); },
        )
    } else {
        (quote! { __cached }, quote! { __cache.store(&__result); })
    };

    quote! {
        #(#attrs)*
        #vis #sig {
            #stats_registration

            let __cache = #resolve;

            if let ::std::option::Option::Some(__cache) = &__cache {
                if let ::std::option::Option::Some(__cached) = __cache.#lookup() {
                    return #hit;
                }
            }

            #[allow(clippy::redundant_closure_call)]
            let __result: #ret_type = (|| -> #ret_type #block)();

            if let ::std::option::Option::Some(__cache) = &__cache {
                #store
            }
            __result
        }
    }
}

fn expand_dynamic(attr: TokenStream, item: TokenStream, format: FormatKind) -> TokenStream {
    let attrs = match parse_dynamic_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&input) {
        return err.into();
    }
    if !has_receiver(&input) {
        return spanned_error(
            input.sig.ident.span(),
            "dynamic cache attributes render their directory from `self` and must be applied to a method",
        )
        .into();
    }

    let fn_name = input.sig.ident.to_string();
    let name = attrs.custom_name.unwrap_or_else(|| fn_name.clone());
    let shape = analyze_return_type(&input.sig.output);
    let cached_type = shape.cached_type();
    let template = &attrs.template;

    let file_name = match &attrs.file_name {
        Some(custom) => quote! { ::std::string::String::from(#custom) },
        None => quote! { #format.file_name_for(#fn_name) },
    };

    let stats_ident = syn::Ident::new("__CACHET_STATS", proc_macro2::Span::call_site());
    let stats_registration = generate_stats_registration(&stats_ident, &name);
    let resolve = quote! {
        ::cachet::__core::FileCache::<#cached_type>::resolve(
            #template,
            &self,
            &#file_name,
            #format,
            &#stats_ident,
        )
    };

    generate_file_cache_body(&input, &shape, stats_registration, resolve, quote! { lookup }).into()
}

fn expand_static(attr: TokenStream, item: TokenStream, format: FormatKind) -> TokenStream {
    let attrs = match parse_static_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&input) {
        return err.into();
    }

    let name = attrs
        .custom_name
        .unwrap_or_else(|| input.sig.ident.to_string());
    let shape = analyze_return_type(&input.sig.output);
    let cached_type = shape.cached_type();
    let path: &LitStr = &attrs.path;

    let stats_ident = syn::Ident::new("__CACHET_STATS", proc_macro2::Span::call_site());
    let stats_registration = generate_stats_registration(&stats_ident, &name);
    let resolve = quote! {
        ::std::option::Option::Some(
            ::cachet::__core::FileCache::<#cached_type>::new(#path, #format)
                .with_stats(&#stats_ident)
        )
    };

    // A stored null is recomputed at a fixed path
    generate_file_cache_body(
        &input,
        &shape,
        stats_registration,
        resolve,
        quote! { lookup_present },
    )
    .into()
}

/// Caches a method's result in a JSON file whose directory is rendered from
/// the instance's fields.
///
/// The attribute takes a directory template with `{field}` placeholders.
/// On each call the template is rendered from `self` (which must implement
/// `serde::Serialize`), the directory is created, and the cache file
/// `<method_name>.json` inside it is read. If it exists its value is
/// returned without running the method; otherwise the method runs and its
/// result is written to the file.
///
/// # Macro Parameters
///
/// - template (required, positional or `template = "..."`): cache directory,
///   e.g. `"cache/{exchange_name}/"`. Checked at compile time.
/// - `file_name` (optional): file name inside the directory instead of
///   `<method_name>.json`.
/// - `name` (optional): identifier in the statistics registry. Default: the
///   method name.
///
/// # Cache Behavior
///
/// - **Key**: the rendered directory and file name only. Method arguments
///   are not part of the key.
/// - **Result-returning methods**: only `Ok` values are written; a cached
///   value is returned as `Ok(value)`.
/// - **Failures**: an unrenderable template, unreadable file or failed write
///   is logged at `warn` and the method simply runs uncached.
///
/// # Requirements
///
/// - `Self: serde::Serialize`
/// - The cached type implements `Serialize + DeserializeOwned`
///
/// # Examples
///
/// ```ignore
/// use cachet::dynamic_cache_to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Connector {
///     exchange_name: String,
/// }
///
/// impl Connector {
///     #[dynamic_cache_to_json("cache/{exchange_name}/")]
///     fn get_exchange_info(&self) -> ExchangeInfo {
///         // Written to cache/binance/get_exchange_info.json on first call
///         fetch_exchange_info(&self.exchange_name)
///     }
///
///     #[dynamic_cache_to_json("cache/{exchange_name}/", file_name = "markets.json")]
///     fn load_markets(&self) -> Result<Vec<Market>, ApiError> {
///         // Err results are never written
///         fetch_markets(&self.exchange_name)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn dynamic_cache_to_json(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand_dynamic(attr, item, FormatKind::Json)
}

/// Binary (`bincode`) counterpart of [`macro@dynamic_cache_to_json`].
///
/// Same parameters and behavior; the default file name is
/// `<method_name>.bin`.
///
/// ```ignore
/// impl Connector {
///     #[dynamic_cache_to_binary("cache/{exchange_name}/{market_type}/")]
///     fn get_candles(&self) -> Vec<Candle> {
///         download_candles(&self.exchange_name, &self.market_type)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn dynamic_cache_to_binary(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand_dynamic(attr, item, FormatKind::Binary)
}

/// Caches a function's result in a JSON file at a fixed path.
///
/// # Macro Parameters
///
/// - path (required, positional or `path = "..."`): the cache file.
/// - `name` (optional): identifier in the statistics registry.
///
/// Works on free functions and methods alike. Parent directories are
/// created on the first write. Arguments are not part of the key.
///
/// ```ignore
/// use cachet::cache_to_json;
///
/// #[cache_to_json(path = "cache/symbols.json")]
/// fn list_symbols() -> Vec<String> {
///     download_symbols()
/// }
/// ```
#[proc_macro_attribute]
pub fn cache_to_json(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand_static(attr, item, FormatKind::Json)
}

/// Binary (`bincode`) counterpart of [`macro@cache_to_json`].
#[proc_macro_attribute]
pub fn cache_to_binary(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand_static(attr, item, FormatKind::Binary)
}

/// Keeps a function's result in memory and recomputes it every `n` calls.
///
/// The first call runs the function; the next `n - 1` calls return that
/// value; call `n + 1` runs it again. One cache exists per function, shared
/// by every thread and, for methods, by every instance.
///
/// # Macro Parameters
///
/// - n (required, positional or `n = ...`): refresh period, at least 1.
/// - `name` (optional): identifier in the statistics registry.
///
/// # Requirements
///
/// - The cached type implements `Clone + Send + 'static`
/// - The return type may not mention `Self` and the function may not be
///   generic, since the cache is a `static`
///
/// # Examples
///
/// ```ignore
/// use cachet::cache_for_n_calls;
///
/// #[cache_for_n_calls(3)]
/// fn get_portfolio_balance() -> Balance {
///     // Runs on calls 1, 4, 7, ...
///     compute_balance()
/// }
///
/// #[cache_for_n_calls(n = 10, name = "server_time")]
/// fn server_time() -> Result<u64, ApiError> {
///     // Err results are returned but not kept; the next call retries
///     fetch_server_time()
/// }
/// ```
#[proc_macro_attribute]
pub fn cache_for_n_calls(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match parse_call_count_attributes(attr.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.into(),
    };
    let input = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&input) {
        return err.into();
    }
    if input.sig.generics.type_params().next().is_some() {
        return spanned_error(
            input.sig.generics.span(),
            "cache_for_n_calls cannot be applied to generic functions",
        )
        .into();
    }

    let shape = analyze_return_type(&input.sig.output);
    let cached_type = shape.cached_type();
    if mentions_self_type(quote! { #cached_type }) {
        return spanned_error(
            input.sig.output.span(),
            "cache_for_n_calls cannot cache a type that mentions `Self`; name the type explicitly",
        )
        .into();
    }

    let fn_attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let ret_type = match &sig.output {
        syn::ReturnType::Type(_, ty) => quote! { #ty },
        syn::ReturnType::Default => quote! { () },
    };

    let name = attrs
        .custom_name
        .unwrap_or_else(|| input.sig.ident.to_string());
    let every = attrs.every;

    let stats_ident = syn::Ident::new("__CACHET_STATS", proc_macro2::Span::call_site());
    let stats_registration = generate_stats_registration(&stats_ident, &name);

    let call = if shape.is_result() {
        quote! { __CACHET_CALLS.get_or_refresh_result(|| -> #ret_type #block) }
    } else {
        quote! { __CACHET_CALLS.get_or_refresh(|| -> #ret_type #block) }
    };

    let expanded = quote! {
        #(#fn_attrs)*
        #vis #sig {
            #stats_registration

            static __CACHET_CALLS: ::cachet::__core::__private::Lazy<
                ::cachet::__core::CallCountCache<#cached_type>,
            > = ::cachet::__core::__private::Lazy::new(|| {
                let __every = ::std::num::NonZeroUsize::new(#every)
                    .unwrap_or(::std::num::NonZeroUsize::MIN);
                ::cachet::__core::CallCountCache::new(__every).with_stats(&#stats_ident)
            });

            #call
        }
    };

    TokenStream::from(expanded)
}
