//! Procedural macros for flact components
//!
//! Provides the `#[component]` attribute macro.

use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, ItemFn, LitStr, parse_macro_input};

/// Turn a render function into a named component type.
///
/// # Basic Usage
///
/// ```ignore
/// #[component]
/// fn Greeting(hooks: &mut Hooks<'_>, props: &Props) -> VNode {
///     h("p", Props::new(), props.text("name").unwrap_or("stranger"))
/// }
///
/// let view = h(Greeting, Props::new().with("name", "Ada"), ());
/// ```
///
/// The component name defaults to the function name; pass a string literal
/// to override it: `#[component("app.Greeting")]`.
///
/// # What the macro does
///
/// 1. Replaces the function with a unit struct of the same name
/// 2. Adds `Greeting::component()` returning a `::flact::Component`
/// 3. Implements `From<Greeting> for ::flact::VNodeKind`, so the struct can
///    be passed straight to `h`
///
/// The return type may be anything implementing `IntoRender`.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let name = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as LitStr))
    };

    match validate(&func) {
        Ok(()) => expand(&func, name).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(func: &ItemFn, name: Option<LitStr>) -> proc_macro2::TokenStream {
    let ident = &func.sig.ident;
    let vis = &func.vis;
    let attrs = &func.attrs;
    let inputs = &func.sig.inputs;
    let output = &func.sig.output;
    let body = &func.block;
    let name = name.map_or_else(|| ident.to_string(), |lit| lit.value());

    // Always use ::flact:: (works inside the crate thanks to
    // `extern crate self as flact` in lib.rs)
    quote! {
        #(#attrs)*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #vis struct #ident;

        impl #ident {
            /// Component descriptor for this render function.
            #vis fn component() -> ::flact::Component {
                fn render(#inputs) #output #body
                ::flact::Component::new(#name, render)
            }
        }

        impl ::core::convert::From<#ident> for ::flact::VNodeKind {
            fn from(_: #ident) -> Self {
                ::flact::VNodeKind::Component(#ident::component())
            }
        }
    }
}

fn validate(func: &ItemFn) -> syn::Result<()> {
    let sig = &func.sig;
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "components cannot be generic",
        ));
    }
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "components render synchronously; use `use_query` for async work",
        ));
    }
    if sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "expected `(hooks: &mut Hooks<'_>, props: &Props)`",
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new_spanned(
            receiver,
            "components are free functions, not methods",
        ));
    }
    Ok(())
}
