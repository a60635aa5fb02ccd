use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, Pat, ReturnType};

/// Proc macro to denote a Transaction
///
/// Each call of the function is recorded as one request: its latency is sampled and an `Err`
/// return counts as a failed request. Only works on `async` functions returning `Result<T, E>`.
///
/// # Example
/// ```ignore
/// use stampede::prelude::*;
///
/// #[transaction]
/// async fn my_transaction(arg_1: u32, arg_2: &str) -> Result<String, MyError> {
///     ...
/// }
/// ```
#[proc_macro_attribute]
pub fn transaction(attr: TokenStream, item: TokenStream) -> TokenStream {
    transaction_internal(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn transaction_internal(_attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let input = syn::parse2::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[transaction] only works on async functions",
        ));
    }
    if let ReturnType::Default = sig.output {
        return Err(syn::Error::new_spanned(
            sig,
            "#[transaction] functions must return a Result",
        ));
    }

    let stmts = &block.stmts;

    Ok(quote! {
        #(#attrs)* #vis #sig {
            ::stampede::transaction::transaction_hook(async move {
                #(#stmts)*
            }).await
        }
    })
}

/// Proc macro to denote a Scenario
///
/// Turns an `async fn` with no return value into a constructor for a
/// [`Scenario`](../stampede/scenario/struct.Scenario.html), which can be configured with the
/// `ConfigurableScenario` methods and then awaited to run. Arguments must be plain
/// `name: Type` bindings of `Clone` types; each iteration receives its own clone.
///
/// # Example
/// ```ignore
/// use stampede::prelude::*;
///
/// #[scenario]
/// async fn my_scenario(base_url: Arc<String>) {
/// }
/// ```
#[proc_macro_attribute]
pub fn scenario(attr: TokenStream, item: TokenStream) -> TokenStream {
    scenario_internal(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn scenario_internal(_attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let input = syn::parse2::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[scenario] only works on async functions",
        ));
    }
    if let ReturnType::Type(_, ty) = &sig.output {
        return Err(syn::Error::new_spanned(
            ty,
            "#[scenario] functions cannot return a value",
        ));
    }

    let mut args = vec![];
    for input in &sig.inputs {
        match input {
            FnArg::Typed(arg) => match &*arg.pat {
                Pat::Ident(pat) if pat.by_ref.is_none() && pat.subpat.is_none() => {
                    args.push(pat.ident.clone())
                }
                pat => {
                    return Err(syn::Error::new_spanned(
                        pat,
                        "#[scenario] arguments must be simple `name: Type` bindings",
                    ))
                }
            },
            FnArg::Receiver(recv) => {
                return Err(syn::Error::new_spanned(
                    recv,
                    "#[scenario] cannot be used on methods",
                ))
            }
        }
    }

    let stmts = &block.stmts;

    let scen_name = sig.ident.clone();
    let new_name = Ident::new(&format!("__stampede_{}", scen_name), Span::call_site());
    let mut new_sig = sig.clone();
    new_sig.ident = new_name.clone();

    let mut scen_sig = sig.clone();
    scen_sig.asyncness = None;
    scen_sig.output = syn::parse2(quote! {
        -> impl ::stampede::scenario::ConfigurableScenario<::stampede::RunStatistics>
    })?;

    Ok(quote! {
        #(#attrs)* #vis #scen_sig {
            ::stampede::scenario::Scenario::new(
                stringify!(#scen_name),
                move || #new_name(#(::std::clone::Clone::clone(&#args)),*),
            )
        }

        #[doc(hidden)]
        #vis #new_sig {
            #(#stmts)*
        }
    })
}
