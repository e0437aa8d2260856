//! `Error` derive.
//!
//! Every enum variant (or the struct itself) carries `#[error("...")]`.
//! Named fields are interpolated by name, tuple fields by position (`{0}`).

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_error(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let message = message(&variant.attrs, &variant.ident)?;
                    let ident = &variant.ident;
                    Ok(write_fields(quote!(Self::#ident), &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message(&input.attrs, name)?;
            let arm = write_fields(quote!(Self), &data.fields, &message);
            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "Error cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Produces one `match` arm writing `message` with the fields bound by name.
fn write_fields(path: TokenStream2, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            #path => f.write_str(#message),
        },
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.clone()).collect();
            let used: Vec<_> = idents
                .iter()
                .filter(|i| mentions(message, &i.to_string()))
                .collect();
            quote! {
                #[allow(unused_variables)]
                #path { #(#idents),* } => write!(f, #message, #(#used = #used),*),
            }
        }
        Fields::Unnamed(unnamed) => {
            let count = unnamed.unnamed.len();
            let idents: Vec<_> = (0..count).map(|i| format_ident!("field_{}", i)).collect();
            let mut rewritten = message.to_string();
            for i in (0..count).rev() {
                rewritten = rewritten
                    .replace(&format!("{{{i}}}"), &format!("{{field_{i}}}"))
                    .replace(&format!("{{{i}:"), &format!("{{field_{i}:"));
            }
            let used: Vec<_> = idents
                .iter()
                .filter(|i| mentions(&rewritten, &i.to_string()))
                .collect();
            quote! {
                #[allow(unused_variables)]
                #path ( #(#idents),* ) => write!(f, #rewritten, #(#used = #used),*),
            }
        }
    }
}

/// Returns true when `message` interpolates `name` as `{name}` or `{name:spec}`.
fn mentions(message: &str, name: &str) -> bool {
    message.contains(&format!("{{{name}}}")) || message.contains(&format!("{{{name}:"))
}

fn message<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<String> {
    let attr = attrs
        .iter()
        .find(|a| a.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(target, "missing #[error(\"...\")] display message")
        })?;
    let lit: LitStr = attr.parse_args()?;
    Ok(lit.value())
}
