//! `BinaryCodec` derive.
//!
//! Fields are written in declaration order. Enum variants are prefixed with a
//! one-byte tag equal to the variant's position, so reordering variants of a
//! persisted type changes its encoding.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

pub fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_codec(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_codec(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => {
            let (pattern, encodes) = destructure(&data.fields);
            let build = construct(quote!(Self), &data.fields);
            (
                quote! {
                    let Self #pattern = self;
                    #(#encodes)*
                },
                quote! { Ok(#build) },
            )
        }
        Data::Enum(data) => {
            if data.variants.len() > u8::MAX as usize + 1 {
                return Err(syn::Error::new_spanned(
                    name,
                    "BinaryCodec supports at most 256 enum variants",
                ));
            }

            let mut encode_arms = Vec::with_capacity(data.variants.len());
            let mut decode_arms = Vec::with_capacity(data.variants.len());
            for (tag, variant) in data.variants.iter().enumerate() {
                let tag = tag as u8;
                let ident = &variant.ident;
                let (pattern, encodes) = destructure(&variant.fields);
                let build = construct(quote!(Self::#ident), &variant.fields);

                encode_arms.push(quote! {
                    Self::#ident #pattern => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #(#encodes)*
                    }
                });
                decode_arms.push(quote! { #tag => Ok(#build), });
            }

            (
                quote! {
                    match self {
                        #(#encode_arms)*
                    }
                },
                quote! {
                    let tag: u8 = crate::types::encoding::Decode::decode(input)?;
                    match tag {
                        #(#decode_arms)*
                        _ => Err(crate::types::encoding::DecodeError::InvalidValue),
                    }
                },
            )
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "BinaryCodec cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Builds a binding pattern for `fields` and the statements encoding each binding.
fn destructure(fields: &Fields) -> (TokenStream2, Vec<TokenStream2>) {
    let bindings: Vec<_> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone())
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| format_ident!("field_{}", i))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let encodes = bindings
        .iter()
        .map(|b| quote! { crate::types::encoding::Encode::encode(#b, out); })
        .collect();

    let pattern = match fields {
        Fields::Named(_) => quote! { { #(#bindings),* } },
        Fields::Unnamed(_) => quote! { ( #(#bindings),* ) },
        Fields::Unit => quote! {},
    };

    (pattern, encodes)
}

/// Builds the expression that decodes `fields` in order into `path`.
fn construct(path: TokenStream2, fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Named(named) => {
            let decodes = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote! { #ident: crate::types::encoding::Decode::decode(input)?, }
            });
            quote! { #path { #(#decodes)* } }
        }
        Fields::Unnamed(unnamed) => {
            let decodes = unnamed
                .unnamed
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
            quote! { #path ( #(#decodes)* ) }
        }
        Fields::Unit => path,
    }
}
