extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Fails compilation when a zero-copy account carries implicit padding, i.e. when
/// `size_of::<T>()` differs from the sum of its field sizes. Account layouts are
/// read straight out of account data, so every byte must be an explicit field.
#[proc_macro_attribute]
pub fn assert_no_slop(_: TokenStream, input: TokenStream) -> TokenStream {
    let derive_input = parse_macro_input!(input as DeriveInput);
    let struct_name = &derive_input.ident;

    let field_types: Vec<_> = match &derive_input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => fields.named.iter().map(|field| &field.ty).collect(),
            Fields::Unnamed(fields) => fields.unnamed.iter().map(|field| &field.ty).collect(),
            Fields::Unit => {
                return syn::Error::new(
                    derive_input.span(),
                    "assert_no_slop cannot be used on unit structs",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                derive_input.span(),
                "assert_no_slop can only be used on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let output = quote! {
        #derive_input

        const _: () = {
            const STRUCT_SIZE: usize = std::mem::size_of::<#struct_name>();
            const FIELD_SIZES: usize = 0 #(+ std::mem::size_of::<#field_types>())*;
            assert!(
                STRUCT_SIZE == FIELD_SIZES,
                concat!(stringify!(#struct_name), " has hidden padding")
            );
        };
    };
    output.into()
}
