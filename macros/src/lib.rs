extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Attribute, Ident, LitStr, Token, Visibility, parse_macro_input};

/// Declares a closed, typed error taxonomy together with its Kubernetes condition
/// `reason` string, so the mapping from variant to wire reason lives in one table
/// instead of being scattered across `match` arms at every call site.
///
/// ```ignore
/// define_condition_reasons! {
///     pub enum BindError {
///         RouteKind => "NotAllowedByListeners",
///         ListenerNamespacePolicy => "NotAllowedByListeners",
///         HostnameMismatch => "NoMatchingListenerHostname",
///         RouteInvalid => "RouteInvalid",
///     }
/// }
/// ```
#[proc_macro]
pub fn define_condition_reasons(input: TokenStream) -> TokenStream {
    let taxonomy = parse_macro_input!(input as Taxonomy);
    taxonomy.expand().into()
}

struct Variant {
    attrs: Vec<Attribute>,
    ident: Ident,
    reason: LitStr,
}

struct Taxonomy {
    vis: Visibility,
    ident: Ident,
    variants: Punctuated<Variant, Token![,]>,
}

impl Parse for Variant {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let ident: Ident = input.parse()?;
        input.parse::<Token![=>]>()?;
        let reason: LitStr = input.parse()?;
        Ok(Variant {
            attrs,
            ident,
            reason,
        })
    }
}

impl Parse for Taxonomy {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let vis: Visibility = input.parse()?;
        input.parse::<Token![enum]>()?;
        let ident: Ident = input.parse()?;
        let content;
        syn::braced!(content in input);
        let variants = content.parse_terminated(Variant::parse, Token![,])?;
        Ok(Taxonomy {
            vis,
            ident,
            variants,
        })
    }
}

impl Taxonomy {
    fn expand(&self) -> proc_macro2::TokenStream {
        let Taxonomy {
            vis,
            ident,
            variants,
        } = self;

        let variant_idents = variants.iter().map(|v| &v.ident).collect::<Vec<_>>();
        let variant_attrs = variants.iter().map(|v| &v.attrs).collect::<Vec<_>>();
        let reason_arms = variants.iter().map(|v| {
            let variant = &v.ident;
            let reason = &v.reason;
            quote! { #ident::#variant => #reason }
        });
        let reason_strs = variants.iter().map(|v| &v.reason).collect::<Vec<_>>();

        quote! {
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            #vis enum #ident {
                #(
                    #(#variant_attrs)*
                    #variant_idents
                ),*
            }

            impl #ident {
                /// The stable wire reason published on a Kubernetes condition for this variant.
                pub const fn reason(&self) -> &'static str {
                    match self {
                        #(#reason_arms),*
                    }
                }

                /// All reasons this taxonomy can produce, for exhaustive table-driven tests.
                pub const REASONS: &'static [&'static str] = &[#(#reason_strs),*];
            }

            impl std::fmt::Display for #ident {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.reason())
                }
            }
        }
    }
}
