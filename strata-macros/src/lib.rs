use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Ident, Index, Path};

/// Derive macro that turns a plain operand struct into a render command.
///
/// The struct's fields are the command operands, marshalled in declaration
/// order. The `#[command(...)]` attribute names the command family, the
/// subtype within that family and the function replaying the command against
/// a `RenderContext`.
///
/// # Attributes
/// - `kind = Ident` - variant of `strata::command::CommandType`
/// - `subtype = expr` - subtype within the family, any expression castable to `u16`
/// - `apply = path` - `fn(&mut RenderContext, operand_0, .., operand_n)`, each
///   operand passed by value (cloned from the command)
///
/// # Example
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Command)]
/// #[command(kind = BaseNode, subtype = BaseNodeCommandKind::AddChild, apply = add_child)]
/// pub struct BaseNodeAddChild(pub NodeId, pub NodeId, pub i32);
/// ```
#[proc_macro_derive(Command, attributes(command))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_command(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct CommandAttr {
    kind: Ident,
    subtype: Expr,
    apply: Path,
}

fn parse_command_attr(input: &DeriveInput) -> syn::Result<CommandAttr> {
    let mut kind: Option<Ident> = None;
    let mut subtype: Option<Expr> = None;
    let mut apply: Option<Path> = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("command")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                kind = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("subtype") {
                subtype = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("apply") {
                apply = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `kind`, `subtype` or `apply`"))
            }
        })?;
    }

    let missing = |name: &str| {
        syn::Error::new_spanned(
            &input.ident,
            format!("#[derive(Command)] requires #[command({name} = ...)]"),
        )
    };

    Ok(CommandAttr {
        kind: kind.ok_or_else(|| missing("kind"))?,
        subtype: subtype.ok_or_else(|| missing("subtype"))?,
        apply: apply.ok_or_else(|| missing("apply"))?,
    })
}

fn expand_command(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let attr = parse_command_attr(input)?;
    let name = &input.ident;
    let name_str = name.to_string();
    let CommandAttr {
        kind,
        subtype,
        apply,
    } = attr;

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "#[derive(Command)] can only be used on structs",
            ))
        }
    };

    // Field accessors (`self.0` or `self.name`), the local bindings used while
    // decoding, and the constructor expression rebuilding the struct.
    let mut accessors = Vec::new();
    let mut bindings = Vec::new();
    let mut types = Vec::new();
    let construct = match fields {
        Fields::Named(named) => {
            let mut inits = Vec::new();
            for field in &named.named {
                let ident = field.ident.clone().ok_or_else(|| {
                    syn::Error::new_spanned(field, "named field without identifier")
                })?;
                accessors.push(quote!(#ident));
                bindings.push(ident.clone());
                types.push(field.ty.clone());
                inits.push(quote!(#ident));
            }
            quote!(#name { #(#inits),* })
        }
        Fields::Unnamed(unnamed) => {
            for (i, field) in unnamed.unnamed.iter().enumerate() {
                let index = Index::from(i);
                accessors.push(quote!(#index));
                bindings.push(format_ident!("operand_{}", i));
                types.push(field.ty.clone());
            }
            quote!(#name ( #(#bindings),* ))
        }
        Fields::Unit => quote!(#name),
    };

    let expanded = quote! {
        impl ::strata::command::CommandDescriptor for #name {
            const TYPE: ::strata::command::CommandType = ::strata::command::CommandType::#kind;
            const SUBTYPE: u16 = (#subtype) as u16;
            const NAME: &'static str = #name_str;

            fn unmarshal(
                parcel: &mut ::strata::transaction::Parcel,
            ) -> ::core::result::Result<
                ::std::boxed::Box<dyn ::strata::command::Command>,
                ::strata::transaction::MarshalError,
            > {
                #(
                    let #bindings = <#types as ::strata::transaction::Marshal>::unmarshal(parcel)?;
                )*
                ::core::result::Result::Ok(::std::boxed::Box::new(#construct))
            }
        }

        impl ::strata::command::Command for #name {
            fn command_type(&self) -> ::strata::command::CommandType {
                <Self as ::strata::command::CommandDescriptor>::TYPE
            }

            fn subtype(&self) -> u16 {
                <Self as ::strata::command::CommandDescriptor>::SUBTYPE
            }

            fn name(&self) -> &'static str {
                <Self as ::strata::command::CommandDescriptor>::NAME
            }

            fn marshal_operands(
                &self,
                parcel: &mut ::strata::transaction::Parcel,
            ) -> ::core::result::Result<(), ::strata::transaction::MarshalError> {
                #(
                    ::strata::transaction::Marshal::marshal(&self.#accessors, parcel)?;
                )*
                ::core::result::Result::Ok(())
            }

            fn process(&self, context: &mut ::strata::pipeline::RenderContext) {
                #apply(context #(, ::core::clone::Clone::clone(&self.#accessors))*);
            }

            fn clone_box(&self) -> ::std::boxed::Box<dyn ::strata::command::Command> {
                ::std::boxed::Box::new(::core::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    };

    Ok(expanded)
}
