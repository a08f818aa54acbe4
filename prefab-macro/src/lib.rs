use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr, parse_macro_input};

/// Derive `Reflect` + `Component` for a struct with tagged members.
///
/// Fields marked `#[value]` or `#[reference]` become members; every other
/// field is invisible to the prefab engine.
///
/// ```ignore
/// #[derive(Default, Component)]
/// struct Door {
///     #[value]
///     locked: bool,
///     #[value(rename = "OpenSpeed")]
///     open_speed: f32,
///     #[reference]
///     key: Option<ComponentId>,
/// }
/// ```
///
/// Options: `rename = "Name"` changes the file-level name, `read_only`
/// marks the member as not writable.
#[proc_macro_derive(Component, attributes(value, reference))]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let reflect = match reflect_impl(&input) {
        Ok(tokens) => tokens,
        Err(err) => return err.to_compile_error().into(),
    };
    let name = &input.ident;

    let expanded = quote! {
        #reflect

        impl ::redlilium_prefab::Component for #name {
            fn as_reflect(&self) -> &dyn ::redlilium_prefab::Reflect {
                self
            }

            fn as_reflect_mut(&mut self) -> &mut dyn ::redlilium_prefab::Reflect {
                self
            }
        }
    };

    expanded.into()
}

/// Derive `Reflect` for a nested value object.
///
/// Same member attributes as `#[derive(Component)]`. Register the type with
/// `ConversionRegistry::register_value_object` so members of this type are
/// walked recursively.
#[proc_macro_derive(Reflect, attributes(value, reference))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match reflect_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive `EnumMember` for a unit-only enum, persisted by variant name.
#[proc_macro_derive(EnumMember)]
pub fn derive_enum_member(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let data = match &input.data {
        Data::Enum(data) => data,
        _ => {
            return syn::Error::new_spanned(name, "EnumMember can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    let mut idents = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                &variant.ident,
                "EnumMember variants must not carry data",
            )
            .to_compile_error()
            .into();
        }
        idents.push(&variant.ident);
    }
    let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();

    let expanded = quote! {
        impl ::redlilium_prefab::EnumMember for #name {
            fn variant_names() -> &'static [&'static str] {
                &[#(#names),*]
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#idents => #names,)*
                }
            }

            fn from_variant_name(name: &str) -> ::core::option::Option<Self> {
                match name {
                    #(#names => ::core::option::Option::Some(Self::#idents),)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    expanded.into()
}

/// A field carrying `#[value]` or `#[reference]`.
struct TaggedField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    member_name: String,
    reference: bool,
    read_only: bool,
}

fn reflect_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "reflected types cannot be generic",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "reflected types must use named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Reflect can only be derived for structs",
            ));
        }
    };

    let mut tagged = Vec::new();
    for field in fields {
        if let Some(t) = parse_tag(field)? {
            tagged.push(t);
        }
    }

    let infos = tagged.iter().map(|t| {
        let member_name = &t.member_name;
        let ty = t.ty;
        let writable = !t.read_only;
        let tag = if t.reference {
            quote! { ::redlilium_prefab::MemberTag::Reference }
        } else {
            quote! { ::redlilium_prefab::MemberTag::Value }
        };
        quote! {
            ::redlilium_prefab::MemberInfo {
                name: #member_name,
                type_name: ::core::any::type_name::<#ty>(),
                type_id: ::core::any::TypeId::of::<#ty>(),
                tag: #tag,
                readable: true,
                writable: #writable,
            }
        }
    });

    let member_arms = tagged.iter().map(|t| {
        let ident = t.ident;
        let member_name = &t.member_name;
        quote! {
            #member_name => ::core::option::Option::Some(&self.#ident as &dyn ::core::any::Any)
        }
    });

    let member_mut_arms = tagged.iter().map(|t| {
        let ident = t.ident;
        let member_name = &t.member_name;
        quote! {
            #member_name => ::core::option::Option::Some(&mut self.#ident as &mut dyn ::core::any::Any)
        }
    });

    Ok(quote! {
        impl ::redlilium_prefab::Reflect for #name {
            fn reflect_name(&self) -> &'static str {
                #name_str
            }

            fn members(&self) -> &'static [::redlilium_prefab::MemberInfo] {
                static MEMBERS: ::std::sync::LazyLock<::std::vec::Vec<::redlilium_prefab::MemberInfo>> =
                    ::std::sync::LazyLock::new(|| ::std::vec![#(#infos),*]);
                &MEMBERS
            }

            fn member(&self, name: &str) -> ::core::option::Option<&dyn ::core::any::Any> {
                match name {
                    #(#member_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn member_mut(&mut self, name: &str) -> ::core::option::Option<&mut dyn ::core::any::Any> {
                match name {
                    #(#member_mut_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }
    })
}

/// Read `#[value(...)]` / `#[reference(...)]` from a field.
fn parse_tag(field: &Field) -> syn::Result<Option<TaggedField<'_>>> {
    let mut found: Option<TaggedField<'_>> = None;

    for attr in &field.attrs {
        let reference = if attr.path().is_ident("value") {
            false
        } else if attr.path().is_ident("reference") {
            true
        } else {
            continue;
        };

        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a member can be tagged either #[value] or #[reference], not both",
            ));
        }

        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "tagged fields must be named"))?;
        let mut tagged = TaggedField {
            ident,
            ty: &field.ty,
            member_name: ident.to_string(),
            reference,
            read_only: false,
        };

        if matches!(attr.meta, syn::Meta::List(_)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    tagged.member_name = lit.value();
                    Ok(())
                } else if meta.path.is_ident("read_only") {
                    tagged.read_only = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `rename = \"...\"` or `read_only`"))
                }
            })?;
        }

        found = Some(tagged);
    }

    Ok(found)
}
