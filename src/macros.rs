//! Accessor and construction macros
//!
//! Internal macros use `paste` for identifier concatenation.

// =============================================================================
// Accessor generation
// =============================================================================

/// Generate `is_xxx` and `as_xxx` methods for single-field enum variants
///
/// Uses paste's `:snake` modifier to derive the method name from the variant.
///
/// # Example
/// ```ignore
/// impl PropValue {
///     // Text -> is_text / as_text
///     impl_value_accessors!(Text => CompactString, Number => f64);
/// }
/// ```
macro_rules! impl_value_accessors {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                #[doc = "Check if this is a `" $variant "` value"]
                pub fn [<is_ $variant:snake>](&self) -> bool {
                    matches!(self, Self::$variant(_))
                }

                #[doc = "Try to get the `" $variant "` payload"]
                pub fn [<as_ $variant:snake>](&self) -> Option<&$ty> {
                    match self { Self::$variant(v) => Some(v), _ => None }
                }
            )*
        }
    };
}

// =============================================================================
// Construction
// =============================================================================

/// Build a [`Child`](crate::Child) list from heterogeneous values.
///
/// Every argument goes through `Child::from`, so strings, numbers, booleans,
/// options, vectors and view descriptions can be mixed.
///
/// ```
/// use flact::{children, h, Props};
///
/// let list = children![
///     h("b", Props::new(), "bold"),
///     " and ",
///     42,
///     false,
/// ];
/// let p = h("p", Props::new(), list);
/// assert_eq!(p.props.children().len(), 3);
/// ```
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        $crate::Child::List(::std::vec![$($crate::Child::from($child)),*])
    };
}

/// Build a dependency list for memo and effect hooks.
///
/// `deps![]` is the static list (compute once per node lifetime).
///
/// ```
/// use flact::deps;
///
/// let a = deps![1, "x"];
/// let b = deps![1, "x"];
/// assert!(!flact::is_deps_changed(Some(&a), &b));
/// ```
#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {
        $crate::Deps::from_list(::std::vec![
            $(::std::boxed::Box::new($dep) as ::std::boxed::Box<dyn $crate::Dependency>),*
        ])
    };
}
