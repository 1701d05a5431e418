use std::fmt;

/// A structured state value with named top-level keys.
///
/// Equality is structural. A record knows how to shallow-merge a partial
/// value ([`Record::Patch`]) into itself and which of its keys differ from
/// another value. Most records are declared with [`record!`](crate::record),
/// which derives all of this from the field list.
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// Partial form of the record: every key is optional.
    type Patch: Clone + Default + fmt::Debug + Send + Sync + 'static;

    /// Top-level key names, in declaration order.
    const KEYS: &'static [&'static str];

    /// Replace every key present in `patch`, leaving the others untouched.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// A patch that sets every key to this value's contents.
    fn into_patch(self) -> Self::Patch;

    /// Keys whose values differ between `self` and `next`, in declaration order.
    fn changed_keys(&self, next: &Self) -> Vec<&'static str>;

    /// Whether `key` names one of this record's top-level keys.
    fn has_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }
}

/// Declare a [`Record`] struct together with its patch type.
///
/// The struct derives `Clone`, `Debug` and `PartialEq`; do not derive them
/// again. Other attributes (for example serde derives) are forwarded to the
/// struct only.
///
/// ```
/// use tincan_store::{record, Record};
///
/// record! {
///     pub struct Settings => SettingsPatch {
///         pub volume: u8,
///         pub muted: bool,
///     }
/// }
///
/// let mut settings = Settings { volume: 3, muted: false };
/// settings.apply_patch(SettingsPatch { muted: Some(true), ..Default::default() });
/// assert!(settings.muted);
/// assert_eq!(settings.volume, 3);
/// assert_eq!(Settings::KEYS, &["volume", "muted"]);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $patch:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $field_ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $field_ty,
            )*
        }

        #[doc = concat!("Partial [`", stringify!($name), "`]; each `Some` field replaces that key.")]
        #[derive(Clone, Debug, Default, PartialEq)]
        $vis struct $patch {
            $(
                pub $field: ::core::option::Option<$field_ty>,
            )*
        }

        impl $crate::Record for $name {
            type Patch = $patch;

            const KEYS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn apply_patch(&mut self, patch: Self::Patch) {
                $(
                    if let ::core::option::Option::Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }

            fn into_patch(self) -> Self::Patch {
                $patch {
                    $(
                        $field: ::core::option::Option::Some(self.$field),
                    )*
                }
            }

            fn changed_keys(&self, next: &Self) -> ::std::vec::Vec<&'static str> {
                #[allow(unused_mut)]
                let mut changed = ::std::vec::Vec::new();
                $(
                    if self.$field != next.$field {
                        changed.push(stringify!($field));
                    }
                )*
                changed
            }
        }
    };
}
