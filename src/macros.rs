/// Describes a record and implements the codec traits for it.
///
/// Each entry is a field, optionally followed by its tag, or an embedded
/// record written `..field` (or `..boxed field` for an `Option<Box<E>>`):
///
/// ```
/// #[derive(Default)]
/// struct Audit {
///     created_by: String,
/// }
///
/// dynamodb_fluent::record! {
///     Audit {
///         created_by: "CreatedBy,omitempty",
///     }
/// }
///
/// #[derive(Default)]
/// struct User {
///     user_id: i64,
///     name: String,
///     friends: Vec<String>,
///     audit: Audit,
///     password: String,
/// }
///
/// dynamodb_fluent::record! {
///     User {
///         user_id: "UserID,hash",
///         name,
///         friends: "Friends,set",
///         ..audit,
///         password: "-",
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    ($record:ident { $($body:tt)* }) => {
        impl $crate::plan::Record for $record {
            fn describe(fields: &mut $crate::plan::Fields<Self>) {
                $crate::record!(@fields fields; $($body)*);
            }
        }

        $crate::record_codec!($record);
    };
    (@fields $fields:ident;) => {};
    (@fields $fields:ident; .. boxed $field:ident $(, $($rest:tt)*)?) => {
        $fields.embed_boxed(
            stringify!($field),
            |record: &Self| record.$field.as_deref(),
            |record: &mut Self| &mut record.$field,
        );
        $crate::record!(@fields $fields; $($($rest)*)?);
    };
    (@fields $fields:ident; .. $field:ident $(, $($rest:tt)*)?) => {
        $fields.embed(
            stringify!($field),
            |record: &Self| &record.$field,
            |record: &mut Self| &mut record.$field,
        );
        $crate::record!(@fields $fields; $($($rest)*)?);
    };
    (@fields $fields:ident; $field:ident : $tag:literal $(, $($rest:tt)*)?) => {
        $fields.field(
            stringify!($field),
            $tag,
            |record: &Self| &record.$field,
            |record: &mut Self| &mut record.$field,
        );
        $crate::record!(@fields $fields; $($($rest)*)?);
    };
    (@fields $fields:ident; $field:ident $(, $($rest:tt)*)?) => {
        $fields.field(
            stringify!($field),
            "",
            |record: &Self| &record.$field,
            |record: &mut Self| &mut record.$field,
        );
        $crate::record!(@fields $fields; $($($rest)*)?);
    };
}

/// Implements the codec traits for a type with a hand-written
/// [`Record`](crate::plan::Record) implementation.
#[macro_export]
macro_rules! record_codec {
    ($record:ty) => {
        impl $crate::codec::Marshal for $record {
            fn marshal(
                &self,
                flags: $crate::attribute::Flags,
            ) -> $crate::Result<Option<$crate::attribute::AttributeValue>> {
                $crate::plan::plan_for::<Self>().encode_value(self, flags)
            }

            fn is_empty_value(&self) -> bool {
                $crate::plan::plan_for::<Self>().is_empty(self)
            }
        }

        impl $crate::codec::Unmarshal for $record {
            fn unmarshal(&mut self, value: &$crate::attribute::AttributeValue) -> $crate::Result<()> {
                $crate::plan::plan_for::<Self>().decode(self, value)
            }
        }

        impl $crate::codec::ItemMarshal for $record {
            fn marshal_item(&self) -> $crate::Result<$crate::attribute::Item> {
                $crate::plan::plan_for::<Self>().encode_item(self)
            }
        }

        impl $crate::codec::ItemUnmarshal for $record {
            fn unmarshal_item(&mut self, item: &$crate::attribute::Item) -> $crate::Result<()> {
                $crate::plan::plan_for::<Self>().decode_item(self, item)
            }
        }
    };
}

/// Lets a type with hand-written [`ItemMarshal`](crate::codec::ItemMarshal)
/// and [`ItemUnmarshal`](crate::codec::ItemUnmarshal) implementations be used
/// as a map attribute.
#[macro_export]
macro_rules! item_attribute {
    ($type:ty) => {
        impl $crate::codec::Marshal for $type {
            fn marshal(
                &self,
                flags: $crate::attribute::Flags,
            ) -> $crate::Result<Option<$crate::attribute::AttributeValue>> {
                $crate::codec::marshal_item_attribute(self, flags)
            }
        }

        impl $crate::codec::Unmarshal for $type {
            fn unmarshal(&mut self, value: &$crate::attribute::AttributeValue) -> $crate::Result<()> {
                $crate::codec::unmarshal_item_attribute(self, value)
            }
        }
    };
}
