//! Per-field conversion between entity values and wire JSON.
//!
//! # Design
//! Every field type resolves to exactly one `WireValue` implementation, which
//! plays the role of its codec:
//!
//! - codec-capable types convert themselves: `choice!` enums encode as their
//!   wire string, nested entities go through their own table;
//! - `Maybe<T>` passes `Absent` and `Null` through untouched and only
//!   converts present values;
//! - `Vec<T>` applies `T`'s codec element-wise;
//! - primitives are identity conversions with type-shape coercion only.
//!
//! `FieldSpec` binds one codec to a struct field through plain accessor
//! functions, so a field table is built without any runtime reflection.

use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Bidirectional conversion of one field value.
pub trait WireValue: Sized {
    fn to_wire(&self) -> Value;

    fn from_wire(wire: Value) -> ApiResult<Self>;

    /// True for the "not supplied" sentinel, which is left out of payloads.
    fn is_absent(&self) -> bool {
        false
    }
}

/// An optional field that distinguishes "not supplied" from explicit `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Maybe<T> {
    /// Not supplied: omitted from outgoing payloads, left untouched server-side.
    Absent,
    /// Explicitly null: sent as `null`, clears the server-side value.
    Null,
    Present(T),
}

impl<T> Default for Maybe<T> {
    fn default() -> Self {
        Maybe::Absent
    }
}

impl<T> Maybe<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Maybe::Present(_))
    }

    pub fn as_ref(&self) -> Maybe<&T> {
        match self {
            Maybe::Absent => Maybe::Absent,
            Maybe::Null => Maybe::Null,
            Maybe::Present(value) => Maybe::Present(value),
        }
    }

    /// Collapses `Absent` and `Null` into `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Maybe::Present(value) => Some(value),
            Maybe::Absent | Maybe::Null => None,
        }
    }
}

impl<T> From<T> for Maybe<T> {
    fn from(value: T) -> Self {
        Maybe::Present(value)
    }
}

impl<T> From<Option<T>> for Maybe<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Maybe::Null, Maybe::Present)
    }
}

impl<T: WireValue> WireValue for Maybe<T> {
    fn to_wire(&self) -> Value {
        match self {
            Maybe::Present(value) => value.to_wire(),
            Maybe::Absent | Maybe::Null => Value::Null,
        }
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        match wire {
            Value::Null => Ok(Maybe::Null),
            wire => T::from_wire(wire).map(Maybe::Present),
        }
    }

    fn is_absent(&self) -> bool {
        matches!(self, Maybe::Absent)
    }
}

/// Nullable field without an absent state.
impl<T: WireValue> WireValue for Option<T> {
    fn to_wire(&self) -> Value {
        self.as_ref().map_or(Value::Null, WireValue::to_wire)
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        match wire {
            Value::Null => Ok(None),
            wire => T::from_wire(wire).map(Some),
        }
    }
}

impl<T: WireValue> WireValue for Vec<T> {
    fn to_wire(&self) -> Value {
        Value::Array(self.iter().map(WireValue::to_wire).collect())
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        match wire {
            Value::Array(items) => items.into_iter().map(T::from_wire).collect(),
            other => Err(ApiError::Shape(format!("expected an array, got {other}"))),
        }
    }
}

impl WireValue for Value {
    fn to_wire(&self) -> Value {
        self.clone()
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        Ok(wire)
    }
}

macro_rules! identity_codec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl WireValue for $ty {
                fn to_wire(&self) -> Value {
                    Value::from(self.clone())
                }

                fn from_wire(wire: Value) -> ApiResult<Self> {
                    serde_json::from_value(wire).map_err(|e| ApiError::Shape(e.to_string()))
                }
            }
        )+
    };
}

identity_codec!(String, bool, i32, i64, u32, u64, f32, f64);

/// Declares an enumerated choice field.
///
/// ```
/// restgate_core::choice! {
///     pub enum Status {
///         Draft => "draft",
///         Active => "active",
///     }
/// }
/// assert_eq!(Status::Active.as_str(), "active");
/// ```
#[macro_export]
macro_rules! choice {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::field::WireValue for $name {
            fn to_wire(&self) -> $crate::__private::Value {
                $crate::__private::Value::String(self.as_str().to_string())
            }

            fn from_wire(wire: $crate::__private::Value) -> $crate::ApiResult<Self> {
                match wire.as_str() {
                    $(Some($wire) => Ok($name::$variant),)+
                    _ => Err($crate::ApiError::Shape(format!(
                        "{} is not a valid {}",
                        wire,
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

type Encoder<E> = Box<dyn Fn(&E) -> Option<Value> + Send + Sync>;
type Decoder<E> = Box<dyn Fn(&mut E, Value) -> ApiResult<()> + Send + Sync>;

/// Conversion for one field of entity type `E`.
pub struct FieldSpec<E> {
    name: &'static str,
    wire_key: String,
    encode: Encoder<E>,
    decode: Decoder<E>,
}

impl<E: 'static> FieldSpec<E> {
    pub fn new<T: WireValue + 'static>(
        name: &'static str,
        wire_key: &str,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Self {
        Self {
            name,
            wire_key: wire_key.to_string(),
            encode: Box::new(move |entity| {
                let value = get(entity);
                (!value.is_absent()).then(|| value.to_wire())
            }),
            decode: Box::new(move |entity, wire| {
                *get_mut(entity) = T::from_wire(wire).map_err(|e| in_field(name, e))?;
                Ok(())
            }),
        }
    }
}

impl<E> FieldSpec<E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn wire_key(&self) -> &str {
        &self.wire_key
    }

    /// Wire value of the field, `None` when it holds the absent sentinel.
    pub fn encode(&self, entity: &E) -> Option<Value> {
        (self.encode)(entity)
    }

    pub fn decode(&self, entity: &mut E, wire: Value) -> ApiResult<()> {
        (self.decode)(entity, wire)
    }
}

impl<E> std::fmt::Debug for FieldSpec<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("wire_key", &self.wire_key)
            .finish_non_exhaustive()
    }
}

fn in_field(name: &str, err: ApiError) -> ApiError {
    match err {
        ApiError::Shape(msg) => ApiError::Shape(format!("field `{name}`: {msg}")),
        other => other,
    }
}

/// Builder an entity type fills in once to declare its fields.
pub struct FieldTable<E> {
    specs: Vec<FieldSpec<E>>,
}

impl<E: 'static> FieldTable<E> {
    pub(crate) fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Declares a field whose wire key equals its name.
    pub fn field<T: WireValue + 'static>(
        &mut self,
        name: &'static str,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> &mut Self {
        self.field_as(name, name, get, get_mut)
    }

    /// Declares a field sent under a different wire key.
    ///
    /// # Panics
    /// If another field already uses `wire_key`.
    pub fn field_as<T: WireValue + 'static>(
        &mut self,
        name: &'static str,
        wire_key: &str,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> &mut Self {
        assert!(
            self.specs.iter().all(|spec| spec.wire_key != wire_key),
            "duplicate wire key `{wire_key}` for field `{name}`"
        );
        self.specs.push(FieldSpec::new(name, wire_key, get, get_mut));
        self
    }

    pub(crate) fn into_specs(self) -> Vec<FieldSpec<E>> {
        self.specs
    }
}
