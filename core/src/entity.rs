//! Whole-entity marshalling built from declared field tables.
//!
//! # Design
//! An entity type lists its fields once in `Entity::declare`. The resulting
//! `EntityCodec` is cached process-wide by `TypeId`, so every later lookup is
//! a map read returning the same `Arc`. Building is pure: two threads racing
//! on first use both produce the same table and one of them wins the insert.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::field::{FieldSpec, FieldTable, WireValue};

/// A typed record exchanged with the REST backend.
///
/// ```
/// use restgate_core::{Entity, FieldTable, Maybe};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Tag {
///     id: Maybe<i64>,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn declare(fields: &mut FieldTable<Self>) {
///         fields
///             .field("id", |t| &t.id, |t| &mut t.id)
///             .field_as("label", "name", |t| &t.label, |t| &mut t.label);
///     }
/// }
/// ```
pub trait Entity: Default + Send + Sync + 'static {
    /// Wire key of the primary key.
    const PRIMARY_KEY: &'static str = "id";

    /// Lists every wire-mapped field, in wire order.
    fn declare(fields: &mut FieldTable<Self>);
}

type CodecCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn cache() -> &'static CodecCache {
    static CACHE: OnceLock<CodecCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Field table of one entity type, plus whole-entity conversion.
#[derive(Debug)]
pub struct EntityCodec<E> {
    fields: Vec<FieldSpec<E>>,
}

impl<E: Entity> EntityCodec<E> {
    /// Cached codec for `E`, built on first use.
    pub fn shared() -> Arc<Self> {
        let key = TypeId::of::<E>();
        if let Some(codec) = Self::cached(key) {
            return codec;
        }

        let codec = Arc::new(Self::build());
        let mut map = cache().write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = map
            .entry(key)
            .or_insert_with(|| codec.clone() as Arc<dyn Any + Send + Sync>);
        entry.clone().downcast::<Self>().unwrap_or(codec)
    }

    fn cached(key: TypeId) -> Option<Arc<Self>> {
        let map = cache().read().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(&key).cloned()?.downcast::<Self>().ok()
    }

    fn build() -> Self {
        let mut table = FieldTable::new();
        E::declare(&mut table);
        Self {
            fields: table.into_specs(),
        }
    }

    pub fn fields(&self) -> &[FieldSpec<E>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec<E>> {
        self.fields.iter().find(|spec| spec.name() == name)
    }

    /// Wire object for `entity`; fields holding the absent sentinel are left out.
    pub fn to_wire(&self, entity: &E) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|spec| {
                spec.encode(entity)
                    .map(|value| (spec.wire_key().to_string(), value))
            })
            .collect()
    }

    /// Decodes a wire object; missing keys leave fields at their default.
    pub fn from_wire(&self, wire: Value) -> ApiResult<E> {
        let mut entity = E::default();
        self.merge_wire(&mut entity, wire)?;
        Ok(entity)
    }

    /// Overwrites the fields of `entity` whose wire keys appear in `wire`.
    pub fn merge_wire(&self, entity: &mut E, wire: Value) -> ApiResult<()> {
        let Value::Object(mut object) = wire else {
            return Err(ApiError::Shape(format!(
                "expected an object for {}, got {}",
                short_type_name::<E>(),
                kind(&wire)
            )));
        };
        for spec in &self.fields {
            if let Some(value) = object.remove(spec.wire_key()) {
                spec.decode(entity, value)?;
            }
        }
        Ok(())
    }
}

/// Shorthand for `EntityCodec::<E>::shared().to_wire(entity)`.
pub fn to_wire<E: Entity>(entity: &E) -> Map<String, Value> {
    EntityCodec::<E>::shared().to_wire(entity)
}

/// Shorthand for `EntityCodec::<E>::shared().from_wire(wire)`.
pub fn from_wire<E: Entity>(wire: Value) -> ApiResult<E> {
    EntityCodec::<E>::shared().from_wire(wire)
}

/// Nested entities are codec-capable through their own table.
impl<E: Entity> WireValue for E {
    fn to_wire(&self) -> Value {
        Value::Object(to_wire(self))
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        from_wire(wire)
    }
}

/// Reference to another entity, sent as that entity's primary key.
///
/// Decoding a bare key yields a stub with only the key set; an expanded
/// object decodes as the full entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignKey<E>(pub E);

impl<E: Entity> ForeignKey<E> {
    pub fn new(entity: E) -> Self {
        Self(entity)
    }

    pub fn entity(&self) -> &E {
        &self.0
    }

    pub fn into_inner(self) -> E {
        self.0
    }

    /// The referenced key, `null` when the entity has none.
    pub fn key(&self) -> Value {
        to_wire(&self.0).remove(E::PRIMARY_KEY).unwrap_or(Value::Null)
    }
}

impl<E: Entity> WireValue for ForeignKey<E> {
    fn to_wire(&self) -> Value {
        self.key()
    }

    fn from_wire(wire: Value) -> ApiResult<Self> {
        let object = match wire {
            Value::Object(object) => object,
            key => Map::from_iter([(E::PRIMARY_KEY.to_string(), key)]),
        };
        from_wire(Value::Object(object)).map(ForeignKey)
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn short_type_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}
