//! CRUD facade over one REST resource.
//!
//! # Design
//! A `Gateway<E>` owns the paths of one resource and an explicit handle to
//! the `HttpClient`; it never discovers either implicitly. Payloads cross
//! `EntityCodec<E>` in both directions and collection reads go through the
//! `PageWalker`.
//!
//! Member operations substitute the primary key into a template such as
//! `widgets/%pk%/`. A gateway without a template can still list and create
//! but fails member operations with `ApiError::Configuration`.
//!
//! `create` on an entity that already carries a primary key is routed to
//! `update` (PATCH) unless the gateway was built with `without_upsert`.
//!
//! Payloads need not be `E` itself: `create_with` and `update_with` accept any
//! entity type as the request body, and `read_filtered` encodes a filter
//! entity into GET parameters. Responses are always decoded as `E`.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::entity::{kind, Entity, EntityCodec};
use crate::error::{ApiError, ApiResult};
use crate::http::{Headers, HttpClient, Query};
use crate::pagination::{PageWalker, PaginationConfig, ProgressCallback};

/// Placeholder replaced by the primary key in member path templates.
pub const PK_PLACEHOLDER: &str = "%pk%";

/// GET parameters for a filter entity.
///
/// Absent and null fields send nothing; arrays repeat the parameter once per
/// element. Nested objects cannot be expressed as parameters.
pub fn filter_query<F: Entity>(filter: &F) -> ApiResult<Query> {
    let mut query = Query::new();
    for (key, value) in EntityCodec::<F>::shared().to_wire(filter) {
        match value {
            Value::Array(values) => {
                for value in values {
                    if let Some(value) = query_value(&key, value)? {
                        query.push((key.clone(), value));
                    }
                }
            }
            value => {
                if let Some(value) = query_value(&key, value)? {
                    query.push((key, value));
                }
            }
        }
    }
    Ok(query)
}

fn query_value(key: &str, value: Value) -> ApiResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(value) => Ok(Some(value)),
        Value::Bool(value) => Ok(Some(value.to_string())),
        Value::Number(value) => Ok(Some(value.to_string())),
        other => Err(ApiError::Shape(format!(
            "filter `{key}` is {}, expected a scalar",
            kind(&other)
        ))),
    }
}

/// Which operations a gateway allows and how it reads collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Standard,
    /// One fixed resource at the collection path; no create or delete.
    SingleResource,
    /// Reads only.
    ReadOnly,
    /// Unpaginated collection; `read(None, ..)` hands back the lazy stream.
    ListOnly,
}

impl GatewayKind {
    fn permits(&self, operation: &str) -> bool {
        match self {
            GatewayKind::Standard | GatewayKind::ListOnly => true,
            GatewayKind::SingleResource => !matches!(operation, "create" | "delete"),
            GatewayKind::ReadOnly => !matches!(operation, "create" | "update" | "delete"),
        }
    }
}

/// Result of `Gateway::read`.
pub enum Read<E> {
    One(E),
    Many(Vec<E>),
    Lazy(BoxStream<'static, ApiResult<E>>),
}

impl<E: std::fmt::Debug> std::fmt::Debug for Read<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Read::One(entity) => f.debug_tuple("One").field(entity).finish(),
            Read::Many(entities) => f.debug_tuple("Many").field(entities).finish(),
            Read::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// CRUD operations for entity type `E` on one resource path.
pub struct Gateway<E> {
    client: Arc<dyn HttpClient>,
    walker: PageWalker,
    codec: Arc<EntityCodec<E>>,
    collection_path: String,
    member_path: Option<String>,
    primary_key: String,
    kind: GatewayKind,
    upsert: bool,
}

impl<E: Entity> Gateway<E> {
    /// Standard gateway on `collection_path`, with no member template yet.
    pub fn new(client: Arc<dyn HttpClient>, collection_path: &str) -> Self {
        Self {
            walker: PageWalker::new(client.clone(), PaginationConfig::default()),
            client,
            codec: EntityCodec::shared(),
            collection_path: collection_path.to_string(),
            member_path: None,
            primary_key: E::PRIMARY_KEY.to_string(),
            kind: GatewayKind::Standard,
            upsert: true,
        }
    }

    /// Gateway on one fixed resource at `path`.
    pub fn single(client: Arc<dyn HttpClient>, path: &str) -> Self {
        Self::new(client, path).with_kind(GatewayKind::SingleResource)
    }

    /// Sets the member template; it must contain `%pk%`.
    pub fn with_member_path(mut self, template: &str) -> Self {
        self.member_path = Some(template.to_string());
        self
    }

    /// Wire key of the primary key field (default `id`).
    pub fn with_primary_key(mut self, wire_key: &str) -> Self {
        self.primary_key = wire_key.to_string();
        self
    }

    pub fn with_kind(mut self, kind: GatewayKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn read_only(self) -> Self {
        self.with_kind(GatewayKind::ReadOnly)
    }

    pub fn list_only(self) -> Self {
        self.with_kind(GatewayKind::ListOnly)
    }

    /// Makes `create` always POST, even for entities that carry a key.
    pub fn without_upsert(mut self) -> Self {
        self.upsert = false;
        self
    }

    pub fn with_pagination(mut self, config: PaginationConfig) -> Self {
        self.walker = self.walker.with_config(config);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.walker = self.walker.with_progress(progress);
        self
    }

    pub fn kind(&self) -> GatewayKind {
        self.kind
    }

    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// Member path for `pk`.
    pub fn member_path(&self, pk: &str) -> ApiResult<String> {
        self.member_path
            .as_ref()
            .map(|template| template.replace(PK_PLACEHOLDER, pk))
            .ok_or_else(|| {
                ApiError::Configuration(format!(
                    "`{}` has no member path template",
                    self.collection_path
                ))
            })
    }

    /// Primary key carried by `entity`; null or absent means none.
    pub fn primary_key_of(&self, entity: &E) -> Option<String> {
        self.key_in(self.codec.to_wire(entity))
    }

    fn key_in(&self, mut wire: Map<String, Value>) -> Option<String> {
        match wire.remove(&self.primary_key)? {
            Value::String(pk) => Some(pk),
            Value::Number(pk) => Some(pk.to_string()),
            _ => None,
        }
    }

    /// One entity when `pk` is given, otherwise the whole collection.
    ///
    /// A `ListOnly` gateway returns the collection as an unconsumed stream.
    /// A `SingleResource` gateway always reads its fixed path and rejects a
    /// `pk` with `ApiError::Configuration`.
    pub async fn read(&self, pk: Option<&str>, query: Query) -> ApiResult<Read<E>> {
        if self.kind == GatewayKind::SingleResource {
            if let Some(pk) = pk {
                return Err(ApiError::Configuration(format!(
                    "`{}` is a single resource; got primary key `{pk}`",
                    self.collection_path
                )));
            }
            return self.get_one(&self.collection_path, &query).await.map(Read::One);
        }
        match pk {
            Some(pk) => {
                let path = self.member_path(pk)?;
                self.get_one(&path, &query).await.map(Read::One)
            }
            None if self.kind == GatewayKind::ListOnly => Ok(Read::Lazy(self.stream(query))),
            None => self.fetch_all(query).await.map(Read::Many),
        }
    }

    /// `read` with the query built from a filter entity.
    pub async fn read_filtered<F: Entity>(
        &self,
        pk: Option<&str>,
        filter: &F,
    ) -> ApiResult<Read<E>> {
        self.read(pk, filter_query(filter)?).await
    }

    /// The entity at `pk`, or the fixed resource of a single-resource gateway.
    pub async fn fetch(&self, pk: &str) -> ApiResult<E> {
        let path = match self.kind {
            GatewayKind::SingleResource => self.collection_path.clone(),
            _ => self.member_path(pk)?,
        };
        self.get_one(&path, &Query::new()).await
    }

    /// Every entity of the collection, across all pages.
    #[instrument(skip_all, fields(resource = %self.collection_path))]
    pub async fn fetch_all(&self, query: Query) -> ApiResult<Vec<E>> {
        let records = self.walker.collect(&self.collection_path, query).await?;
        records
            .into_iter()
            .map(|record| self.codec.from_wire(record))
            .collect()
    }

    /// Lazily decoded collection; pages are fetched as the stream is pulled.
    pub fn stream(&self, query: Query) -> BoxStream<'static, ApiResult<E>> {
        let codec = self.codec.clone();
        self.walker
            .walk(&self.collection_path, query)
            .map(move |record| record.and_then(|record| codec.from_wire(record)))
            .boxed()
    }

    /// Re-reads `entity` by its own primary key and merges the response in place.
    pub async fn refresh(&self, entity: &mut E) -> ApiResult<()> {
        let path = match self.kind {
            GatewayKind::SingleResource => self.collection_path.clone(),
            _ => {
                let pk = self.primary_key_of(entity).ok_or_else(|| {
                    ApiError::Configuration(format!(
                        "cannot refresh an entity of `{}` without `{}`",
                        self.collection_path, self.primary_key
                    ))
                })?;
                self.member_path(&pk)?
            }
        };
        let wire = self.client.get(&path, &Query::new()).await?;
        self.codec.merge_wire(entity, wire)
    }

    /// POSTs a new entity; an entity that already has a key is updated instead.
    pub async fn create(&self, entity: &E) -> ApiResult<E> {
        self.create_with(entity).await
    }

    /// `create` with a payload type other than `E`.
    #[instrument(skip_all, fields(resource = %self.collection_path))]
    pub async fn create_with<I: Entity>(&self, input: &I) -> ApiResult<E> {
        self.ensure_permitted("create")?;
        let wire = EntityCodec::<I>::shared().to_wire(input);
        if self.upsert {
            if let Some(pk) = self.key_in(wire.clone()) {
                debug!(pk = %pk, "entity already has a primary key, updating instead");
                return self.send_update(&pk, wire).await;
            }
        }
        let body = Value::Object(wire);
        let created = self
            .client
            .post(&self.collection_path, &body, &Query::new())
            .await?;
        self.codec.from_wire(created)
    }

    /// PATCHes the supplied fields of `entity` onto the resource at `pk`.
    ///
    /// A single-resource gateway POSTs to its fixed path and ignores `pk`.
    pub async fn update(&self, pk: &str, entity: &E) -> ApiResult<E> {
        self.update_with(pk, entity).await
    }

    /// `update` with a dedicated change type; the response is still decoded as `E`.
    #[instrument(skip_all, fields(resource = %self.collection_path, pk = %pk))]
    pub async fn update_with<U: Entity>(&self, pk: &str, changes: &U) -> ApiResult<E> {
        self.ensure_permitted("update")?;
        self.send_update(pk, EntityCodec::<U>::shared().to_wire(changes))
            .await
    }

    async fn send_update(&self, pk: &str, wire: Map<String, Value>) -> ApiResult<E> {
        let body = Value::Object(wire);
        let updated = match self.kind {
            GatewayKind::SingleResource => {
                self.client
                    .post(&self.collection_path, &body, &Query::new())
                    .await?
            }
            _ => {
                let path = self.member_path(pk)?;
                self.client.patch(&path, &body, &Query::new()).await?
            }
        };
        self.codec.from_wire(updated)
    }

    #[instrument(skip_all, fields(resource = %self.collection_path, pk = %pk))]
    pub async fn delete(&self, pk: &str) -> ApiResult<()> {
        self.ensure_permitted("delete")?;
        let path = self.member_path(pk)?;
        self.client.delete(&path, &Query::new()).await?;
        Ok(())
    }

    /// Response headers of a HEAD on the collection path.
    pub async fn headers(&self, query: Query) -> ApiResult<Headers> {
        self.client.head(&self.collection_path, &query).await
    }

    async fn get_one(&self, path: &str, query: &Query) -> ApiResult<E> {
        let wire = self.client.get(path, query).await?;
        self.codec.from_wire(wire)
    }

    fn ensure_permitted(&self, operation: &'static str) -> ApiResult<()> {
        if self.kind.permits(operation) {
            Ok(())
        } else {
            Err(ApiError::OperationNotPermitted {
                operation,
                resource: self.collection_path.clone(),
            })
        }
    }
}
