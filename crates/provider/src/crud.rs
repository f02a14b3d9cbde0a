//! Generic CRUD dispatcher
//!
//! Resources describe themselves with a [`CrudConfig`] (data sources with a
//! [`DsReadConfig`]) and hand it to the functions in this module, which own
//! the control flow: build the request type from state, run hooks, call the
//! SDK and store the result. A config is built for a single operation and
//! dropped afterwards.
//!
//! Hooks run in list order and the first failure aborts the operation. Hooks
//! only see state through a shared reference; state is written by the
//! `state_store_func` alone.

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::resources::{ProviderContext, Resource};
use crate::state::ResourceData;

/// Lookup field used by data sources unless overridden
pub const DEFAULT_NAME_FIELD: &str = "name";

/// Operations the dispatcher needs on an SDK entity
#[async_trait]
pub trait UpdateDeleter<I>: Sized + Send + Sync
where
    I: Send + Sync,
{
    async fn update(&self, inner: &I) -> vcd_sdk::Result<Self>;

    async fn delete(&self) -> vcd_sdk::Result<()>;
}

/// Builds the request type from state
///
/// Runs ahead of the empty-id check on update, so it must work from state
/// alone and never call the SDK.
pub type GetTypeFunc<I> =
    Box<dyn for<'a> Fn(&'a ResourceData) -> BoxFuture<'a, anyhow::Result<I>> + Send + Sync>;

/// Writes an SDK entity into state
pub type StateStoreFunc<O> =
    Box<dyn Fn(&mut ResourceData, &O) -> anyhow::Result<()> + Send + Sync>;

pub type CreateFunc<O, I> =
    Box<dyn Fn(I) -> BoxFuture<'static, vcd_sdk::Result<O>> + Send + Sync>;

/// Fetches an entity by id (resources) or lookup key (data sources)
pub type GetEntityFunc<O> =
    Box<dyn Fn(String) -> BoxFuture<'static, vcd_sdk::Result<O>> + Send + Sync>;

pub type SchemaHook =
    Box<dyn for<'a> Fn(&'a ResourceData) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

pub type OuterEntityHook<O> =
    Box<dyn for<'a> Fn(&'a O) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync>;

/// Update hook; may rewrite the outgoing request from the fetched entity
pub type OuterEntityHookInnerEntityType<O, I> = Box<
    dyn for<'a> Fn(&'a ResourceData, &'a O, &'a mut I) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync,
>;

pub fn get_type_func<I, F>(f: F) -> GetTypeFunc<I>
where
    F: for<'a> Fn(&'a ResourceData) -> BoxFuture<'a, anyhow::Result<I>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Wrap a request builder that never needs the SDK
pub fn sync_get_type_func<I, F>(f: F) -> GetTypeFunc<I>
where
    I: Send + 'static,
    F: Fn(&ResourceData) -> anyhow::Result<I> + Send + Sync + 'static,
{
    get_type_func(move |d| future::ready(f(d)).boxed())
}

pub fn state_store_func<O, F>(f: F) -> StateStoreFunc<O>
where
    F: Fn(&mut ResourceData, &O) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Box::new(f)
}

pub fn create_func<O, I, F>(f: F) -> CreateFunc<O, I>
where
    F: Fn(I) -> BoxFuture<'static, vcd_sdk::Result<O>> + Send + Sync + 'static,
{
    Box::new(f)
}

pub fn get_entity_func<O, F>(f: F) -> GetEntityFunc<O>
where
    F: Fn(String) -> BoxFuture<'static, vcd_sdk::Result<O>> + Send + Sync + 'static,
{
    Box::new(f)
}

pub fn schema_hook<F>(f: F) -> SchemaHook
where
    F: for<'a> Fn(&'a ResourceData) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    Box::new(f)
}

pub fn entity_hook<O, F>(f: F) -> OuterEntityHook<O>
where
    F: for<'a> Fn(&'a O) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    Box::new(f)
}

pub fn update_hook<O, I, F>(f: F) -> OuterEntityHookInnerEntityType<O, I>
where
    F: for<'a> Fn(&'a ResourceData, &'a O, &'a mut I) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

/// Per-operation description of a managed resource
pub struct CrudConfig<O, I> {
    pub entity_label: &'static str,
    pub get_type_func: GetTypeFunc<I>,
    pub state_store_func: StateStoreFunc<O>,
    pub create_func: CreateFunc<O, I>,
    pub get_entity_func: GetEntityFunc<O>,
    pub pre_create_hooks: Vec<SchemaHook>,
    pub pre_update_hooks: Vec<OuterEntityHookInnerEntityType<O, I>>,
    pub pre_delete_hooks: Vec<OuterEntityHook<O>>,
    pub read_hooks: Vec<OuterEntityHook<O>>,
}

impl<O, I> CrudConfig<O, I> {
    pub fn new(
        entity_label: &'static str,
        get_type_func: GetTypeFunc<I>,
        state_store_func: StateStoreFunc<O>,
        create_func: CreateFunc<O, I>,
        get_entity_func: GetEntityFunc<O>,
    ) -> Self {
        Self {
            entity_label,
            get_type_func,
            state_store_func,
            create_func,
            get_entity_func,
            pre_create_hooks: Vec::new(),
            pre_update_hooks: Vec::new(),
            pre_delete_hooks: Vec::new(),
            read_hooks: Vec::new(),
        }
    }

    pub fn pre_create_hook(mut self, hook: SchemaHook) -> Self {
        self.pre_create_hooks.push(hook);
        self
    }

    pub fn pre_update_hook(mut self, hook: OuterEntityHookInnerEntityType<O, I>) -> Self {
        self.pre_update_hooks.push(hook);
        self
    }

    pub fn pre_delete_hook(mut self, hook: OuterEntityHook<O>) -> Self {
        self.pre_delete_hooks.push(hook);
        self
    }

    pub fn read_hook(mut self, hook: OuterEntityHook<O>) -> Self {
        self.read_hooks.push(hook);
        self
    }
}

/// Per-operation description of a data source
pub struct DsReadConfig<O> {
    pub entity_label: &'static str,
    pub get_entity_func: GetEntityFunc<O>,
    pub state_store_func: StateStoreFunc<O>,
    pub pre_read_hooks: Vec<SchemaHook>,
    /// State field holding the lookup key; `name` when unset
    pub override_default_name_field: Option<&'static str>,
}

impl<O> DsReadConfig<O> {
    pub fn new(
        entity_label: &'static str,
        get_entity_func: GetEntityFunc<O>,
        state_store_func: StateStoreFunc<O>,
    ) -> Self {
        Self {
            entity_label,
            get_entity_func,
            state_store_func,
            pre_read_hooks: Vec::new(),
            override_default_name_field: None,
        }
    }

    pub fn pre_read_hook(mut self, hook: SchemaHook) -> Self {
        self.pre_read_hooks.push(hook);
        self
    }

    pub fn name_field(mut self, field: &'static str) -> Self {
        self.override_default_name_field = Some(field);
        self
    }

    pub fn lookup_field(&self) -> &'static str {
        self.override_default_name_field.unwrap_or(DEFAULT_NAME_FIELD)
    }
}

async fn exec_schema_hooks(d: &ResourceData, hooks: &[SchemaHook]) -> anyhow::Result<()> {
    for hook in hooks {
        hook(d).await?;
    }
    Ok(())
}

async fn exec_entity_hooks<O>(entity: &O, hooks: &[OuterEntityHook<O>]) -> anyhow::Result<()> {
    for hook in hooks {
        hook(entity).await?;
    }
    Ok(())
}

async fn exec_update_hooks<O, I>(
    d: &ResourceData,
    entity: &O,
    inner: &mut I,
    hooks: &[OuterEntityHookInnerEntityType<O, I>],
) -> anyhow::Result<()> {
    for hook in hooks {
        hook(d, entity, &mut *inner).await?;
    }
    Ok(())
}

/// Create the entity, store it and finish with the resource's own read
pub async fn create_resource<O, I, R>(
    ctx: &ProviderContext,
    d: &mut ResourceData,
    c: &CrudConfig<O, I>,
    resource: &R,
) -> Result<(), ProviderError>
where
    O: UpdateDeleter<I>,
    I: Send + Sync,
    R: Resource + ?Sized,
{
    let label = c.entity_label;

    let inner = (c.get_type_func)(&*d)
        .await
        .map_err(|source| ProviderError::GetType {
            label: label.to_string(),
            operation: "create",
            source,
        })?;

    exec_schema_hooks(&*d, &c.pre_create_hooks)
        .await
        .map_err(|source| ProviderError::Hook {
            label: label.to_string(),
            stage: "pre-create",
            source,
        })?;

    debug!("[{} create] calling SDK", label);
    let created = (c.create_func)(inner)
        .await
        .map_err(|source| ProviderError::Create {
            label: label.to_string(),
            source,
        })?;

    (c.state_store_func)(d, &created).map_err(|source| ProviderError::StoreState {
        label: label.to_string(),
        operation: "create",
        source,
    })?;
    debug!("[{} create] stored entity with ID '{}'", label, d.id());

    resource.read(ctx, d).await
}

/// Refresh state from the remote entity. A missing entity clears the id.
pub async fn read_resource<O, I>(
    d: &mut ResourceData,
    c: &CrudConfig<O, I>,
) -> Result<(), ProviderError> {
    let label = c.entity_label;
    let id = d.id().to_string();

    let entity = match (c.get_entity_func)(id.clone()).await {
        Ok(entity) => entity,
        Err(err) if err.is_not_found() => {
            info!(
                "[{} read] entity with ID '{}' not found, removing from state",
                label, id
            );
            d.set_id("");
            return Ok(());
        }
        Err(source) => {
            return Err(ProviderError::Read {
                label: label.to_string(),
                source,
            })
        }
    };

    exec_entity_hooks(&entity, &c.read_hooks)
        .await
        .map_err(|source| ProviderError::Hook {
            label: label.to_string(),
            stage: "read",
            source,
        })?;

    (c.state_store_func)(d, &entity).map_err(|source| ProviderError::StoreState {
        label: label.to_string(),
        operation: "read",
        source,
    })
}

/// Update the entity in place and finish with the resource's own read
pub async fn update_resource<O, I, R>(
    ctx: &ProviderContext,
    d: &mut ResourceData,
    c: &CrudConfig<O, I>,
    resource: &R,
) -> Result<(), ProviderError>
where
    O: UpdateDeleter<I>,
    I: Send + Sync,
    R: Resource + ?Sized,
{
    let label = c.entity_label;

    let mut inner = (c.get_type_func)(&*d)
        .await
        .map_err(|source| ProviderError::GetType {
            label: label.to_string(),
            operation: "update",
            source,
        })?;

    if d.id().is_empty() {
        return Err(ProviderError::EmptyId {
            label: label.to_string(),
        });
    }
    let id = d.id().to_string();

    let entity = (c.get_entity_func)(id.clone())
        .await
        .map_err(|source| ProviderError::Fetch {
            label: label.to_string(),
            operation: "update",
            source,
        })?;

    exec_update_hooks(&*d, &entity, &mut inner, &c.pre_update_hooks)
        .await
        .map_err(|source| ProviderError::Hook {
            label: label.to_string(),
            stage: "pre-update",
            source,
        })?;

    debug!("[{} update] updating entity with ID '{}'", label, id);
    entity
        .update(&inner)
        .await
        .map_err(|source| ProviderError::Update {
            label: label.to_string(),
            id,
            source,
        })?;

    resource.read(ctx, d).await
}

pub async fn delete_resource<O, I>(
    d: &mut ResourceData,
    c: &CrudConfig<O, I>,
) -> Result<(), ProviderError>
where
    O: UpdateDeleter<I>,
    I: Send + Sync,
{
    let label = c.entity_label;
    let id = d.id().to_string();

    let entity = (c.get_entity_func)(id.clone())
        .await
        .map_err(|source| ProviderError::Fetch {
            label: label.to_string(),
            operation: "delete",
            source,
        })?;

    exec_entity_hooks(&entity, &c.pre_delete_hooks)
        .await
        .map_err(|source| ProviderError::Hook {
            label: label.to_string(),
            stage: "pre-delete",
            source,
        })?;

    debug!("[{} delete] deleting entity with ID '{}'", label, id);
    entity
        .delete()
        .await
        .map_err(|source| ProviderError::Delete {
            label: label.to_string(),
            id,
            source,
        })
}

/// Look an entity up by its name field and store it
pub async fn read_datasource<O>(
    d: &mut ResourceData,
    c: &DsReadConfig<O>,
) -> Result<(), ProviderError> {
    let label = c.entity_label;

    exec_schema_hooks(&*d, &c.pre_read_hooks)
        .await
        .map_err(|source| ProviderError::Hook {
            label: label.to_string(),
            stage: "pre-read",
            source,
        })?;

    let field = c.lookup_field();
    let value = d.get_string(field);

    let entity = (c.get_entity_func)(value.clone())
        .await
        .map_err(|source| ProviderError::Lookup {
            label: label.to_string(),
            field: field.to_string(),
            value,
            source,
        })?;

    (c.state_store_func)(d, &entity).map_err(|source| ProviderError::StoreState {
        label: label.to_string(),
        operation: "read",
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::registry::Registry;
    use crate::schema::Schema;
    use crate::state::make_state;

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Clone, Default)]
    struct Spec {
        alias: String,
        certificate: String,
        carried: Option<String>,
    }

    struct Entity {
        id: String,
        alias: String,
        enabled: bool,
        log: Log,
    }

    #[async_trait]
    impl UpdateDeleter<Spec> for Entity {
        async fn update(&self, inner: &Spec) -> vcd_sdk::Result<Self> {
            self.log.lock().push(format!(
                "update:{}:{}",
                inner.alias,
                inner.carried.clone().unwrap_or_default()
            ));
            Ok(Entity {
                id: self.id.clone(),
                alias: inner.alias.clone(),
                enabled: self.enabled,
                log: self.log.clone(),
            })
        }

        async fn delete(&self) -> vcd_sdk::Result<()> {
            self.log.lock().push("delete".to_string());
            Ok(())
        }
    }

    fn push(log: &Log, entry: &str) {
        log.lock().push(entry.to_string());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    fn context() -> ProviderContext {
        let config = vcd_sdk::ClientConfig::new(
            "https://vcd.invalid",
            "System",
            vcd_sdk::Credentials::Token("unused".to_string()),
        );
        ProviderContext {
            client: vcd_sdk::VcdClient::new(config).unwrap(),
            registry: Arc::new(Registry::new()),
        }
    }

    /// `Ok(entity)` for known ids, not-found for `urn:gone`, an API error otherwise
    fn fetch_stub(log: Log) -> GetEntityFunc<Entity> {
        get_entity_func(move |id: String| {
            let log = log.clone();
            async move {
                log.lock().push(format!("get:{}", id));
                match id.as_str() {
                    "urn:gone" => Err(vcd_sdk::Error::not_found("stub", id)),
                    "urn:broken" => Err(vcd_sdk::Error::Api {
                        status: 500,
                        message: "boom".to_string(),
                    }),
                    _ => Ok(Entity {
                        id: id.clone(),
                        alias: "remote".to_string(),
                        enabled: true,
                        log: log.clone(),
                    }),
                }
            }
            .boxed()
        })
    }

    fn config(log: &Log) -> CrudConfig<Entity, Spec> {
        let create_log = log.clone();
        let store_log = log.clone();
        CrudConfig::new(
            "stub",
            sync_get_type_func(|d: &ResourceData| {
                Ok(Spec {
                    alias: d.get_string("alias"),
                    certificate: d.get_string("certificate"),
                    carried: None,
                })
            }),
            state_store_func(move |d: &mut ResourceData, e: &Entity| {
                store_log.lock().push("store".to_string());
                d.set_id(e.id.clone());
                d.set("alias", e.alias.clone())?;
                Ok(())
            }),
            create_func(move |spec: Spec| {
                let log = create_log.clone();
                async move {
                    log.lock().push(format!("create:{}:{}", spec.alias, spec.certificate));
                    Ok(Entity {
                        id: "lib:123".to_string(),
                        alias: spec.alias,
                        enabled: true,
                        log: log.clone(),
                    })
                }
                .boxed()
            }),
            fetch_stub(log.clone()),
        )
    }

    /// Resource whose read goes through the same stub config
    struct StubResource {
        log: Log,
    }

    #[async_trait]
    impl Resource for StubResource {
        fn type_name(&self) -> &'static str {
            "stub"
        }

        fn schema(&self) -> Schema {
            Schema::new("stub")
        }

        async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
            create_resource(ctx, d, &config(&self.log), self).await
        }

        async fn read(&self, _ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
            push(&self.log, "read");
            read_resource(d, &config(&self.log)).await
        }

        async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
            update_resource(ctx, d, &config(&self.log), self).await
        }

        async fn delete(&self, _ctx: &ProviderContext, d: &mut ResourceData) -> Result<(), ProviderError> {
            delete_resource(d, &config(&self.log)).await
        }
    }

    fn counting_hooks(log: &Log, fail_at: usize, count: usize) -> Vec<SchemaHook> {
        (0..count)
            .map(|i| {
                let log = log.clone();
                schema_hook(move |_d| {
                    log.lock().push(format!("hook:{}", i));
                    let result = if i == fail_at {
                        Err(anyhow::anyhow!("hook {} failed", i))
                    } else {
                        Ok(())
                    };
                    future::ready(result).boxed()
                })
            })
            .collect()
    }

    fn counting_entity_hooks(log: &Log, fail_at: usize, count: usize) -> Vec<OuterEntityHook<Entity>> {
        (0..count)
            .map(|i| {
                let log = log.clone();
                entity_hook(move |_e: &Entity| {
                    log.lock().push(format!("hook:{}", i));
                    let result = if i == fail_at {
                        Err(anyhow::anyhow!("hook {} failed", i))
                    } else {
                        Ok(())
                    };
                    future::ready(result).boxed()
                })
            })
            .collect()
    }

    fn counting_update_hooks(
        log: &Log,
        fail_at: usize,
        count: usize,
    ) -> Vec<OuterEntityHookInnerEntityType<Entity, Spec>> {
        (0..count)
            .map(|i| {
                let log = log.clone();
                update_hook(move |_d: &ResourceData, _e: &Entity, _spec: &mut Spec| {
                    log.lock().push(format!("hook:{}", i));
                    let result = if i == fail_at {
                        Err(anyhow::anyhow!("hook {} failed", i))
                    } else {
                        Ok(())
                    };
                    future::ready(result).boxed()
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_stores_once_then_reads() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut d = ResourceData::from_value(&make_state(vec![
            ("certificate", "PEM...".into()),
            ("alias", "cert1".into()),
        ]));

        resource.create(&context(), &mut d).await.unwrap();

        assert_eq!(d.id(), "lib:123");
        assert_eq!(
            entries(&log),
            vec!["create:cert1:PEM...", "store", "read", "get:lib:123", "store"]
        );
    }

    #[tokio::test]
    async fn test_create_failure_never_stores() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut c = config(&log);
        c.create_func = create_func(|_spec: Spec| {
            future::ready(Err(vcd_sdk::Error::Api {
                status: 400,
                message: "bad certificate".to_string(),
            }))
            .boxed()
        });

        let mut d = ResourceData::new();
        let err = create_resource(&context(), &mut d, &c, &resource)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "error creating stub: API error 400: bad certificate");
        assert!(!entries(&log).contains(&"store".to_string()));
        assert!(d.id().is_empty());
    }

    #[tokio::test]
    async fn test_create_hook_failure_stops_chain() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut c = config(&log);
        c.pre_create_hooks = counting_hooks(&log, 1, 4);

        let mut d = ResourceData::new();
        let err = create_resource(&context(), &mut d, &c, &resource)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Hook { stage: "pre-create", .. }));
        assert_eq!(
            err.to_string(),
            "error executing pre-create stub hooks: hook 1 failed"
        );
        assert_eq!(entries(&log), vec!["hook:0", "hook:1"]);
    }

    #[tokio::test]
    async fn test_get_type_failure_on_create() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut c = config(&log);
        c.get_type_func = sync_get_type_func(|_d: &ResourceData| -> anyhow::Result<Spec> {
            Err(anyhow::anyhow!("alias is malformed"))
        });

        let mut d = ResourceData::new();
        let err = create_resource(&context(), &mut d, &c, &resource)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "error getting stub type on create: alias is malformed"
        );
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_update_with_empty_id_makes_no_calls() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut d = ResourceData::from_value(&make_state(vec![("alias", "cert1".into())]));

        let err = resource.update(&context(), &mut d).await.unwrap_err();

        assert_eq!(err.to_string(), "empty id for updating stub");
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_update_with_empty_id_stops_after_building_type() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let type_log = log.clone();
        let mut c = config(&log);
        c.get_type_func = sync_get_type_func(move |d: &ResourceData| {
            type_log.lock().push("type".to_string());
            Ok(Spec {
                alias: d.get_string("alias"),
                ..Default::default()
            })
        });
        c.pre_update_hooks = counting_update_hooks(&log, usize::MAX, 2);

        let mut d = ResourceData::from_value(&make_state(vec![("alias", "cert1".into())]));
        let err = update_resource(&context(), &mut d, &c, &resource)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::EmptyId { .. }));
        assert_eq!(entries(&log), vec!["type"]);
    }

    #[tokio::test]
    async fn test_update_hook_failure_stops_chain() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let mut c = config(&log);
        c.pre_update_hooks = counting_update_hooks(&log, 1, 4);

        let mut d = ResourceData::from_value(&make_state(vec![
            ("id", "urn:x".into()),
            ("alias", "renamed".into()),
        ]));
        let err = update_resource(&context(), &mut d, &c, &resource)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Hook { stage: "pre-update", .. }));
        assert_eq!(
            err.to_string(),
            "error executing pre-update stub hooks: hook 1 failed"
        );
        assert_eq!(entries(&log), vec!["get:urn:x", "hook:0", "hook:1"]);
    }

    #[tokio::test]
    async fn test_update_hook_rewrites_request() {
        let log = Log::default();
        let resource = StubResource { log: log.clone() };
        let c = config(&log).pre_update_hook(update_hook(
            |_d: &ResourceData, e: &Entity, spec: &mut Spec| {
                spec.carried = Some(e.alias.clone());
                future::ready(Ok(())).boxed()
            },
        ));

        let mut d = ResourceData::from_value(&make_state(vec![
            ("id", "urn:x".into()),
            ("alias", "renamed".into()),
        ]));
        update_resource(&context(), &mut d, &c, &resource).await.unwrap();

        assert_eq!(
            entries(&log),
            vec!["get:urn:x", "update:renamed:remote", "read", "get:urn:x", "store"]
        );
    }

    #[tokio::test]
    async fn test_read_not_found_clears_id() {
        let log = Log::default();
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:gone".into())]));

        read_resource(&mut d, &config(&log)).await.unwrap();

        assert_eq!(d.id(), "");
        assert!(d.to_value().is_null());
        assert_eq!(entries(&log), vec!["get:urn:gone"]);
    }

    #[tokio::test]
    async fn test_read_propagates_other_errors() {
        let log = Log::default();
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:broken".into())]));

        let err = read_resource(&mut d, &config(&log)).await.unwrap_err();

        assert_eq!(err.to_string(), "error getting stub: API error 500: boom");
        assert_eq!(d.id(), "urn:broken");
    }

    #[tokio::test]
    async fn test_read_hooks_run_before_store() {
        let log = Log::default();
        let hook_log = log.clone();
        let c = config(&log).read_hook(entity_hook(move |_e: &Entity| {
            hook_log.lock().push("sync".to_string());
            future::ready(Ok(())).boxed()
        }));
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:x".into())]));

        read_resource(&mut d, &c).await.unwrap();

        assert_eq!(entries(&log), vec!["get:urn:x", "sync", "store"]);
        assert_eq!(d.get_string("alias"), "remote");
    }

    #[tokio::test]
    async fn test_read_hook_failure_stops_chain_without_store() {
        let log = Log::default();
        let mut c = config(&log);
        c.read_hooks = counting_entity_hooks(&log, 0, 3);
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:x".into())]));

        let err = read_resource(&mut d, &c).await.unwrap_err();

        assert!(matches!(err, ProviderError::Hook { stage: "read", .. }));
        assert_eq!(entries(&log), vec!["get:urn:x", "hook:0"]);
    }

    #[tokio::test]
    async fn test_delete_hook_failure_stops_chain() {
        let log = Log::default();
        let mut c = config(&log);
        c.pre_delete_hooks = counting_entity_hooks(&log, 2, 4);
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:x".into())]));

        let err = delete_resource(&mut d, &c).await.unwrap_err();

        assert!(matches!(err, ProviderError::Hook { stage: "pre-delete", .. }));
        assert_eq!(
            entries(&log),
            vec!["get:urn:x", "hook:0", "hook:1", "hook:2"]
        );
    }

    #[tokio::test]
    async fn test_delete_runs_disable_hook_first() {
        let log = Log::default();
        let hook_log = log.clone();
        let c = config(&log).pre_delete_hook(entity_hook(move |e: &Entity| {
            if e.enabled {
                hook_log.lock().push("disable".to_string());
            }
            future::ready(Ok(())).boxed()
        }));
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:x".into())]));

        delete_resource(&mut d, &c).await.unwrap();

        assert_eq!(entries(&log), vec!["get:urn:x", "disable", "delete"]);
    }

    #[tokio::test]
    async fn test_delete_hook_failure_keeps_entity() {
        let log = Log::default();
        let c = config(&log).pre_delete_hook(entity_hook(|_e: &Entity| {
            future::ready(Err(anyhow::anyhow!("still in use"))).boxed()
        }));
        let mut d = ResourceData::from_value(&make_state(vec![("id", "urn:x".into())]));

        let err = delete_resource(&mut d, &c).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "error executing pre-delete stub hooks: still in use"
        );
        assert!(!entries(&log).contains(&"delete".to_string()));
    }

    fn ds_config(log: &Log) -> DsReadConfig<Entity> {
        DsReadConfig::new(
            "stub",
            fetch_stub(log.clone()),
            state_store_func(|d: &mut ResourceData, e: &Entity| {
                d.set_id(e.id.clone());
                Ok(())
            }),
        )
    }

    #[tokio::test]
    async fn test_datasource_uses_name_by_default() {
        let log = Log::default();
        let mut d = ResourceData::from_value(&make_state(vec![
            ("name", "urn:by-name".into()),
            ("alias", "urn:by-alias".into()),
        ]));

        read_datasource(&mut d, &ds_config(&log)).await.unwrap();

        assert_eq!(d.id(), "urn:by-name");
    }

    #[tokio::test]
    async fn test_datasource_uses_override_field() {
        let log = Log::default();
        let mut d = ResourceData::from_value(&make_state(vec![
            ("name", "urn:by-name".into()),
            ("alias", "urn:by-alias".into()),
        ]));

        read_datasource(&mut d, &ds_config(&log).name_field("alias"))
            .await
            .unwrap();

        assert_eq!(d.id(), "urn:by-alias");
        assert_eq!(entries(&log), vec!["get:urn:by-alias"]);
    }

    #[tokio::test]
    async fn test_datasource_lookup_error_names_field() {
        let log = Log::default();
        let mut d = ResourceData::from_value(&make_state(vec![("alias", "urn:gone".into())]));

        let err = read_datasource(&mut d, &ds_config(&log).name_field("alias"))
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("error getting stub by alias 'urn:gone'"));
    }

    #[tokio::test]
    async fn test_datasource_pre_read_hooks_stop_at_failure() {
        let log = Log::default();
        let mut c = ds_config(&log);
        c.pre_read_hooks = counting_hooks(&log, 0, 3);
        let mut d = ResourceData::new();

        let err = read_datasource(&mut d, &c).await.unwrap_err();

        assert!(matches!(err, ProviderError::Hook { stage: "pre-read", .. }));
        assert_eq!(entries(&log), vec!["hook:0"]);
    }
}
