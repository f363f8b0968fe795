use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use keepsake_state::{CollectionValue, FieldValue, InstanceRef, ManagedInstance, MapValue, Shared};
use keepsake_types::{
    ClassDescriptor, ElementTraits, FieldBitSet, FieldDescriptor, IdentityPlaceholder, Relation,
    Version,
};
use tracing::{debug, warn};

use crate::adapter::{IdentityAdapter, LazyWrapperAdapter, StandardAdapter};
use crate::config::SnapshotConfig;
use crate::container::{ContainerFactory, ContainerShape};
use crate::snapshot::{CachedValue, Snapshot};

/// What the builder needs to know about one field, derived once per class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FieldPlan {
    /// Transactional or not cacheable: never snapshotted.
    excluded: bool,
    /// The field itself is stored embedded or serialized.
    inline: bool,
    relation: Relation,
}

impl FieldPlan {
    fn from_descriptor(field: &FieldDescriptor) -> Self {
        Self {
            excluded: field.is_transactional() || !field.is_cacheable(),
            inline: field.is_embedded() || field.is_serialized(),
            relation: *field.relation(),
        }
    }
}

type ClassPlan = Arc<[FieldPlan]>;

/// Why a field was left out of a snapshot.
#[derive(Clone, Copy, Debug)]
enum Omit {
    Excluded,
    NotLoaded,
    UnloadedWrapper,
    NoIdentity,
    Locked,
    Cycle,
    EmbeddedDisabled,
    UnorderedList,
    InlineElements,
    UnsupportedMap,
    ContainsReference,
    Unrepresentable,
    /// Container construction failed; already logged as a warning.
    Construction,
}

impl Omit {
    fn reason(self) -> &'static str {
        match self {
            Self::Excluded => "transactional or not cacheable",
            Self::NotLoaded => "not loaded",
            Self::UnloadedWrapper => "lazy wrapper not loaded",
            Self::NoIdentity => "referenced object has no identity",
            Self::Locked => "referenced object is locked",
            Self::Cycle => "embedding cycle",
            Self::EmbeddedDisabled => "embedded caching disabled",
            Self::UnorderedList => "list without explicit ordering",
            Self::InlineElements => "elements stored embedded or serialized",
            Self::UnsupportedMap => "map storage not representable",
            Self::ContainsReference => "plain value holds a persistable reference",
            Self::Unrepresentable => "value not representable",
            Self::Construction => "container construction failed",
        }
    }
}

type Outcome = Result<CachedValue, Omit>;

/// Builds [`Snapshot`]s of managed instances.
///
/// The builder caches one field plan per class and is safe to share between
/// threads. It only takes non-blocking read locks on referenced instances and
/// containers; anything it cannot read immediately is left out.
pub struct SnapshotBuilder {
    config: SnapshotConfig,
    identities: Arc<dyn IdentityAdapter>,
    wrappers: Arc<dyn LazyWrapperAdapter>,
    containers: ContainerFactory,
    plans: RwLock<HashMap<String, (Arc<ClassDescriptor>, ClassPlan)>>,
}

impl SnapshotBuilder {
    /// Create a builder with the standard adapters and `config`.
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            identities: Arc::new(StandardAdapter),
            wrappers: Arc::new(StandardAdapter),
            containers: ContainerFactory::new(),
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the identity adapter.
    #[must_use]
    pub fn with_identity_adapter(mut self, adapter: Arc<dyn IdentityAdapter>) -> Self {
        self.identities = adapter;
        self
    }

    /// Replace the lazy-wrapper adapter.
    #[must_use]
    pub fn with_wrapper_adapter(mut self, adapter: Arc<dyn LazyWrapperAdapter>) -> Self {
        self.wrappers = adapter;
        self
    }

    /// Replace the container factory.
    #[must_use]
    pub fn with_containers(mut self, containers: ContainerFactory) -> Self {
        self.containers = containers;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Container factory used for replacement containers.
    pub fn containers(&self) -> &ContainerFactory {
        &self.containers
    }

    /// Number of classes with a cached field plan.
    pub fn cached_plans(&self) -> usize {
        self.plans.read().expect("lock poisoned").len()
    }

    /// Snapshot the loaded fields of `instance`.
    pub fn build(&self, instance: &ManagedInstance) -> Snapshot {
        let mut path = Vec::new();
        let snapshot = self.snapshot_fields(instance, instance.version(), &mut path);
        debug!(
            class = instance.class().name(),
            loaded = snapshot.loaded().count_ones(),
            fields = snapshot.field_count(),
            "built snapshot"
        );
        snapshot
    }

    fn plan(&self, class: &Arc<ClassDescriptor>) -> ClassPlan {
        if let Some((cached, plan)) = self
            .plans
            .read()
            .expect("lock poisoned")
            .get(class.name())
        {
            if Arc::ptr_eq(cached, class) || **cached == **class {
                return Arc::clone(plan);
            }
        }
        let plan: ClassPlan = class.fields().iter().map(FieldPlan::from_descriptor).collect();
        self.plans
            .write()
            .expect("lock poisoned")
            .insert(class.name().to_owned(), (Arc::clone(class), Arc::clone(&plan)));
        plan
    }

    fn snapshot_fields(
        &self,
        instance: &ManagedInstance,
        version: Option<Version>,
        path: &mut Vec<usize>,
    ) -> Snapshot {
        let class = instance.class();
        let plan = self.plan(class);
        let live_loaded = instance.loaded_fields();
        path.push(instance_addr(instance));

        let count = class.field_count();
        let mut values = Vec::with_capacity(count);
        let mut loaded = FieldBitSet::new(count);
        for (index, field_plan) in plan.iter().enumerate() {
            let outcome = if field_plan.excluded {
                Err(Omit::Excluded)
            } else if !live_loaded.contains(index) {
                Err(Omit::NotLoaded)
            } else {
                match instance.field(index) {
                    Some(value) => self.convert_field(field_plan, value, path),
                    None => Err(Omit::NotLoaded),
                }
            };
            match outcome {
                Ok(value) => {
                    loaded.insert(index);
                    values.push(value);
                }
                Err(omit) => {
                    if !matches!(omit, Omit::Excluded | Omit::NotLoaded | Omit::Construction) {
                        debug!(
                            class = class.name(),
                            field = class.field(index).map(|f| f.name()).unwrap_or_default(),
                            reason = omit.reason(),
                            "field left out of snapshot"
                        );
                    }
                    values.push(CachedValue::Null);
                }
            }
        }

        path.pop();
        Snapshot::new(Arc::clone(class), values, loaded, version)
    }

    fn convert_field(&self, plan: &FieldPlan, value: &FieldValue, path: &mut Vec<usize>) -> Outcome {
        if self.wrappers.is_wrapper(value) && !self.wrappers.is_loaded(value) {
            return Err(Omit::UnloadedWrapper);
        }
        let value = self.wrappers.unwrap(value);

        match value {
            FieldValue::Null => Ok(CachedValue::Null),
            FieldValue::Ref(target) => {
                if plan.inline {
                    self.nested(target, path)
                } else {
                    self.placeholder(target).map(CachedValue::Identity)
                }
            }
            FieldValue::Collection(handle) => match plan.relation {
                Relation::Collection {
                    list,
                    ordered,
                    element,
                } if element.persistent => {
                    self.persistable_collection(plan, handle, list, ordered, element)
                }
                _ => {
                    self.ensure_plain(value)?;
                    Ok(CachedValue::SharedCollection(handle.clone()))
                }
            },
            FieldValue::Map(handle) => match plan.relation {
                Relation::Map { key, value: val } if key.persistent || val.persistent => {
                    self.persistable_map(plan, handle, key, val)
                }
                _ => {
                    self.ensure_plain(value)?;
                    Ok(CachedValue::SharedMap(handle.clone()))
                }
            },
            FieldValue::Array(handle) => match plan.relation {
                Relation::Array { element } if element.persistent => {
                    if plan.inline || element.embedded || element.serialized {
                        return Err(Omit::InlineElements);
                    }
                    let elements = handle.try_read().ok_or(Omit::Locked)?;
                    elements
                        .iter()
                        .map(|e| self.persistable_element(e))
                        .collect::<Result<Vec<_>, _>>()
                        .map(CachedValue::Array)
                }
                _ => {
                    self.ensure_plain(value)?;
                    if self.config.copy_value_arrays {
                        let copy = handle.try_read().ok_or(Omit::Locked)?.clone();
                        Ok(CachedValue::SharedArray(Shared::new(copy)))
                    } else {
                        Ok(CachedValue::SharedArray(handle.clone()))
                    }
                }
            },
            other => plain_scalar(other),
        }
    }

    fn nested(&self, target: &InstanceRef, path: &mut Vec<usize>) -> Outcome {
        if !self.config.cache_embedded {
            return Err(Omit::EmbeddedDisabled);
        }
        let guard = target.try_read().ok_or(Omit::Locked)?;
        if self.config.detect_embedding_cycles && path.contains(&instance_addr(&guard)) {
            return Err(Omit::Cycle);
        }
        let nested = self.snapshot_fields(&guard, None, path);
        Ok(CachedValue::Nested(Arc::new(nested)))
    }

    fn placeholder(&self, target: &InstanceRef) -> Result<IdentityPlaceholder, Omit> {
        let guard = target.try_read().ok_or(Omit::Locked)?;
        let identity = self.identities.get_identity(&guard).ok_or(Omit::NoIdentity)?;
        Ok(self.identities.placeholder(target.class().name(), identity))
    }

    /// Element of a container of persistable objects.
    fn persistable_element(&self, element: &FieldValue) -> Outcome {
        match element {
            FieldValue::Null => Ok(CachedValue::Null),
            FieldValue::Ref(target) => self.placeholder(target).map(CachedValue::Identity),
            other => plain_scalar(other),
        }
    }

    fn persistable_collection(
        &self,
        plan: &FieldPlan,
        handle: &Shared<CollectionValue>,
        declared_list: bool,
        ordered: bool,
        element: ElementTraits,
    ) -> Outcome {
        let live = handle.try_read().ok_or(Omit::Locked)?;
        let shape = match self.containers.shape(live.ty(), declared_list) {
            Ok(shape) => shape,
            Err(err) => return Err(self.construction_failed(&err.to_string(), live.ty().type_name())),
        };
        if (declared_list || shape == ContainerShape::List) && !ordered {
            return Err(Omit::UnorderedList);
        }
        if plan.inline || element.embedded || element.serialized {
            return Err(Omit::InlineElements);
        }

        let mut replacement: CollectionValue<CachedValue> =
            match self.containers.new_collection(live.ty(), declared_list) {
                Ok(replacement) => replacement,
                Err(err) => {
                    return Err(self.construction_failed(&err.to_string(), live.ty().type_name()))
                }
            };
        for item in live.iter() {
            let cached = self.persistable_element(item)?;
            // Built-in set types dedupe on insert; registered ones need a scan.
            let named_set = shape == ContainerShape::Set && !replacement.ty().is_set_like();
            if named_set && replacement.elements().contains(&cached) {
                continue;
            }
            replacement.insert(cached);
        }
        Ok(CachedValue::Collection(replacement))
    }

    fn persistable_map(
        &self,
        plan: &FieldPlan,
        handle: &Shared<MapValue>,
        key: ElementTraits,
        value: ElementTraits,
    ) -> Outcome {
        if plan.inline
            || key.serialized
            || value.serialized
            || (key.persistent && key.embedded)
            || (value.persistent && value.embedded)
        {
            return Err(Omit::UnsupportedMap);
        }
        let live = handle.try_read().ok_or(Omit::Locked)?;
        let mut replacement: MapValue<CachedValue, CachedValue> =
            match self.containers.new_map(live.ty()) {
                Ok(replacement) => replacement,
                Err(err) => {
                    return Err(self.construction_failed(&err.to_string(), live.ty().type_name()))
                }
            };
        for (k, v) in live.entries() {
            let cached_key = self.map_side(k, key)?;
            let cached_value = self.map_side(v, value)?;
            replacement.insert(cached_key, cached_value);
        }
        Ok(CachedValue::Map(replacement))
    }

    fn map_side(&self, side: &FieldValue, traits: ElementTraits) -> Outcome {
        if traits.persistent {
            self.persistable_element(side)
        } else {
            plain_scalar(side)
        }
    }

    /// Reject plain values that still carry a persistable reference.
    fn ensure_plain(&self, value: &FieldValue) -> Result<(), Omit> {
        match self.holds_reference(value) {
            Some(false) => Ok(()),
            Some(true) => Err(Omit::ContainsReference),
            None => Err(Omit::Locked),
        }
    }

    /// `None` if some nested container could not be read without blocking.
    fn holds_reference(&self, value: &FieldValue) -> Option<bool> {
        if self.identities.is_persistable(value) {
            return Some(true);
        }
        match value {
            FieldValue::Collection(handle) => self.any_reference(handle.try_read()?.iter()),
            FieldValue::Array(handle) => self.any_reference(handle.try_read()?.iter()),
            FieldValue::Map(handle) => {
                let map = handle.try_read()?;
                self.any_reference(map.entries().iter().flat_map(|(k, v)| [k, v]))
            }
            FieldValue::Tracked(tracked) => self.holds_reference(tracked.backing()),
            _ => Some(false),
        }
    }

    fn any_reference<'a>(&self, values: impl Iterator<Item = &'a FieldValue>) -> Option<bool> {
        for value in values {
            if self.holds_reference(value)? {
                return Some(true);
            }
        }
        Some(false)
    }

    fn construction_failed(&self, error: &str, type_name: &str) -> Omit {
        warn!(container = type_name, error, "unable to create container for snapshot");
        Omit::Construction
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new(SnapshotConfig::default())
    }
}

impl fmt::Debug for SnapshotBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("config", &self.config)
            .field("containers", &self.containers)
            .field("cached_plans", &self.cached_plans())
            .finish()
    }
}

fn instance_addr(instance: &ManagedInstance) -> usize {
    instance as *const ManagedInstance as usize
}

/// Copy of a value that carries no container or reference.
fn plain_scalar(value: &FieldValue) -> Outcome {
    Ok(match value {
        FieldValue::Null => CachedValue::Null,
        FieldValue::Bool(v) => CachedValue::Bool(*v),
        FieldValue::Char(v) => CachedValue::Char(*v),
        FieldValue::Byte(v) => CachedValue::Byte(*v),
        FieldValue::Short(v) => CachedValue::Short(*v),
        FieldValue::Int(v) => CachedValue::Int(*v),
        FieldValue::Long(v) => CachedValue::Long(*v),
        FieldValue::Float(v) => CachedValue::Float(*v),
        FieldValue::Double(v) => CachedValue::Double(*v),
        FieldValue::Str(v) => CachedValue::Str(v.clone()),
        FieldValue::Date(cell) => CachedValue::Date(*cell.try_read().ok_or(Omit::Locked)?),
        FieldValue::TextBuffer(cell) => {
            CachedValue::Text(cell.try_read().ok_or(Omit::Locked)?.clone())
        }
        FieldValue::Opaque(opaque) => CachedValue::Opaque(opaque.clone()),
        FieldValue::Ref(_)
        | FieldValue::Collection(_)
        | FieldValue::Map(_)
        | FieldValue::Array(_)
        | FieldValue::Tracked(_) => return Err(Omit::Unrepresentable),
    })
}
