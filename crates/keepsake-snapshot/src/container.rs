use std::collections::HashMap;
use std::fmt;

use keepsake_state::{CollectionType, CollectionValue, MapType, MapValue};

use crate::error::{ContainerError, ContainerResult};

/// Element semantics of a collection type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    /// Ordered, duplicates allowed.
    List,
    /// Duplicates rejected.
    Set,
}

/// Creates the empty containers that snapshot replacements are built into.
///
/// Built-in types are always available. Application types must be
/// registered by name first; creating an unregistered one fails.
#[derive(Clone, Default)]
pub struct ContainerFactory {
    collections: HashMap<String, ContainerShape>,
    maps: Vec<String>,
}

impl ContainerFactory {
    /// Create a factory that knows only the built-in container types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application collection type.
    pub fn register_collection(&mut self, name: impl Into<String>, shape: ContainerShape) {
        self.collections.insert(name.into(), shape);
    }

    /// Register an application map type.
    pub fn register_map(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.maps.contains(&name) {
            self.maps.push(name);
        }
    }

    /// Shape of a collection type. Abstract types take their shape from the
    /// declared field: a declared list is a list, anything else a set.
    pub fn shape(&self, ty: &CollectionType, declared_list: bool) -> ContainerResult<ContainerShape> {
        match ty {
            CollectionType::Abstract if declared_list => Ok(ContainerShape::List),
            CollectionType::Abstract => Ok(ContainerShape::Set),
            CollectionType::Vec | CollectionType::VecDeque => Ok(ContainerShape::List),
            CollectionType::HashSet | CollectionType::BTreeSet => Ok(ContainerShape::Set),
            CollectionType::Named(name) => self
                .collections
                .get(name)
                .copied()
                .ok_or_else(|| ContainerError::UnknownCollectionType(name.clone())),
        }
    }

    /// Empty collection of the same type as `ty`.
    ///
    /// Abstract types are created as `Vec` when declared as a list and as
    /// `HashSet` otherwise.
    pub fn new_collection<V: PartialEq>(
        &self,
        ty: &CollectionType,
        declared_list: bool,
    ) -> ContainerResult<CollectionValue<V>> {
        let concrete = match ty {
            CollectionType::Abstract if declared_list => CollectionType::Vec,
            CollectionType::Abstract => CollectionType::HashSet,
            CollectionType::Named(name) if !self.collections.contains_key(name) => {
                return Err(ContainerError::UnknownCollectionType(name.clone()));
            }
            other => other.clone(),
        };
        Ok(CollectionValue::new(concrete))
    }

    /// Empty map of the same type as `ty`; abstract maps become `HashMap`.
    pub fn new_map<K: PartialEq, V>(&self, ty: &MapType) -> ContainerResult<MapValue<K, V>> {
        let concrete = match ty {
            MapType::Abstract => MapType::HashMap,
            MapType::Named(name) if !self.maps.contains(name) => {
                return Err(ContainerError::UnknownMapType(name.clone()));
            }
            other => other.clone(),
        };
        Ok(MapValue::new(concrete))
    }
}

impl fmt::Debug for ContainerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut collections: Vec<_> = self.collections.keys().collect();
        collections.sort();
        f.debug_struct("ContainerFactory")
            .field("collections", &collections)
            .field("maps", &self.maps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_state::FieldValue;

    #[test]
    fn abstract_types_get_defaults() {
        let factory = ContainerFactory::new();
        let list: CollectionValue = factory.new_collection(&CollectionType::Abstract, true).unwrap();
        assert_eq!(list.ty(), &CollectionType::Vec);
        let set: CollectionValue = factory.new_collection(&CollectionType::Abstract, false).unwrap();
        assert_eq!(set.ty(), &CollectionType::HashSet);
        let map: MapValue = factory.new_map(&MapType::Abstract).unwrap();
        assert_eq!(map.ty(), &MapType::HashMap);
    }

    #[test]
    fn concrete_types_are_preserved() {
        let factory = ContainerFactory::new();
        let deque: CollectionValue = factory.new_collection(&CollectionType::VecDeque, false).unwrap();
        assert_eq!(deque.ty(), &CollectionType::VecDeque);
        let map: MapValue = factory.new_map(&MapType::BTreeMap).unwrap();
        assert_eq!(map.ty(), &MapType::BTreeMap);
    }

    #[test]
    fn named_types_must_be_registered() {
        let mut factory = ContainerFactory::new();
        let ty = CollectionType::Named("acme.Bag".into());
        assert_eq!(
            factory.new_collection::<FieldValue>(&ty, false).unwrap_err(),
            ContainerError::UnknownCollectionType("acme.Bag".into())
        );
        assert!(factory.shape(&ty, false).is_err());

        factory.register_collection("acme.Bag", ContainerShape::List);
        assert_eq!(factory.shape(&ty, false).unwrap(), ContainerShape::List);
        let bag: CollectionValue = factory.new_collection(&ty, false).unwrap();
        assert_eq!(bag.ty(), &ty);

        let map_ty = MapType::Named("acme.Ledger".into());
        assert!(factory.new_map::<FieldValue, FieldValue>(&map_ty).is_err());
        factory.register_map("acme.Ledger");
        assert!(factory.new_map::<FieldValue, FieldValue>(&map_ty).is_ok());
    }
}
