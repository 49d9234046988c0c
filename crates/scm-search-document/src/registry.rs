//! Process-wide schema cache.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

use crate::{DocumentError, Indexable, TypedSchema};

/// Derived schemas keyed by source type.
static SCHEMAS: LazyLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Returns the schema of `T`, deriving it on first use.
///
/// Successful derivations are cached for the lifetime of the process, so every caller sees
/// the same `Arc`. Failed derivations are not cached and fail again on the next call.
pub fn derive_schema<T: Indexable>() -> Result<Arc<TypedSchema<T>>, DocumentError> {
    let key = TypeId::of::<T>();
    if let Some(schema) = cached::<T>(key) {
        return Ok(schema);
    }

    let derived = Arc::new(TypedSchema::<T>::derive()?);
    let mut schemas = SCHEMAS.write();
    let entry = schemas
        .entry(key)
        .or_insert_with(|| Arc::clone(&derived) as Arc<dyn Any + Send + Sync>);
    Ok(Arc::clone(entry).downcast::<TypedSchema<T>>().unwrap_or(derived))
}

/// Looks up an already derived schema.
fn cached<T: Indexable>(key: TypeId) -> Option<Arc<TypedSchema<T>>> {
    let schemas = SCHEMAS.read();
    let schema = schemas.get(&key)?;
    Arc::clone(schema).downcast::<TypedSchema<T>>().ok()
}
