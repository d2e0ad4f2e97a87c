//! Value converters applied between a column read and a property write.
//!
//! Converters are identified by their Rust type. A [`ConverterRegistry`]
//! creates each one lazily from its `Default` impl the first time a property
//! asks for it and keeps the instance for the life of the registry.

use std::any::{type_name, TypeId};
use std::error::Error as StdError;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::error::{Result, RowForgeError};
use crate::types::Value;

pub type ConversionResult = std::result::Result<Value, Box<dyn StdError + Send + Sync>>;

/// Converts a column value into the representation a property expects.
pub trait Converter: Send + Sync + 'static {
    fn convert(&self, value: Value) -> ConversionResult;
}

static GLOBAL: Lazy<Arc<ConverterRegistry>> = Lazy::new(|| Arc::new(ConverterRegistry::new()));

/// Thread-safe, append-only map from converter type to instance.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: DashMap<TypeId, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by mappers that were not given one.
    pub fn global() -> Arc<ConverterRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Registers `converter`, replacing an earlier instance of the same type.
    pub fn register<C: Converter>(&self, converter: C) {
        self.converters
            .insert(TypeId::of::<C>(), Arc::new(converter) as Arc<dyn Converter>);
    }

    /// Returns the instance for `C`, creating it on first use.
    pub fn get_or_create<C: Converter + Default>(&self) -> Arc<dyn Converter> {
        let entry = self
            .converters
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Arc::new(C::default()) as Arc<dyn Converter>);
        Arc::clone(entry.value())
    }

    pub fn contains<C: Converter>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// Type-erased reference to a converter, resolved through a registry.
#[derive(Clone, Copy)]
pub(crate) struct ConverterRef {
    name: &'static str,
    resolve: fn(&ConverterRegistry) -> Arc<dyn Converter>,
}

impl ConverterRef {
    pub(crate) fn of<C: Converter + Default>() -> Self {
        Self {
            name: type_name::<C>(),
            resolve: ConverterRegistry::get_or_create::<C>,
        }
    }

    pub(crate) fn apply(&self, registry: &ConverterRegistry, value: Value) -> Result<Value> {
        (self.resolve)(registry)
            .convert(value)
            .map_err(|e| RowForgeError::Conversion {
                converter: self.name.to_string(),
                message: e.to_string(),
            })
    }
}

impl std::fmt::Debug for ConverterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Parses textual UUID columns. NULL passes through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringToUuid;

impl Converter for StringToUuid {
    fn convert(&self, value: Value) -> ConversionResult {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Uuid(u) => Ok(Value::Uuid(u)),
            Value::String(s) => Ok(Value::Uuid(Uuid::parse_str(s.trim())?)),
            Value::Bytes(b) => Ok(Value::Uuid(Uuid::from_slice(&b)?)),
            other => Err(format!("cannot convert {} to a UUID", other.type_name()).into()),
        }
    }
}
