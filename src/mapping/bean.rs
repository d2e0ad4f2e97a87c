//! Mapping rows onto plain structs by column label.
//!
//! A [`Bean`] describes its writable properties once, in
//! [`Bean::describe`]. [`BeanRowMapper`] matches each column label of a row
//! against those properties (case-insensitively), fetches the column in the
//! shape the property declares and writes it through the property's setter.
//! Columns without a matching property are ignored, as are properties without
//! a matching column.

use std::any::type_name;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, RowForgeError};
use crate::mapping::converter::{Converter, ConverterRef, ConverterRegistry};
use crate::mapping::RowMapper;
use crate::types::{ColumnMeta, Row, SqlField, SqlKind, Value};

/// A struct that rows can be mapped onto.
pub trait Bean: Default + Send + 'static {
    /// Registers every property the mapper may write.
    fn describe(properties: &mut PropertyTable<Self>);

    /// Creates the empty instance each row is written into.
    fn instantiate() -> std::result::Result<Self, String> {
        Ok(Self::default())
    }
}

type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// One writable property of a bean.
pub struct Property<T> {
    name: String,
    column: Option<String>,
    kind: SqlKind,
    zero: Option<Value>,
    field_type: &'static str,
    converter: Option<ConverterRef>,
    skipped: bool,
    setter: Setter<T>,
}

impl<T> Property<T> {
    /// Maps this property from `column` instead of its own name.
    pub fn column(&mut self, column: impl Into<String>) -> &mut Self {
        self.column = Some(column.into());
        self
    }

    /// Passes the raw column value through converter `C` before writing it.
    pub fn map_with<C: Converter + Default>(&mut self) -> &mut Self {
        self.converter = Some(ConverterRef::of::<C>());
        self
    }

    /// Excludes this property from mapping.
    pub fn skip(&mut self) -> &mut Self {
        self.skipped = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The column label this property is matched against.
    pub fn effective_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn is_primitive(&self) -> bool {
        self.zero.is_some()
    }

    fn fetch_kind(&self) -> SqlKind {
        if self.converter.is_some() {
            SqlKind::Any
        } else {
            self.kind
        }
    }

    fn matches(&self, label: &str) -> bool {
        !self.skipped && self.effective_name().eq_ignore_ascii_case(label)
    }
}

impl<T> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .field("field_type", &self.field_type)
            .field("converter", &self.converter)
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// The properties of a bean, in declaration order.
pub struct PropertyTable<T> {
    properties: Vec<Property<T>>,
}

impl<T: 'static> PropertyTable<T> {
    fn new() -> Self {
        Self {
            properties: Vec::new(),
        }
    }

    /// Declares a property written by an infallible setter.
    pub fn property<F, S>(&mut self, name: &str, setter: S) -> &mut Property<T>
    where
        F: SqlField,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.push::<F>(
            name,
            Box::new(move |bean, value| {
                setter(bean, F::from_value(value)?);
                Ok(())
            }),
        )
    }

    /// Declares a property whose setter may reject the value.
    ///
    /// A rejection surfaces as [`RowForgeError::Internal`].
    pub fn try_property<F, E, S>(&mut self, name: &str, setter: S) -> &mut Property<T>
    where
        F: SqlField,
        E: Display,
        S: Fn(&mut T, F) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        let property = name.to_string();
        self.push::<F>(
            name,
            Box::new(move |bean, value| {
                setter(bean, F::from_value(value)?).map_err(|e| {
                    RowForgeError::Internal(format!("setter for '{}' failed: {}", property, e))
                })
            }),
        )
    }

    fn push<F: SqlField>(&mut self, name: &str, setter: Setter<T>) -> &mut Property<T> {
        self.properties.push(Property {
            name: name.to_string(),
            column: None,
            kind: F::KIND,
            zero: F::zero_value(),
            field_type: type_name::<F>(),
            converter: None,
            skipped: false,
            setter,
        });
        let last = self.properties.len() - 1;
        &mut self.properties[last]
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property<T>> {
        self.properties.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Property<T>> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Index of the first non-skipped property matching `label`.
    fn resolve(&self, label: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.matches(label))
    }
}

/// Column positions resolved against one result shape.
#[derive(Debug)]
struct ColumnBindings {
    labels: Vec<String>,
    targets: Vec<Option<usize>>,
}

impl ColumnBindings {
    fn fits(&self, columns: &[ColumnMeta]) -> bool {
        self.labels.len() == columns.len()
            && self
                .labels
                .iter()
                .zip(columns)
                .all(|(label, column)| label == column.effective_label())
    }
}

/// Maps each row onto a fresh `T`, matching column labels to properties.
///
/// Safe to share between threads; the label resolution of the last result
/// shape seen is cached.
pub struct BeanRowMapper<T> {
    properties: PropertyTable<T>,
    default_null_for_primitives: bool,
    registry: Arc<ConverterRegistry>,
    bindings: Mutex<Option<Arc<ColumnBindings>>>,
}

impl<T: Bean> BeanRowMapper<T> {
    pub fn new() -> Self {
        let mut properties = PropertyTable::new();
        T::describe(&mut properties);
        Self {
            properties,
            default_null_for_primitives: true,
            registry: ConverterRegistry::global(),
            bindings: Mutex::new(None),
        }
    }

    /// When enabled (the default), a NULL column leaves a primitive property
    /// at its zero value instead of failing with a type mismatch.
    pub fn default_null_for_primitives(mut self, enabled: bool) -> Self {
        self.default_null_for_primitives = enabled;
        self
    }

    pub fn is_default_null_for_primitives(&self) -> bool {
        self.default_null_for_primitives
    }

    /// Resolves converters through `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<ConverterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a preconfigured converter instance with this mapper's registry.
    pub fn add_converter<C: Converter>(self, converter: C) -> Self {
        self.registry.register(converter);
        self
    }

    pub fn properties(&self) -> &PropertyTable<T> {
        &self.properties
    }

    fn bindings_for(&self, columns: &[ColumnMeta]) -> Arc<ColumnBindings> {
        let mut cached = self.bindings.lock();
        if let Some(bindings) = cached.as_ref() {
            if bindings.fits(columns) {
                return Arc::clone(bindings);
            }
        }

        let labels: Vec<String> = columns
            .iter()
            .map(|c| c.effective_label().to_string())
            .collect();
        let targets: Vec<Option<usize>> =
            labels.iter().map(|l| self.properties.resolve(l)).collect();

        let unmatched: Vec<&str> = labels
            .iter()
            .zip(&targets)
            .filter(|(_, t)| t.is_none())
            .map(|(l, _)| l.as_str())
            .collect();
        if !unmatched.is_empty() {
            debug!(
                bean = type_name::<T>(),
                columns = ?unmatched,
                "Columns without a matching property are ignored"
            );
        }

        let bindings = Arc::new(ColumnBindings { labels, targets });
        *cached = Some(Arc::clone(&bindings));
        bindings
    }

    fn map(&self, row: &Row<'_>) -> Result<T> {
        let mut bean = T::instantiate().map_err(|message| RowForgeError::Instantiation {
            target: type_name::<T>().to_string(),
            message,
        })?;

        let bindings = self.bindings_for(row.columns());
        for (position, target) in bindings.targets.iter().enumerate() {
            let Some(target) = *target else {
                continue;
            };
            let property = &self.properties.properties[target];
            let index = position + 1;

            let mut value = row.get_as(index, property.fetch_kind())?;
            if value.is_null() {
                if let Some(zero) = &property.zero {
                    if !self.default_null_for_primitives {
                        return Err(RowForgeError::TypeMismatch(format!(
                            "cannot write NULL column '{}' into primitive property '{}' of type {}",
                            bindings.labels[position], property.name, property.field_type
                        )));
                    }
                    value = zero.clone();
                }
            }
            if let Some(converter) = &property.converter {
                value = converter.apply(&self.registry, value)?;
            }
            (property.setter)(&mut bean, value)?;
        }
        Ok(bean)
    }
}

impl<T: Bean> Default for BeanRowMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Bean> RowMapper<T> for BeanRowMapper<T> {
    fn map_row(&self, row: &Row<'_>, _row_number: usize) -> Result<T> {
        self.map(row)
    }
}

impl<T> std::fmt::Debug for BeanRowMapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanRowMapper")
            .field("bean", &type_name::<T>())
            .field("properties", &self.properties.properties)
            .field(
                "default_null_for_primitives",
                &self.default_null_for_primitives,
            )
            .finish()
    }
}
