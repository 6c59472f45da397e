//! Live-tunable parameter store.
//!
//! Parameters are named, range-bounded scalars or boolean toggles shared
//! between the frame loop and whatever edits them (the trackbar panel, a
//! preset being applied). Every bulk write happens under one write lock and
//! every [`ParamStore::snapshot`] under one read lock, so a reader never
//! observes half of a dictionary update.

use crate::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A setting value as stored in presets and exchanged with the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean toggle
    Bool(bool),
    /// Integral number
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Free text (colours and similar display settings)
    Text(String),
}

impl ParamValue {
    /// Numeric view, `None` for booleans and text
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Boolean view, `None` for anything but `Bool`
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view, `None` for anything but `Text`
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Kind of a registered parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Continuous value
    Float,
    /// Value rounded to whole numbers
    Int,
    /// On/off toggle
    Bool,
}

/// Range metadata of a registered parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter kind
    pub kind: ParamKind,
    /// Lower bound (0 for toggles)
    pub min: f64,
    /// Upper bound (1 for toggles)
    pub max: f64,
}

#[derive(Debug, Clone)]
enum Slot {
    Scalar { value: f64, min: f64, max: f64, is_int: bool },
    Toggle(bool),
}

impl Slot {
    fn value(&self) -> ParamValue {
        match self {
            #[allow(clippy::cast_possible_truncation)]
            Self::Scalar { value, is_int: true, .. } => ParamValue::Int(*value as i64),
            Self::Scalar { value, .. } => ParamValue::Float(*value),
            Self::Toggle(on) => ParamValue::Bool(*on),
        }
    }

    /// Write a value, returning the rejected value's type name on mismatch
    ///
    /// `Ok(Some(requested))` means the value was accepted but clamped.
    fn assign(&mut self, new: &ParamValue) -> std::result::Result<Option<f64>, &'static str> {
        match self {
            Self::Scalar { value, min, max, is_int } => {
                let v = new.as_f64().ok_or_else(|| new.type_name())?;
                if v.is_nan() {
                    return Err("NaN");
                }
                let clamped = v.clamp(*min, *max);
                *value = if *is_int { clamped.round() } else { clamped };
                Ok((clamped != v).then_some(v))
            }
            Self::Toggle(on) => {
                *on = new.as_bool().ok_or_else(|| new.type_name())?;
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    slots: BTreeMap<String, Slot>,
}

/// Shared store of named live parameters
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    inner: Arc<RwLock<Inner>>,
}

impl ParamStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, name: &str, slot: Slot) -> Result<()> {
        let mut inner = self.write();
        if inner.slots.contains_key(name) {
            return Err(Error::ParamError(format!(
                "Already created parameter named '{name}', name duplication not allowed"
            )));
        }
        inner.slots.insert(name.to_string(), slot);
        Ok(())
    }

    /// Register a floating point parameter bounded to `[min, max]`
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter with the same name already exists
    pub fn scalar(&self, name: &str, default: f64, min: f64, max: f64) -> Result<ScalarHandle> {
        self.register_scalar(name, default, min, max, false)
    }

    /// Register an integer parameter bounded to `[min, max]`
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter with the same name already exists
    #[allow(clippy::cast_precision_loss)]
    pub fn scalar_int(&self, name: &str, default: i64, min: i64, max: i64) -> Result<ScalarHandle> {
        self.register_scalar(name, default as f64, min as f64, max as f64, true)
    }

    fn register_scalar(&self, name: &str, default: f64, min: f64, max: f64, is_int: bool) -> Result<ScalarHandle> {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let value = if default.is_nan() { min } else { default.clamp(min, max) };
        let value = if is_int { value.round() } else { value };
        self.insert(name, Slot::Scalar { value, min, max, is_int })?;
        Ok(ScalarHandle {
            store: self.clone(),
            name: name.to_string(),
        })
    }

    /// Register a boolean toggle
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter with the same name already exists
    pub fn toggle(&self, name: &str, default: bool) -> Result<ToggleHandle> {
        self.insert(name, Slot::Toggle(default))?;
        Ok(ToggleHandle {
            store: self.clone(),
            name: name.to_string(),
        })
    }

    /// Current value of a parameter, warning when it does not exist
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<ParamValue> {
        let value = self.read().slots.get(name).map(Slot::value);
        if value.is_none() {
            warn!("Parameter named '{name}' not found");
        }
        value
    }

    /// Set one parameter, returning whether the value was accepted
    pub fn set_param(&self, name: &str, value: &ParamValue) -> bool {
        let mut inner = self.write();
        Self::assign_logged(&mut inner, name, value)
    }

    fn assign_logged(inner: &mut Inner, name: &str, value: &ParamValue) -> bool {
        let Some(slot) = inner.slots.get_mut(name) else {
            warn!("Parameter named '{name}' not found, skipped");
            return false;
        };
        match slot.assign(value) {
            Ok(None) => true,
            Ok(Some(requested)) => {
                warn!(
                    "Value {requested} for parameter '{name}' is out of range, clamped to {:?}",
                    slot.value()
                );
                true
            }
            Err(type_name) => {
                warn!("Value of type '{type_name}' is not acceptable for parameter '{name}', skipped");
                false
            }
        }
    }

    /// The value the store would hold after accepting `value` for `name`
    ///
    /// `None` when the name is unknown or the value would be rejected.
    /// The store itself is left unchanged.
    #[must_use]
    pub fn normalized(&self, name: &str, value: &ParamValue) -> Option<ParamValue> {
        let mut slot = self.read().slots.get(name)?.clone();
        slot.assign(value).ok()?;
        Some(slot.value())
    }

    /// All parameters and their current values
    #[must_use]
    pub fn dump_to_dict(&self) -> BTreeMap<String, ParamValue> {
        self.read()
            .slots
            .iter()
            .map(|(name, slot)| (name.clone(), slot.value()))
            .collect()
    }

    /// Apply a dictionary of values in one atomic write
    ///
    /// Unknown names and wrong-typed values are skipped with a warning.
    /// Returns the number of values applied.
    pub fn load_from_dict(&self, values: &BTreeMap<String, ParamValue>) -> usize {
        let mut inner = self.write();
        values
            .iter()
            .filter(|&(name, value)| Self::assign_logged(&mut inner, name, value))
            .count()
    }

    /// Consistent copy of every parameter
    #[must_use]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            values: self.dump_to_dict(),
        }
    }

    /// Registered parameter names in sorted order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().slots.keys().cloned().collect()
    }

    /// Range metadata of a parameter
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<ParamSpec> {
        self.read().slots.get(name).map(|slot| match slot {
            Slot::Scalar { min, max, is_int, .. } => ParamSpec {
                kind: if *is_int { ParamKind::Int } else { ParamKind::Float },
                min: *min,
                max: *max,
            },
            Slot::Toggle(_) => ParamSpec {
                kind: ParamKind::Bool,
                min: 0.0,
                max: 1.0,
            },
        })
    }
}

/// Point-in-time copy of the store taken under a single lock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSnapshot {
    values: BTreeMap<String, ParamValue>,
}

impl ParamSnapshot {
    /// Numeric value of a parameter
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ParamValue::as_f64)
    }

    /// Numeric value or a fallback when missing
    #[must_use]
    pub fn f64_or(&self, name: &str, fallback: f64) -> f64 {
        self.get_f64(name).unwrap_or(fallback)
    }
}

/// Handle to a registered scalar parameter
#[derive(Debug, Clone)]
pub struct ScalarHandle {
    store: ParamStore,
    name: String,
}

impl ScalarHandle {
    /// Parameter name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> f64 {
        self.store
            .read()
            .slots
            .get(&self.name)
            .and_then(|slot| slot.value().as_f64())
            .unwrap_or_default()
    }

    /// Set the value, clamped to the registered range
    pub fn set(&self, value: f64) {
        self.store.set_param(&self.name, &ParamValue::Float(value));
    }
}

/// Handle to a registered toggle
#[derive(Debug, Clone)]
pub struct ToggleHandle {
    store: ParamStore,
    name: String,
}

impl ToggleHandle {
    /// Parameter name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    #[must_use]
    pub fn get(&self) -> bool {
        self.store
            .read()
            .slots
            .get(&self.name)
            .and_then(|slot| slot.value().as_bool())
            .unwrap_or_default()
    }

    /// Switch the toggle
    pub fn set(&self, on: bool) {
        self.store.set_param(&self.name, &ParamValue::Bool(on));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_clamps_to_range() {
        let store = ParamStore::new();
        let h = store.scalar("gain", 0.5, 0.0, 1.0).unwrap();
        h.set(3.0);
        assert_eq!(h.get(), 1.0);
        h.set(-3.0);
        assert_eq!(h.get(), 0.0);
    }

    #[test]
    fn test_clamped_write_is_still_accepted() {
        let store = ParamStore::new();
        store.scalar("gain", 0.5, 0.0, 1.0).unwrap();
        assert!(store.set_param("gain", &ParamValue::Float(4.0)));
        assert_eq!(store.get_param("gain"), Some(ParamValue::Float(1.0)));
    }

    #[test]
    fn test_normalized_leaves_store_untouched() {
        let store = ParamStore::new();
        store.scalar("gain", 0.5, 0.0, 1.0).unwrap();
        store.scalar_int("radius", 5, -1, 50).unwrap();
        assert_eq!(store.normalized("gain", &ParamValue::Float(2.0)), Some(ParamValue::Float(1.0)));
        assert_eq!(store.normalized("radius", &ParamValue::Float(7.4)), Some(ParamValue::Int(7)));
        assert_eq!(store.normalized("gain", &ParamValue::Bool(true)), None);
        assert_eq!(store.normalized("missing", &ParamValue::Float(1.0)), None);
        assert_eq!(store.get_param("gain"), Some(ParamValue::Float(0.5)));
    }

    #[test]
    fn test_scalar_int_rounds() {
        let store = ParamStore::new();
        let h = store.scalar_int("radius", 5, -1, 50).unwrap();
        h.set(7.6);
        assert_eq!(h.get(), 8.0);
        assert_eq!(store.get_param("radius"), Some(ParamValue::Int(8)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let store = ParamStore::new();
        store.scalar("a", 0.0, 0.0, 1.0).unwrap();
        assert!(store.toggle("a", true).is_err());
    }

    #[test]
    fn test_nan_is_ignored() {
        let store = ParamStore::new();
        let h = store.scalar("a", 0.25, 0.0, 1.0).unwrap();
        h.set(f64::NAN);
        assert_eq!(h.get(), 0.25);
    }

    #[test]
    fn test_swapped_range_normalised() {
        let store = ParamStore::new();
        store.scalar("a", 5.0, 10.0, 0.0).unwrap();
        let spec = store.spec("a").unwrap();
        assert_eq!((spec.min, spec.max), (0.0, 10.0));
    }
}
