//! Sparse attribute value storage.

use crate::attribute::{AttrType, AttrValue, Attribute, AttributeRegistry};
use crate::CssResult;

/// A sparse set of attribute values indexed by ordinal.
///
/// The value array is allocated on the first write and sized to the
/// registry. Used for the raw values of a style node and for the declaration
/// block of a stylesheet rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    values: Option<Box<[Option<AttrValue>]>>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no value is set.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Whether the value array has been allocated.
    pub fn is_allocated(&self) -> bool {
        self.values.is_some()
    }

    pub fn get_raw(&self, ordinal: usize) -> Option<&AttrValue> {
        self.values
            .as_ref()
            .and_then(|v| v.get(ordinal))
            .and_then(Option::as_ref)
    }

    /// Typed raw read. Returns `None` when unset.
    pub fn get<T: AttrType>(&self, attribute: Attribute<T>) -> Option<T> {
        self.get_raw(attribute.ordinal())
            .and_then(|v| T::from_attr_value(Some(v)))
    }

    /// Store `value` for attribute `ordinal` after checking its type.
    pub fn put(
        &mut self,
        registry: &AttributeRegistry,
        ordinal: usize,
        value: AttrValue,
    ) -> CssResult<()> {
        registry.check(ordinal, &value)?;
        let len = registry.len();
        let values = self
            .values
            .get_or_insert_with(|| vec![None; len].into_boxed_slice());
        if values.len() < len {
            let mut grown = std::mem::take(values).into_vec();
            grown.resize(len, None);
            *values = grown.into_boxed_slice();
        }
        values[ordinal] = Some(value);
        Ok(())
    }

    /// Typed write. Writing `None` to an optional attribute clears it.
    pub fn set<T: AttrType>(
        &mut self,
        registry: &AttributeRegistry,
        attribute: Attribute<T>,
        value: T,
    ) -> CssResult<()> {
        match value.into_attr_value() {
            Some(v) => self.put(registry, attribute.ordinal(), v),
            None => {
                self.remove(attribute.ordinal());
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, ordinal: usize) -> Option<AttrValue> {
        self.values
            .as_mut()
            .and_then(|v| v.get_mut(ordinal))
            .and_then(Option::take)
    }

    /// Copy every value set in `src` over this style.
    pub fn put_all(&mut self, src: &Style) {
        let Some(src_values) = &src.values else {
            return;
        };
        let values = self
            .values
            .get_or_insert_with(|| vec![None; src_values.len()].into_boxed_slice());
        if values.len() < src_values.len() {
            let mut grown = std::mem::take(values).into_vec();
            grown.resize(src_values.len(), None);
            *values = grown.into_boxed_slice();
        }
        for (dst, value) in values.iter_mut().zip(src_values.iter()) {
            if let Some(value) = value {
                *dst = Some(value.clone());
            }
        }
    }

    /// `(ordinal, value)` pairs of every set value.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AttrValue)> {
        self.values
            .iter()
            .flat_map(|v| v.iter().enumerate())
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::attrs;
    use crate::value::{Color, Value};
    use crate::CssError;

    #[test]
    fn test_lazy_allocation() {
        let registry = AttributeRegistry::standard();
        let mut style = Style::new();
        assert!(!style.is_allocated());
        assert!(style.is_empty());
        style.set(&registry, attrs::WIDTH, Value::px(10.0)).unwrap();
        assert!(style.is_allocated());
        assert_eq!(style.get(attrs::WIDTH), Some(Value::px(10.0)));
        assert_eq!(style.get(attrs::HEIGHT), None);
        assert_eq!(style.values.as_ref().unwrap().len(), registry.len());
    }

    #[test]
    fn test_put_checks_type() {
        let registry = AttributeRegistry::standard();
        let mut style = Style::new();
        let err = style
            .put(&registry, attrs::COLOR.ordinal(), AttrValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, CssError::TypeMismatch { .. }));
        assert!(style.is_empty());
    }

    #[test]
    fn test_put_all_overwrites_set_values_only() {
        let registry = AttributeRegistry::standard();
        let mut a = Style::new();
        a.set(&registry, attrs::COLOR, Color::BLACK).unwrap();
        a.set(&registry, attrs::WIDTH, Value::px(1.0)).unwrap();
        let mut b = Style::new();
        b.set(&registry, attrs::COLOR, Color::WHITE).unwrap();
        a.put_all(&b);
        assert_eq!(a.get(attrs::COLOR), Some(Color::WHITE));
        assert_eq!(a.get(attrs::WIDTH), Some(Value::px(1.0)));
        assert_eq!(a.iter().count(), 2);
    }

    #[test]
    fn test_optional_set_none_clears() {
        let registry = AttributeRegistry::standard();
        let mut style = Style::new();
        style
            .set(&registry, attrs::BACKGROUND_IMAGE, Some("bg.png".to_string()))
            .unwrap();
        assert_eq!(
            style.get(attrs::BACKGROUND_IMAGE),
            Some(Some("bg.png".to_string()))
        );
        style.set(&registry, attrs::BACKGROUND_IMAGE, None).unwrap();
        assert!(style.is_empty());
    }
}
