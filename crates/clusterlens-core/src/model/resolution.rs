//! Tri-state resolution marker for lazily fetched attributes.
//!
//! Several attributes in the model are not merely optional: before the
//! first fetch we do not know whether a value exists at all. `Resolution`
//! keeps those states apart so that a confirmed "nothing there" is
//! remembered and never queried again, while a plain failure leaves the
//! attribute unresolved and eligible for retry.

/// Resolution state of a lazily fetched attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution<T> {
    /// No lookup has completed yet; a future access may still fetch.
    #[default]
    Unresolved,
    /// A lookup completed and confirmed there is no value. Terminal.
    Absent,
    /// A lookup completed and produced a value. Terminal.
    Present(T),
}

impl<T> Resolution<T> {
    /// Build a terminal resolution from an optional lookup result.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Resolution::Present(v),
            None => Resolution::Absent,
        }
    }

    /// True once a lookup has completed, whatever its outcome.
    pub fn is_attempted(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Resolution::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Resolution::Present(v) => Some(v),
            _ => None,
        }
    }

    /// Collapse into an `Option`, losing the unresolved/absent distinction.
    pub fn into_option(self) -> Option<T> {
        match self {
            Resolution::Present(v) => Some(v),
            _ => None,
        }
    }

    /// Convert from `&Resolution<T>` to `Resolution<&T>`.
    pub fn as_ref(&self) -> Resolution<&T> {
        match self {
            Resolution::Unresolved => Resolution::Unresolved,
            Resolution::Absent => Resolution::Absent,
            Resolution::Present(v) => Resolution::Present(v),
        }
    }

    /// Map the resolved value, preserving the state.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Resolution::Unresolved => Resolution::Unresolved,
            Resolution::Absent => Resolution::Absent,
            Resolution::Present(v) => Resolution::Present(f(v)),
        }
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        assert_eq!(Resolution::from_option(Some(3)), Resolution::Present(3));
        assert_eq!(Resolution::<i32>::from_option(None), Resolution::Absent);
    }

    #[test]
    fn test_attempted_states() {
        assert!(!Resolution::<()>::Unresolved.is_attempted());
        assert!(Resolution::<()>::Absent.is_attempted());
        assert!(Resolution::Present(()).is_attempted());
        assert!(Resolution::<()>::Absent.is_absent());
        assert!(Resolution::Present(1).is_present());
    }

    #[test]
    fn test_value_and_into_option() {
        let present = Resolution::Present("x".to_string());
        assert_eq!(present.value(), Some(&"x".to_string()));
        assert_eq!(present.into_option(), Some("x".to_string()));
        assert_eq!(Resolution::<String>::Absent.into_option(), None);
        assert_eq!(Resolution::<String>::Unresolved.value(), None);
    }

    #[test]
    fn test_map_preserves_state() {
        assert_eq!(
            Resolution::Present(2).map(|n| n * 10),
            Resolution::Present(20)
        );
        assert_eq!(
            Resolution::<i32>::Absent.map(|n| n * 10),
            Resolution::Absent
        );
        assert_eq!(
            Resolution::<i32>::Unresolved.map(|n| n * 10),
            Resolution::Unresolved
        );
    }

    #[test]
    fn test_default_is_unresolved() {
        assert_eq!(Resolution::<u32>::default(), Resolution::Unresolved);
    }
}
