//! Atomic holder of a heterogeneously-typed value.
//!
//! A [`Value`] publishes an immutable, type-erased holder through an atomic
//! pointer swap. Unlike a strictly-typed atomic cell, values of different
//! types may be stored over the cell's lifetime, which makes it suitable
//! for swapping implementations behind a trait-object-style seam.
//!
//! [`Value::compare_and_swap`] compares holder *identity* (pointer
//! equality), not structural equality: passing a freshly built equal-valued
//! holder as `old` never matches.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// The immutable record published by a [`Value`].
pub struct ValueHolder {
    value: Box<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for ValueHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueHolder").finish_non_exhaustive()
    }
}

impl ValueHolder {
    fn new(value: impl Any + Send + Sync) -> Arc<Self> {
        Arc::new(Self {
            value: Box::new(value),
        })
    }

    /// Borrows the stored value as `T`, if that is its type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Returns true if the stored value has type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
}

/// An atomic cell for values of any (Send + Sync) type.
///
/// Loads are wait-free; stores and swaps are linearizable pointer
/// publications.
#[derive(Debug, Default)]
pub struct Value {
    slot: ArcSwapOption<ValueHolder>,
}

impl Value {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the stored value.
    pub fn store(&self, value: impl Any + Send + Sync) {
        self.slot.store(Some(ValueHolder::new(value)));
    }

    /// Returns the most recently stored holder, or `None` if nothing was
    /// ever stored.
    #[must_use]
    pub fn load(&self) -> Option<Arc<ValueHolder>> {
        self.slot.load_full()
    }

    /// Atomically replaces the stored value, returning the previous holder.
    pub fn swap(&self, value: impl Any + Send + Sync) -> Option<Arc<ValueHolder>> {
        self.slot.swap(Some(ValueHolder::new(value)))
    }

    /// Replaces the stored value iff the current holder is `old`.
    ///
    /// Returns false if nothing was ever stored or another holder is
    /// current. The comparison is by holder identity, so `old` must be a
    /// handle previously obtained from [`Value::load`] or [`Value::swap`].
    pub fn compare_and_swap(
        &self,
        old: &Arc<ValueHolder>,
        new: impl Any + Send + Sync,
    ) -> bool {
        let expected = Some(Arc::clone(old));
        let previous = self
            .slot
            .compare_and_swap(&expected, Some(ValueHolder::new(new)));
        match &*previous {
            Some(current) => Arc::ptr_eq(current, old),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::thread;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn empty_cell_loads_nothing() {
        init_test("empty_cell_loads_nothing");
        let value = Value::new();
        assert!(value.load().is_none());
        crate::test_complete!("empty_cell_loads_nothing");
    }

    #[test]
    fn store_then_load_returns_the_same_instance() {
        init_test("store_then_load_returns_the_same_instance");
        let value = Value::new();
        value.store(42_u32);

        let first = value.load().expect("stored");
        let second = value.load().expect("stored");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.downcast_ref::<u32>(), Some(&42));
        crate::test_complete!("store_then_load_returns_the_same_instance");
    }

    #[test]
    fn heterogeneous_types_across_stores() {
        init_test("heterogeneous_types_across_stores");
        let value = Value::new();
        value.store(1_u64);
        assert!(value.load().expect("stored").is::<u64>());

        value.store(String::from("now a string"));
        let current = value.load().expect("stored");
        assert!(current.is::<String>());
        assert_eq!(
            current.downcast_ref::<String>().map(String::as_str),
            Some("now a string")
        );
        crate::test_complete!("heterogeneous_types_across_stores");
    }

    #[test]
    fn swap_returns_the_previous_holder() {
        init_test("swap_returns_the_previous_holder");
        let value = Value::new();
        assert!(value.swap(1_u8).is_none());

        let previous = value.swap(2_u8).expect("previous holder");
        assert_eq!(previous.downcast_ref::<u8>(), Some(&1));
        assert_eq!(
            value.load().expect("current").downcast_ref::<u8>(),
            Some(&2)
        );
        crate::test_complete!("swap_returns_the_previous_holder");
    }

    #[test]
    fn compare_and_swap_requires_the_current_holder() {
        init_test("compare_and_swap_requires_the_current_holder");
        let value = Value::new();

        // Never stored: nothing to compare against.
        let stranger = ValueHolder::new(1_u8);
        assert!(!value.compare_and_swap(&stranger, 2_u8));

        value.store(1_u8);
        let current = value.load().expect("stored");

        // An equal-valued but distinct holder does not match.
        let lookalike = ValueHolder::new(1_u8);
        assert!(!value.compare_and_swap(&lookalike, 3_u8));

        // The genuine current holder does.
        assert!(value.compare_and_swap(&current, 3_u8));
        assert_eq!(
            value.load().expect("swapped").downcast_ref::<u8>(),
            Some(&3)
        );

        // A stale holder no longer matches.
        assert!(!value.compare_and_swap(&current, 4_u8));
        crate::test_complete!("compare_and_swap_requires_the_current_holder");
    }

    #[test]
    fn compare_and_swap_serializes_racing_writers() {
        init_test("compare_and_swap_serializes_racing_writers");
        let value = Arc::new(Value::new());
        value.store(0_u32);
        let seed = value.load().expect("seeded");

        let mut handles = Vec::new();
        for i in 1..=4_u32 {
            let value = Arc::clone(&value);
            let seed = Arc::clone(&seed);
            handles.push(thread::spawn(move || value.compare_and_swap(&seed, i)));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("writer thread"))
            .filter(|swapped| *swapped)
            .count();
        crate::assert_with_log!(winners == 1, "single CAS winner", 1usize, winners);
        crate::test_complete!("compare_and_swap_serializes_racing_writers");
    }
}
