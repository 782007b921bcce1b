//! Recursive instrumentation of data stores.
//!
//! [`observe`] walks a value depth-first and attaches a change channel to
//! every [`Observable`](crate::Observable) field it reaches. The walk is
//! driven by the [`Observe`] trait: containers forward to their fields,
//! plain values do nothing. Instrumentation is eager and happens once, at
//! the moment of the walk; values assigned into the store later are not
//! walked retroactively.

/// A value that can be walked for instrumentation.
///
/// Implementations come in two flavors:
///
/// - Plain values (numbers, strings, `bool`, ...) do nothing. Observing a
///   non-container is defined as a no-op, so `observe(&5)` is legal and
///   inert.
/// - Containers forward the walk to each field they hold. Structs opt in by
///   forwarding to their fields by hand:
///
/// ```ignore
/// struct Profile {
///     name: Observable<String>,
///     age: Observable<i64>,
/// }
///
/// impl Observe for Profile {
///     fn observe(&self) {
///         self.name.observe();
///         self.age.observe();
///     }
/// }
/// ```
///
/// `Observable<T>` itself attaches its channel and then recurses into the
/// value it wraps, which is what makes nested stores reactive at every
/// level.
pub trait Observe {
    /// Instrument this value and everything reachable from it.
    fn observe(&self);
}

/// Instrument `value` recursively.
///
/// Entry point for turning a plain data store into a reactive one. Safe to
/// call repeatedly; fields that already carry a channel keep it, and the
/// extra walks are cheap no-ops.
pub fn observe<T: Observe + ?Sized>(value: &T) {
    value.observe();
}

macro_rules! impl_observe_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Observe for $ty {
                #[inline]
                fn observe(&self) {}
            }
        )*
    };
}

impl_observe_leaf!(
    bool,
    char,
    (),
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    str,
    String,
);

impl<T: Observe + ?Sized> Observe for &T {
    fn observe(&self) {
        (**self).observe();
    }
}

impl<T: Observe + ?Sized> Observe for Box<T> {
    fn observe(&self) {
        (**self).observe();
    }
}

impl<T: Observe + ?Sized> Observe for std::sync::Arc<T> {
    fn observe(&self) {
        (**self).observe();
    }
}

impl<T: Observe> Observe for Option<T> {
    fn observe(&self) {
        if let Some(value) = self {
            value.observe();
        }
    }
}

impl<T: Observe> Observe for [T] {
    fn observe(&self) {
        for item in self {
            item.observe();
        }
    }
}

impl<T: Observe, const N: usize> Observe for [T; N] {
    fn observe(&self) {
        self.as_slice().observe();
    }
}

impl<T: Observe> Observe for Vec<T> {
    fn observe(&self) {
        self.as_slice().observe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_observe_as_noops() {
        observe(&5);
        observe(&3.25);
        observe("text");
        observe(&true);
        observe(&());
        observe(&None::<String>);
    }

    #[test]
    fn containers_forward_the_walk() {
        struct Probe<'a> {
            walked: &'a std::cell::Cell<usize>,
        }
        impl Observe for Probe<'_> {
            fn observe(&self) {
                self.walked.set(self.walked.get() + 1);
            }
        }

        let walked = std::cell::Cell::new(0);
        let items = vec![Probe { walked: &walked }, Probe { walked: &walked }];
        observe(&items);
        assert_eq!(walked.get(), 2);

        observe(&Some(Probe { walked: &walked }));
        assert_eq!(walked.get(), 3);

        observe(&[Probe { walked: &walked }]);
        assert_eq!(walked.get(), 4);
    }
}
