use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::channel::ChangeChannel;
use crate::error::BindingError;
use crate::store::Observe;

/// A single reactive field: a value plus its lazily attached change channel.
///
/// An `Observable` starts inert. Until an [`observe`](crate::observe) walk
/// reaches it, reads and writes are plain locked accesses with no reactive
/// cost and writes cannot fail. Once instrumented, a read performed inside a
/// [`Computation`](crate::Computation)'s expression subscribes that
/// computation, and every write notifies the subscribers synchronously, in
/// subscription order, before the write call returns.
///
/// Writes always notify; whether a change actually happened is judged by
/// each computation against its own cached value.
///
/// # Usage
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
///
/// let profile = Profile {
///     name: Observable::new("Ann".to_string()),
///     age: Observable::new(30),
/// };
/// observe(&profile);
///
/// let greeting = Computation::new(
///     move || format!("hello {}", profile.name.get()),
///     |new, _old| println!("{new}"),
/// );
/// profile.name.set("Bob".to_string())?;
/// ```
pub struct Observable<T> {
    value: RwLock<T>,
    channel: OnceLock<ChangeChannel>,
}

impl<T> Observable<T> {
    /// Wrap `value` in an inert observable field.
    pub fn new(value: T) -> Self {
        Observable {
            value: RwLock::new(value),
            channel: OnceLock::new(),
        }
    }

    /// Read the value, subscribing the evaluating computation if any.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.value.read().clone()
    }

    /// Read through a closure without cloning, subscribing the evaluating
    /// computation if any.
    ///
    /// The read lock is held while `f` runs, so `f` must not write back to
    /// this same field.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        // Recursive read: a notification pass triggered inside `f` can
        // re-enter this field through another computation's expression.
        f(&self.value.read_recursive())
    }

    /// Store `value` and notify observers.
    ///
    /// On an inert field this is a plain store and cannot fail. On an
    /// instrumented field the store happens first, then the field's channel
    /// runs one notification pass; the first error raised during the pass is
    /// returned after the pass completes. A write issued while this field's
    /// own pass is in progress is rejected before anything is stored.
    pub fn set(&self, value: T) -> Result<(), BindingError> {
        self.replace(value).map(drop)
    }

    /// Store `value` and return the previous value.
    ///
    /// Same notification and rejection behavior as [`set`](Self::set). When
    /// the pass reports an error the previous value is dropped with it.
    pub fn replace(&self, value: T) -> Result<T, BindingError> {
        let Some(channel) = self.writable_channel()? else {
            return Ok(std::mem::replace(&mut *self.value.write(), value));
        };
        let old = std::mem::replace(&mut *self.value.write(), value);
        // Write lock released above; observers may read this field freely.
        channel.notify()?;
        Ok(old)
    }

    /// Mutate the value in place through a closure, then notify observers.
    ///
    /// Same notification and rejection behavior as [`set`](Self::set). The
    /// write lock is held while `f` runs, so `f` must not read this same
    /// field.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), BindingError> {
        let Some(channel) = self.writable_channel()? else {
            f(&mut *self.value.write());
            return Ok(());
        };
        {
            let mut value = self.value.write();
            f(&mut value);
        }
        channel.notify()
    }

    /// Whether an [`observe`](crate::observe) walk has instrumented this
    /// field.
    pub fn is_observed(&self) -> bool {
        self.channel.get().is_some()
    }

    /// Arena id of the attached channel (internal use only)
    #[cfg(test)]
    pub(crate) fn channel_id(&self) -> Option<crate::arena::ChannelId> {
        self.channel.get().map(ChangeChannel::id)
    }

    /// Uid of the attached channel (internal use only)
    #[cfg(test)]
    pub(crate) fn channel_uid(&self) -> Option<u64> {
        self.channel.get().map(ChangeChannel::uid)
    }

    fn track(&self) {
        if let Some(channel) = self.channel.get() {
            channel.track_dependency();
        }
    }

    /// Resolve the channel for a write, rejecting mid-notify writes.
    fn writable_channel(&self) -> Result<Option<&ChangeChannel>, BindingError> {
        match self.channel.get() {
            None => Ok(None),
            Some(channel) if channel.is_notifying() => {
                cov_mark::hit!(write_rejected_mid_notify);
                tracing::warn!(
                    channel = channel.uid(),
                    "write rejected: own notification pass in progress"
                );
                Err(BindingError::MutationDuringNotify {
                    channel: channel.uid(),
                })
            }
            Some(channel) => Ok(Some(channel)),
        }
    }

    fn attach(&self) {
        self.channel.get_or_init(ChangeChannel::new);
    }
}

/// Attaches the channel, then walks into the wrapped value. This is the
/// step that makes instrumentation recursive: a store holding observable
/// fields inside observable fields becomes reactive at every level.
impl<T: Observe> Observe for Observable<T> {
    fn observe(&self) {
        self.attach();
        self.value.read().observe();
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Observable<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Untracked peek: Debug must not subscribe anything.
        f.debug_struct("Observable")
            .field("value", &*self.value.read())
            .field("observed", &self.is_observed())
            .finish()
    }
}
