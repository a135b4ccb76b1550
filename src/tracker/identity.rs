use std::{
    any::{type_name, Any},
    fmt,
    sync::{Arc, Weak},
};

/// Weak identity of a tracked object.
///
/// An `ObjectIdentity` holds a [`Weak`] reference to the object plus the address of its
/// allocation and the object's full type name. It never keeps the object alive.
///
/// # Equality
///
/// Two identities are equal only while both objects are alive and both refer to the same
/// allocation. An identity whose object has been dropped compares unequal to everything,
/// including itself. While any `Weak` to an allocation exists the allocation is not
/// released, so an address cannot be reused by a different object as long as the
/// registry still tracks it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use disposetrack::tracker::ObjectIdentity;
///
/// struct Connection;
///
/// let connection = Arc::new(Connection);
/// let identity = ObjectIdentity::with_type_name(&connection, "Net.Connection");
/// assert!(identity.is_alive());
/// assert_eq!(identity, ObjectIdentity::of(&connection));
///
/// drop(connection);
/// assert!(!identity.is_alive());
/// assert_ne!(identity, identity.clone());
/// ```
#[derive(Clone)]
pub struct ObjectIdentity {
    target: Weak<dyn Any + Send + Sync>,
    address: usize,
    type_name: String,
}

impl ObjectIdentity {
    /// Identity of `object`, named after its Rust type.
    #[must_use]
    pub fn of<T: Any + Send + Sync>(object: &Arc<T>) -> Self {
        Self::with_type_name(object, type_name::<T>())
    }

    /// Identity of `object` with an explicit full type name.
    ///
    /// Used when the logical type differs from the Rust type, for example for objects of
    /// an interpreted code model that share one Rust representation.
    pub fn with_type_name<T: Any + Send + Sync>(
        object: &Arc<T>,
        type_name: impl Into<String>,
    ) -> Self {
        let weak: Weak<T> = Arc::downgrade(object);
        let target: Weak<dyn Any + Send + Sync> = weak;
        Self {
            target,
            address: Arc::as_ptr(object) as *const () as usize,
            type_name: type_name.into(),
        }
    }

    /// Full type name the object is counted under.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Address of the object's allocation.
    #[must_use]
    pub fn address(&self) -> usize {
        self.address
    }

    /// Returns `true` while the object has not been dropped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        self.target.clone()
    }
}

impl PartialEq for ObjectIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.is_alive() && other.is_alive()
    }
}

impl fmt::Debug for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectIdentity")
            .field("type_name", &self.type_name)
            .field("address", &format_args!("0x{:x}", self.address))
            .field("alive", &self.is_alive())
            .finish()
    }
}
