//! Hasher selection for the engine's ordered maps.

#[cfg(feature = "std-hash")]
mod imp {
    pub use std::collections::hash_map::RandomState as DefaultHashBuilder;
}

#[cfg(not(feature = "std-hash"))]
mod imp {
    pub use ahash::RandomState as DefaultHashBuilder;
}

pub use imp::DefaultHashBuilder;
