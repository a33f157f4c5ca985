//! Weft — an incremental, fiber-based UI rendering engine.
//!
//! A declarative element tree goes in; a mutable host tree (whatever a
//! [`HostAdapter`] fronts) comes out, kept up to date by re-rendering
//! only what changed. Rendering is cooperative: the [`Renderer`] walks
//! its work-in-progress fiber tree one unit at a time and yields to the
//! host whenever the injected time budget runs out, then applies the
//! finished generation to the host tree in a single atomic commit.
//!
//! The crate is host-agnostic. [`MemoryHost`] is the in-crate reference
//! adapter used by the tests and the demo; real bindings implement
//! [`HostAdapter`] against their own node type. Scheduling is equally
//! abstract: the engine only needs a [`FrameScheduler`] to ask for a
//! future invocation and a [`TimeSlice`] to know how much budget the
//! current one has left.

pub mod element;
pub mod fiber;
pub mod hash;
pub mod hooks;
pub mod host;
mod reconcile;
pub mod scheduler;

pub use element::{
    create_element, AttrMap, ComponentFn, Element, ElementKind, EventHandler, PropValue, Props,
};
pub use fiber::{EffectTag, Fiber, FiberId};
pub use hooks::{use_state, Hook, SetState, UsageError};
pub use host::{HostAdapter, HostError, HostId, MemoryHost};
pub use scheduler::{FrameScheduler, NoopScheduler, Renderer, TimeSlice};
