//! Positional component state. A component's `use_state` calls are keyed
//! purely by call order within that component instance: the Nth call this
//! render reads the Nth hook of the fiber's alternate. Components must
//! therefore call hooks in the same order and count on every render;
//! debug builds verify the count against the previous pass, release
//! builds inherit the misattribution hazard.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread_local;

use crate::scheduler::RendererHandle;

pub(crate) type UpdateQueue = Rc<RefCell<Vec<StateUpdate>>>;

/// A pending state transition, resolved in enqueue order on the owning
/// component's next render. Resolution never consumes the queue: if a
/// render generation is abandoned and restarted, the restart re-reads
/// the same pending updates from the same committed base state.
pub(crate) enum StateUpdate {
    Set(Rc<dyn Any>),
    Apply(Rc<dyn Fn(&dyn Any) -> Rc<dyn Any>>),
}

impl StateUpdate {
    fn resolve(&self, prev: &dyn Any) -> Rc<dyn Any> {
        match self {
            StateUpdate::Set(value) => Rc::clone(value),
            StateUpdate::Apply(f) => f(prev),
        }
    }
}

/// One state slot on a component fiber. The queue is shared with every
/// `SetState` handle minted for this slot, so updates issued after the
/// render land where the next pass will pick them up.
#[derive(Clone)]
pub struct Hook {
    pub(crate) state: Rc<dyn Any>,
    pub(crate) queue: UpdateQueue,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("pending", &self.queue.borrow().len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    OutsideRender,
    StateTypeMismatch,
    HookCountMismatch { expected: usize, found: usize },
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::OutsideRender => {
                write!(f, "state hook called outside of an active render pass")
            }
            UsageError::StateTypeMismatch => write!(
                f,
                "state hook observed a different state type; hooks must run in the same order every render"
            ),
            UsageError::HookCountMismatch { expected, found } => write!(
                f,
                "component rendered {found} hooks where its previous render had {expected}"
            ),
        }
    }
}

impl std::error::Error for UsageError {}

/// Live hook bookkeeping for the component currently being rendered.
/// Holds a snapshot of the alternate's hooks; the alternate itself is
/// left untouched so a superseded generation can diff against it again.
pub(crate) struct HookSession {
    prev: Vec<Hook>,
    next: Vec<Hook>,
    index: usize,
    handle: RendererHandle,
}

impl HookSession {
    pub(crate) fn new(prev: Vec<Hook>, handle: RendererHandle) -> Self {
        Self {
            prev,
            next: Vec::new(),
            index: 0,
            handle,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.next.len()
    }

    pub(crate) fn into_hooks(self) -> Vec<Hook> {
        self.next
    }
}

thread_local! {
    static ACTIVE_SESSIONS: RefCell<Vec<*mut HookSession>> = RefCell::new(Vec::new());
}

/// Marks `session` as the receiver of hook calls until the guard drops.
pub(crate) fn install_session(session: &mut HookSession) -> SessionGuard {
    ACTIVE_SESSIONS.with(|stack| stack.borrow_mut().push(session as *mut HookSession));
    SessionGuard
}

pub(crate) struct SessionGuard;

impl Drop for SessionGuard {
    fn drop(&mut self) {
        ACTIVE_SESSIONS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn with_session<R>(f: impl FnOnce(&mut HookSession) -> R) -> R {
    let ptr = ACTIVE_SESSIONS.with(|stack| stack.borrow().last().copied());
    let ptr = ptr.unwrap_or_else(|| panic!("{}", UsageError::OutsideRender));
    let session = unsafe { &mut *ptr };
    f(session)
}

/// Persists a value across renders of the calling component, keyed by
/// call order. Returns the current value and a setter handle; the setter
/// enqueues an update and schedules a fresh render generation rooted at
/// the committed root. Callable only while the scheduler is rendering a
/// component fiber.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, SetState<T>) {
    with_session(move |session| {
        let index = session.index;
        let state = match session.prev.get(index) {
            Some(prev) => {
                let mut state = Rc::clone(&prev.state);
                for update in prev.queue.borrow().iter() {
                    state = update.resolve(state.as_ref());
                }
                state
            }
            None => Rc::new(initial) as Rc<dyn Any>,
        };
        let current = state
            .downcast_ref::<T>()
            .cloned()
            .unwrap_or_else(|| panic!("{}", UsageError::StateTypeMismatch));
        let queue: UpdateQueue = Rc::new(RefCell::new(Vec::new()));
        session.next.push(Hook {
            state,
            queue: Rc::clone(&queue),
        });
        session.index += 1;
        let setter = SetState {
            queue,
            handle: session.handle.clone(),
            _marker: PhantomData,
        };
        (current, setter)
    })
}

/// Setter half of a state slot. Cheap to clone; safe to stash in event
/// handlers and fire long after the render that produced it.
pub struct SetState<T> {
    queue: UpdateQueue,
    handle: RendererHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> SetState<T> {
    /// Replaces the state with `value` on the next render.
    pub fn set(&self, value: T) {
        self.queue
            .borrow_mut()
            .push(StateUpdate::Set(Rc::new(value)));
        self.handle.request_restart();
    }

    /// Maps the state through `f` on the next render. Queued updates
    /// resolve in enqueue order, each seeing its predecessor's result.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        let update = StateUpdate::Apply(Rc::new(move |prev: &dyn Any| {
            let prev = prev
                .downcast_ref::<T>()
                .unwrap_or_else(|| panic!("{}", UsageError::StateTypeMismatch));
            Rc::new(f(prev)) as Rc<dyn Any>
        }));
        self.queue.borrow_mut().push(update);
        self.handle.request_restart();
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState")
            .field("pending", &self.queue.borrow().len())
            .finish()
    }
}
