//! The cooperative work scheduler and the commit phase.
//!
//! Rendering is split in two: an interruptible render phase that walks
//! the work-in-progress fiber tree one unit at a time, re-checking the
//! injected time budget between units, and an atomic commit phase that
//! applies every queued host mutation in one uninterrupted pass so the
//! host tree is never observed half-updated.

use std::cell::Cell;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use crate::element::{ComponentFn, Element, ElementKind, Props};
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId};
use crate::hooks::{install_session, HookSession};
use crate::host::{HostAdapter, HostError, HostId};
use crate::reconcile::reconcile_children;

/// Budget left in a slice below which the render loop yields back to the
/// host scheduler.
const YIELD_THRESHOLD: Duration = Duration::from_millis(1);

/// The external scheduling facility: whatever can arrange for the work
/// loop to be invoked again later. The engine re-registers itself after
/// every loop body (continuous polling), so implementations only need a
/// level-triggered "please run me" signal.
pub trait FrameScheduler: Send + Sync {
    fn request_frame(&self);
}

#[derive(Default)]
pub struct NoopScheduler;

impl FrameScheduler for NoopScheduler {
    fn request_frame(&self) {}
}

/// Remaining budget of the current time slice, re-read after every unit
/// of work. The engine assumes nothing about where the budget comes
/// from, only that it will eventually be handed a fresh slice.
pub trait TimeSlice {
    fn remaining(&self) -> Duration;
}

struct SharedState {
    /// Set by `SetState`: the next loop entry abandons any in-progress
    /// generation and restarts from the committed root.
    restart: Cell<bool>,
    scheduler: Arc<dyn FrameScheduler>,
}

/// Weak handle to a renderer's shared flags, carried by setter handles.
#[derive(Clone)]
pub(crate) struct RendererHandle(Weak<SharedState>);

impl RendererHandle {
    pub(crate) fn request_restart(&self) {
        if let Some(shared) = self.0.upgrade() {
            shared.restart.set(true);
            shared.scheduler.request_frame();
        }
    }
}

/// The reconciler context: one per mounted container. Owns the host
/// adapter, the fiber arena, both tree roots, the work cursor, and the
/// deletion list — all single-writer, driven from one thread.
pub struct Renderer<H: HostAdapter> {
    host: H,
    arena: FiberArena,
    shared: Rc<SharedState>,
    current_root: Option<FiberId>,
    wip_root: Option<FiberId>,
    next_unit: Option<FiberId>,
    deletions: Vec<FiberId>,
    /// Fibers allocated for the committed generation; freed wholesale
    /// when the next generation commits.
    current_roster: Vec<FiberId>,
    /// Fibers allocated for the in-progress generation.
    wip_roster: Vec<FiberId>,
}

impl<H: HostAdapter> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, Arc::new(NoopScheduler))
    }

    pub fn with_scheduler(host: H, scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self {
            host,
            arena: FiberArena::new(),
            shared: Rc::new(SharedState {
                restart: Cell::new(false),
                scheduler,
            }),
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            current_roster: Vec::new(),
            wip_roster: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// True while a render generation is pending or in progress.
    pub fn has_pending_work(&self) -> bool {
        self.next_unit.is_some() || self.wip_root.is_some() || self.shared.restart.get()
    }

    fn handle(&self) -> RendererHandle {
        RendererHandle(Rc::downgrade(&self.shared))
    }

    fn alloc(&mut self, fiber: Fiber) -> FiberId {
        let id = self.arena.alloc(fiber);
        self.wip_roster.push(id);
        id
    }

    /// Mounts `element` into `container`, scheduling a fresh generation
    /// diffed against whatever is currently committed. Idempotent:
    /// calling again with a new tree for the same container reconciles
    /// against the committed one.
    pub fn render(&mut self, element: Element, container: HostId) {
        self.discard_wip();
        let mut props = Props::default();
        props.children.push(element);
        let mut root = Fiber::new(None, props);
        root.host = Some(container);
        root.alternate = self.current_root;
        let id = self.alloc(root);
        self.wip_root = Some(id);
        self.next_unit = Some(id);
        self.shared.restart.set(false);
        self.shared.scheduler.request_frame();
        log::debug!("render generation scheduled for container {container}");
    }

    /// The loop body handed to the scheduling facility. Performs units
    /// of work while budget remains, commits once the tree is fully
    /// walked, and re-requests an invocation either way.
    pub fn work_loop(&mut self, slice: &dyn TimeSlice) -> Result<(), HostError> {
        self.maybe_restart();
        while let Some(unit) = self.next_unit {
            self.next_unit = self.perform_unit(unit)?;
            self.maybe_restart();
            if slice.remaining() < YIELD_THRESHOLD {
                log::trace!("render phase yielding; budget exhausted");
                break;
            }
        }
        if self.next_unit.is_none() {
            if let Some(root) = self.wip_root {
                self.commit_root(root)?;
            }
        }
        // idle polling: always ask to be invoked again
        self.shared.scheduler.request_frame();
        Ok(())
    }

    /// Drops an in-progress generation and returns its fibers to the
    /// arena. The committed tree is untouched.
    fn discard_wip(&mut self) {
        if self.wip_root.is_some() || !self.wip_roster.is_empty() {
            log::debug!("abandoning superseded render generation");
            for id in mem::take(&mut self.wip_roster) {
                self.arena.free(id);
            }
            self.wip_root = None;
            self.next_unit = None;
        }
        self.deletions.clear();
    }

    /// Honors a pending state-update restart: overwrite the
    /// work-in-progress pointer with a fresh root cloned from the
    /// committed root, discarding any partial progress. A restart
    /// requested before anything has committed stays pending until the
    /// in-flight initial render lands.
    fn maybe_restart(&mut self) {
        if !self.shared.restart.get() {
            return;
        }
        let Some(current) = self.current_root else {
            return;
        };
        self.shared.restart.set(false);
        self.discard_wip();
        let (props, host) = {
            let cur = self.arena.get(current);
            (cur.props.clone(), cur.host)
        };
        let mut root = Fiber::new(None, props);
        root.host = host;
        root.alternate = Some(current);
        let id = self.alloc(root);
        self.wip_root = Some(id);
        self.next_unit = Some(id);
        log::debug!("state update: restarting from the committed root");
    }

    /// Processes exactly one fiber and returns the next one to visit in
    /// depth-first pre-order: child first, else the nearest ancestor
    /// sibling.
    fn perform_unit(&mut self, unit: FiberId) -> Result<Option<FiberId>, HostError> {
        match self.arena.get(unit).kind.clone() {
            Some(ElementKind::Component(component)) => self.update_component(unit, component)?,
            _ => self.update_host(unit)?,
        }
        Ok(self.next_after(unit))
    }

    fn update_component(&mut self, unit: FiberId, component: ComponentFn) -> Result<(), HostError> {
        let props = self.arena.get(unit).props.clone();
        let alternate = self.arena.get(unit).alternate;
        // snapshot, not take: the alternate keeps its hooks so a
        // superseded generation can be restarted against it
        let prev_hooks = alternate.map(|alt| self.arena.get(alt).hooks.clone());
        let prev_len = prev_hooks.as_ref().map_or(0, Vec::len);
        let had_alternate = prev_hooks.is_some();

        let mut session = HookSession::new(prev_hooks.unwrap_or_default(), self.handle());
        let rendered = {
            let _guard = install_session(&mut session);
            component(&props)
        };
        #[cfg(debug_assertions)]
        if had_alternate && session.len() != prev_len {
            panic!(
                "{}",
                crate::hooks::UsageError::HookCountMismatch {
                    expected: prev_len,
                    found: session.len(),
                }
            );
        }
        #[cfg(not(debug_assertions))]
        let _ = (had_alternate, prev_len);
        self.arena.get_mut(unit).hooks = session.into_hooks();

        let children = [rendered];
        reconcile_children(
            &mut self.arena,
            &mut self.wip_roster,
            &mut self.deletions,
            unit,
            &children,
        );
        Ok(())
    }

    fn update_host(&mut self, unit: FiberId) -> Result<(), HostError> {
        if self.arena.get(unit).host.is_none() {
            let (kind, props) = {
                let fiber = self.arena.get(unit);
                (fiber.kind.clone(), fiber.props.clone())
            };
            if let Some(kind) = kind {
                // host nodes are built detached during the render phase;
                // commit links them in
                let node = self.host.create_node(&kind)?;
                self.host.apply_prop_diff(node, &Props::default(), &props)?;
                self.arena.get_mut(unit).host = Some(node);
            }
        }
        let children = self.arena.get(unit).props.children.clone();
        reconcile_children(
            &mut self.arena,
            &mut self.wip_roster,
            &mut self.deletions,
            unit,
            &children,
        );
        Ok(())
    }

    fn next_after(&self, unit: FiberId) -> Option<FiberId> {
        if let Some(child) = self.arena.get(unit).child {
            return Some(child);
        }
        let mut cursor = Some(unit);
        while let Some(id) = cursor {
            let fiber = self.arena.get(id);
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            cursor = fiber.parent;
        }
        None
    }

    /// Applies the whole generation to the host tree in one
    /// uninterruptible pass, then swaps it in as the committed tree and
    /// reclaims the generation it replaced.
    fn commit_root(&mut self, root: FiberId) -> Result<(), HostError> {
        let child = self.arena.get(root).child;
        self.commit_work(child)?;
        let deletions = mem::take(&mut self.deletions);
        let deleted = deletions.len();
        for id in deletions {
            if let Some(parent) = self.host_parent_of(id) {
                self.commit_deletion(id, parent)?;
            }
        }

        let retired = mem::take(&mut self.current_roster);
        for id in retired {
            self.arena.free(id);
        }
        self.current_roster = mem::take(&mut self.wip_roster);
        // the freed generation's ids may be reused; drop stale links
        for &id in &self.current_roster {
            self.arena.get_mut(id).alternate = None;
        }
        self.current_root = Some(root);
        self.wip_root = None;
        log::debug!(
            "committed generation: {} live fibers, {deleted} deletions",
            self.current_roster.len()
        );
        Ok(())
    }

    fn commit_work(&mut self, fiber: Option<FiberId>) -> Result<(), HostError> {
        let Some(id) = fiber else {
            return Ok(());
        };
        let effect = self.arena.get(id).effect;
        let host = self.arena.get(id).host;
        match effect {
            EffectTag::Placement => {
                if let Some(node) = host {
                    if let Some(parent) = self.host_parent_of(id) {
                        self.host.attach(parent, node)?;
                    }
                }
            }
            EffectTag::Update => {
                if let Some(node) = host {
                    self.commit_update(id, node)?;
                }
            }
            // deletions are never linked into the new tree; they are
            // processed from the deletion list in commit_root
            EffectTag::Deletion => {}
            EffectTag::None => {}
        }
        let child = self.arena.get(id).child;
        self.commit_work(child)?;
        let sibling = self.arena.get(id).sibling;
        self.commit_work(sibling)?;
        Ok(())
    }

    fn commit_update(&mut self, id: FiberId, node: HostId) -> Result<(), HostError> {
        let Some(alt) = self.arena.get(id).alternate else {
            return Ok(());
        };
        let new_kind = self.arena.get(id).kind.clone();
        match new_kind {
            Some(ElementKind::Text(value)) => {
                let unchanged = matches!(
                    &self.arena.get(alt).kind,
                    Some(ElementKind::Text(old)) if *old == value
                );
                if !unchanged {
                    self.host.set_text(node, &value)?;
                }
            }
            _ => {
                let prev = self.arena.get(alt).props.clone();
                let next = self.arena.get(id).props.clone();
                self.host.apply_prop_diff(node, &prev, &next)?;
            }
        }
        Ok(())
    }

    /// Nearest ancestor fiber that owns a host node; component fibers
    /// along the way are skipped, they have none to offer.
    fn host_parent_of(&self, id: FiberId) -> Option<HostId> {
        let mut cursor = self.arena.get(id).parent;
        while let Some(pid) = cursor {
            let fiber = self.arena.get(pid);
            if let Some(host) = fiber.host {
                return Some(host);
            }
            cursor = fiber.parent;
        }
        None
    }

    /// Detaches the nearest host node in the deleted fiber's own
    /// subtree: a component fiber's deletion cascades to the rendered
    /// descendant that actually owns a node.
    fn commit_deletion(&mut self, id: FiberId, parent: HostId) -> Result<(), HostError> {
        let mut cursor = Some(id);
        while let Some(fid) = cursor {
            let fiber = self.arena.get(fid);
            if let Some(node) = fiber.host {
                self.host.detach(parent, node)?;
                return Ok(());
            }
            cursor = fiber.child;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{create_element, Element, EventHandler, PropValue};
    use crate::host::MemoryHost;

    struct OpenSlice;

    impl TimeSlice for OpenSlice {
        fn remaining(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    /// Reports no remaining budget from the first check: the loop yields
    /// after every single unit of work.
    struct StarvedSlice;

    impl TimeSlice for StarvedSlice {
        fn remaining(&self) -> Duration {
            Duration::ZERO
        }
    }

    fn drain(renderer: &mut Renderer<MemoryHost>) {
        while renderer.has_pending_work() {
            renderer.work_loop(&OpenSlice).expect("work loop");
        }
    }

    fn new_renderer() -> (Renderer<MemoryHost>, HostId) {
        let mut host = MemoryHost::new();
        let container = host
            .create_node(&ElementKind::host("root"))
            .expect("container");
        (Renderer::new(host), container)
    }

    fn host_el(tag: &str, props: Props, children: Vec<Element>) -> Element {
        create_element(ElementKind::host(tag), props, children)
    }

    fn page() -> Element {
        host_el(
            "div",
            Props::new().attr("id", "page"),
            vec![
                host_el("h1", Props::new().attr("title", "foo"), vec!["hello".into()]),
                host_el("p", Props::new(), vec![]),
            ],
        )
    }

    #[test]
    fn mount_builds_the_declared_host_tree() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        drain(&mut renderer);

        let host = renderer.host();
        let div = host.children(container).unwrap()[0];
        assert_eq!(host.tag(div).unwrap(), "div");
        let children = host.children(div).unwrap().to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(host.tag(children[0]).unwrap(), "h1");
        assert_eq!(
            host.attr(children[0], "title").unwrap(),
            Some(&PropValue::Text("foo".into()))
        );
        let text = host.children(children[0]).unwrap()[0];
        assert_eq!(host.text(text).unwrap(), "hello");
        assert_eq!(host.tag(children[1]).unwrap(), "p");
    }

    #[test]
    fn remounting_the_same_tree_is_idempotent() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        drain(&mut renderer);
        let first = renderer.host().dump_tree(Some(container));

        renderer.render(page(), container);
        drain(&mut renderer);
        let second = renderer.host().dump_tree(Some(container));
        assert_eq!(first, second);
    }

    #[test]
    fn unchanged_positions_reuse_their_host_nodes() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        drain(&mut renderer);
        let div_before = renderer.host().children(container).unwrap()[0];
        let h1_before = renderer.host().children(div_before).unwrap()[0];

        let next = host_el(
            "div",
            Props::new().attr("id", "page"),
            vec![
                host_el("h1", Props::new().attr("title", "bar"), vec!["hello".into()]),
                host_el("p", Props::new(), vec![]),
            ],
        );
        renderer.render(next, container);
        drain(&mut renderer);

        let div_after = renderer.host().children(container).unwrap()[0];
        let h1_after = renderer.host().children(div_after).unwrap()[0];
        assert_eq!(div_before, div_after);
        assert_eq!(h1_before, h1_after);
        assert_eq!(
            renderer.host().attr(h1_after, "title").unwrap(),
            Some(&PropValue::Text("bar".into()))
        );
    }

    #[test]
    fn type_change_replaces_the_host_node() {
        let (mut renderer, container) = new_renderer();
        renderer.render(
            host_el("div", Props::new(), vec![host_el("h1", Props::new(), vec![])]),
            container,
        );
        drain(&mut renderer);
        let div = renderer.host().children(container).unwrap()[0];
        let old_child = renderer.host().children(div).unwrap()[0];

        renderer.render(
            host_el("div", Props::new(), vec![host_el("p", Props::new(), vec![])]),
            container,
        );
        drain(&mut renderer);
        let new_child = renderer.host().children(div).unwrap()[0];
        assert_ne!(old_child, new_child);
        assert_eq!(renderer.host().tag(new_child).unwrap(), "p");
        assert_eq!(renderer.host().children(div).unwrap().len(), 1);
    }

    fn leaf_widget(_props: &Props) -> Element {
        host_el("span", Props::new(), vec!["inner".into()])
    }

    #[test]
    fn deleting_a_component_detaches_its_rendered_descendants() {
        let (mut renderer, container) = new_renderer();
        let widget = create_element(
            ElementKind::Component(leaf_widget),
            Props::new(),
            Vec::<Element>::new(),
        );
        renderer.render(host_el("div", Props::new(), vec![widget]), container);
        drain(&mut renderer);
        let div = renderer.host().children(container).unwrap()[0];
        assert_eq!(renderer.host().children(div).unwrap().len(), 1);

        renderer.render(host_el("div", Props::new(), vec![]), container);
        drain(&mut renderer);
        assert!(renderer.host().children(div).unwrap().is_empty());
        // the div itself survived: only the component's subtree went away
        assert_eq!(renderer.host().children(container).unwrap(), &[div]);
    }

    #[test]
    fn starved_loop_resumes_from_its_cursor_and_converges() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        renderer.work_loop(&StarvedSlice).expect("first slice");
        // one unit processed, nothing committed yet
        assert!(renderer.has_pending_work());
        assert!(renderer.host().children(container).unwrap().is_empty());

        let mut slices = 1;
        while renderer.has_pending_work() {
            renderer.work_loop(&StarvedSlice).expect("resumed slice");
            slices += 1;
            assert!(slices < 100, "render never converged");
        }
        assert!(slices > 2, "expected the walk to span several slices");

        let (mut uninterrupted, container2) = new_renderer();
        uninterrupted.render(page(), container2);
        drain(&mut uninterrupted);
        assert_eq!(
            renderer.host().dump_tree(Some(container)),
            uninterrupted.host().dump_tree(Some(container2))
        );
    }

    #[test]
    fn superseding_a_mount_abandons_the_first_generation() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        renderer.work_loop(&StarvedSlice).expect("partial work");
        // a second render lands before the first generation commits
        renderer.render(
            host_el("div", Props::new(), vec![host_el("p", Props::new(), vec![])]),
            container,
        );
        drain(&mut renderer);
        let div = renderer.host().children(container).unwrap()[0];
        let children = renderer.host().children(div).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(renderer.host().tag(children[0]).unwrap(), "p");
    }

    #[test]
    fn event_props_register_listeners_on_mount() {
        let (mut renderer, container) = new_renderer();
        let clicked = std::rc::Rc::new(Cell::new(0u32));
        let handler = {
            let clicked = clicked.clone();
            EventHandler::new(move || clicked.set(clicked.get() + 1))
        };
        renderer.render(
            host_el(
                "button",
                Props::new().handler("click", handler),
                vec!["go".into()],
            ),
            container,
        );
        drain(&mut renderer);
        let button = renderer.host().children(container).unwrap()[0];
        renderer.host().dispatch(button, "click").unwrap();
        assert_eq!(clicked.get(), 1);
    }

    #[test]
    fn generations_are_reclaimed_after_commit() {
        let (mut renderer, container) = new_renderer();
        renderer.render(page(), container);
        drain(&mut renderer);
        let settled = renderer.arena.live();
        for _ in 0..5 {
            renderer.render(page(), container);
            drain(&mut renderer);
            assert_eq!(renderer.arena.live(), settled);
        }
    }
}
