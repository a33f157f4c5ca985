//! Test doubles and harness for the Weft engine: a recording host
//! adapter that logs every mutation command, and deterministic time
//! slices for driving the render loop by hand.

use std::cell::Cell;
use std::time::Duration;

use weft_core::{
    ElementKind, EventHandler, HostAdapter, HostError, HostId, MemoryHost, PropValue, Renderer,
    TimeSlice,
};

/// One observed adapter call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create { id: HostId, kind: String },
    SetAttr { node: HostId, name: String },
    ClearAttr { node: HostId, name: String },
    AttachListener { node: HostId, event: String },
    DetachListener { node: HostId, event: String },
    SetText { node: HostId, value: String },
    Attach { parent: HostId, child: HostId },
    Detach { parent: HostId, child: HostId },
}

/// Host adapter double: delegates every call to an inner [`MemoryHost`]
/// while recording it. `apply_prop_diff` is deliberately not overridden,
/// so the engine's diff ordering shows up as a sequence of primitive
/// ops.
#[derive(Default)]
pub struct RecordingHost {
    inner: MemoryHost,
    ops: Vec<HostOp>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// The tree underneath, for structural assertions and dispatching.
    pub fn memory(&self) -> &MemoryHost {
        &self.inner
    }
}

impl HostAdapter for RecordingHost {
    fn create_node(&mut self, kind: &ElementKind) -> Result<HostId, HostError> {
        let id = self.inner.create_node(kind)?;
        self.ops.push(HostOp::Create {
            id,
            kind: format!("{kind:?}"),
        });
        Ok(id)
    }

    fn set_attribute(
        &mut self,
        node: HostId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.inner.set_attribute(node, name, value)?;
        self.ops.push(HostOp::SetAttr {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn clear_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError> {
        self.inner.clear_attribute(node, name)?;
        self.ops.push(HostOp::ClearAttr {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn attach_listener(
        &mut self,
        node: HostId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.inner.attach_listener(node, event, handler)?;
        self.ops.push(HostOp::AttachListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn detach_listener(&mut self, node: HostId, event: &str) -> Result<(), HostError> {
        self.inner.detach_listener(node, event)?;
        self.ops.push(HostOp::DetachListener {
            node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn set_text(&mut self, node: HostId, value: &str) -> Result<(), HostError> {
        self.inner.set_text(node, value)?;
        self.ops.push(HostOp::SetText {
            node,
            value: value.to_owned(),
        });
        Ok(())
    }

    fn attach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        self.inner.attach(parent, child)?;
        self.ops.push(HostOp::Attach { parent, child });
        Ok(())
    }

    fn detach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        self.inner.detach(parent, child)?;
        self.ops.push(HostOp::Detach { parent, child });
        Ok(())
    }
}

/// A slice that never runs out: the loop drains the whole tree in one
/// invocation.
#[derive(Debug, Default)]
pub struct UnlimitedSlice;

impl TimeSlice for UnlimitedSlice {
    fn remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// A slice that permits exactly `units` units of work before reporting
/// an exhausted budget, for exercising yield-and-resume behavior
/// deterministically.
#[derive(Debug)]
pub struct CountedSlice {
    left: Cell<u32>,
}

impl CountedSlice {
    pub fn new(units: u32) -> Self {
        Self {
            left: Cell::new(units),
        }
    }
}

impl TimeSlice for CountedSlice {
    fn remaining(&self) -> Duration {
        let left = self.left.get();
        if left <= 1 {
            self.left.set(0);
            Duration::ZERO
        } else {
            self.left.set(left - 1);
            Duration::from_secs(1)
        }
    }
}

/// Runs the work loop with unlimited slices until the renderer goes
/// idle.
pub fn drain<H: HostAdapter>(renderer: &mut Renderer<H>) -> Result<(), HostError> {
    while renderer.has_pending_work() {
        renderer.work_loop(&UnlimitedSlice)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counted_slice_permits_the_requested_units() {
        let slice = CountedSlice::new(2);
        assert!(slice.remaining() > Duration::ZERO);
        assert_eq!(slice.remaining(), Duration::ZERO);
        assert_eq!(slice.remaining(), Duration::ZERO);
    }

    #[test]
    fn recording_host_logs_in_issue_order() {
        let mut host = RecordingHost::new();
        let a = host.create_node(&ElementKind::host("div")).unwrap();
        let b = host.create_node(&ElementKind::Text("x".into())).unwrap();
        host.attach(a, b).unwrap();
        host.detach(a, b).unwrap();
        let ops = host.take_ops();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[2], HostOp::Attach { parent: a, child: b });
        assert_eq!(ops[3], HostOp::Detach { parent: a, child: b });
        assert!(host.ops().is_empty());
    }
}
