//! Message propagation across the forward graph
//!
//! A publish pass visits the origin dispatcher, then every dispatcher
//! reachable through forward edges, depth first, and finally the global
//! dispatcher. Each dispatcher is visited at most once per pass, so cycles
//! in the forward graph are harmless.

use smallvec::SmallVec;
use tracing::trace;

use crate::error::EventError;
use crate::hub::HubShared;
use crate::message::{Envelope, Message};
use crate::node::NodeId;

/// State carried through one publish pass
struct Propagation<'a> {
    hub: &'a HubShared,
    envelope: Envelope<'a>,
    visited: SmallVec<[NodeId; 8]>,
    invocations: usize,
}

impl<'a> Propagation<'a> {
    fn new(hub: &'a HubShared, envelope: Envelope<'a>) -> Self {
        Self {
            hub,
            envelope,
            visited: SmallVec::new(),
            invocations: 0,
        }
    }

    fn visit(&mut self, id: NodeId) -> Result<(), EventError> {
        if self.visited.contains(&id) {
            return Ok(());
        }
        self.visited.push(id);

        // Removed while a forward edge still pointed at it
        let Some(node) = self.hub.node(id) else {
            return Ok(());
        };
        node.record_received();

        let tables = node.snapshot_tables(self.envelope.type_id, &self.hub.registry);
        for table in &tables {
            let invoked = table.dispatch(&self.hub.registry, &self.envelope)?;
            node.record_invocations(invoked);
            self.invocations += invoked;
        }

        let forwards = node.live_forwards(|target| self.hub.is_alive(target));
        for target in forwards {
            self.visit(target)?;
        }

        if id != self.hub.global {
            self.visit(self.hub.global)?;
        }
        Ok(())
    }
}

/// Publishes `message` starting at `origin`.
///
/// The first listener error aborts the pass and is returned unchanged.
pub(crate) fn publish<M: Message>(
    hub: &HubShared,
    origin: NodeId,
    message: &M,
) -> Result<(), EventError> {
    let node = hub.node(origin).ok_or(EventError::NodeNotFound(origin))?;
    hub.registry.register::<M>();
    node.record_published();

    let mut pass = Propagation::new(hub, Envelope::new(message));
    let result = pass.visit(origin);

    if hub.config.trace_publishes {
        trace!(
            "📤 Published {} from '{}': {} dispatchers visited, {} listeners invoked{}",
            pass.envelope.type_name,
            node.name(),
            pass.visited.len(),
            pass.invocations,
            if result.is_err() { " (aborted)" } else { "" }
        );
    }
    result
}
