//! # Subclient
//!
//! One connection slot of a multi-subclient client. Holds the current node
//! connection (if any), a closed flag, and the handle of its reader task.
//! Dialing and reading are driven by the owning [`MultiClient`].
//!
//! [`MultiClient`]: super::multi_client::MultiClient

use crate::domain::{Identity, NodeDescriptor};
use crate::ports::NodeConnection;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One connection slot.
pub struct Subclient {
    /// Slot index (`-1` for the original client).
    index: i32,
    /// Identity this slot connects as.
    identity: Identity,
    /// Current connection.
    connection: RwLock<Option<Arc<dyn NodeConnection>>>,
    /// Reader task of the current connection.
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Serializes dial attempts.
    pub(crate) dial_lock: tokio::sync::Mutex<()>,
    /// Set once; never cleared.
    closed: AtomicBool,
}

impl Subclient {
    /// Create a disconnected slot.
    pub fn new(index: i32, identity: Identity) -> Self {
        Self {
            index,
            identity,
            connection: RwLock::new(None),
            reader: Mutex::new(None),
            dial_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Slot index.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Identity of this slot.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Address of this slot.
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    /// Current connection, if open.
    pub fn connection(&self) -> Option<Arc<dyn NodeConnection>> {
        self.connection
            .read()
            .as_ref()
            .filter(|conn| conn.is_open())
            .cloned()
    }

    /// Node of the current connection, while it is open.
    pub fn node(&self) -> Option<NodeDescriptor> {
        self.connection().map(|conn| conn.node())
    }

    /// Whether an open connection is attached.
    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    /// Whether the slot was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Attach a fresh connection. Refused once the slot is closed.
    pub(crate) fn attach(&self, conn: Arc<dyn NodeConnection>) -> bool {
        let mut slot = self.connection.write();
        if self.is_closed() {
            return false;
        }
        *slot = Some(conn);
        true
    }

    /// Detach `conn` if it is still the current connection.
    pub(crate) fn detach(&self, conn: &Arc<dyn NodeConnection>) -> bool {
        let mut slot = self.connection.write();
        let current = slot
            .as_ref()
            .is_some_and(|c| same_connection(c, conn));
        if current {
            *slot = None;
        }
        current
    }

    /// Remember the reader task of the current connection.
    pub(crate) fn set_reader(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.reader.lock().replace(handle) {
            if !previous.is_finished() {
                previous.abort();
            }
        }
    }

    /// Close the slot and its connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let conn = self.connection.write().take();
        if let Some(conn) = conn {
            conn.close().await;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        debug!(subclient = self.index, address = %self.address(), "Subclient closed");
    }
}

/// Pointer identity of two connection handles.
fn same_connection(a: &Arc<dyn NodeConnection>, b: &Arc<dyn NodeConnection>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryNetwork;
    use crate::ports::NodeConnector;

    async fn dial(network: &MemoryNetwork, address: &str) -> Arc<dyn NodeConnection> {
        network
            .connect(&["http://seed".to_string()], address, &[])
            .await
            .unwrap()
    }

    fn slot(index: i32) -> Subclient {
        Subclient::new(index, Identity::derive(&[1; 32], "").subclient(index))
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let network = MemoryNetwork::new(1);
        let sub = slot(0);
        assert!(!sub.is_connected());

        let conn = dial(&network, sub.address()).await;
        assert!(sub.attach(Arc::clone(&conn)));
        assert!(sub.is_connected());
        assert_eq!(sub.node(), Some(network.nodes()[0].clone()));

        let other = dial(&network, sub.address()).await;
        assert!(!sub.detach(&other));
        assert!(sub.detach(&conn));
        assert!(!sub.is_connected());
    }

    #[tokio::test]
    async fn test_closed_connection_not_reported() {
        let network = MemoryNetwork::new(1);
        let sub = slot(1);
        let conn = dial(&network, sub.address()).await;
        sub.attach(Arc::clone(&conn));
        assert!(sub.node().is_some());

        conn.close().await;
        assert!(sub.connection().is_none());
        assert!(!sub.is_connected());
        assert!(sub.node().is_none());
    }

    #[tokio::test]
    async fn test_close_refuses_attach() {
        let network = MemoryNetwork::new(1);
        let sub = slot(-1);
        let conn = dial(&network, sub.address()).await;
        sub.attach(Arc::clone(&conn));

        sub.close().await;
        assert!(sub.is_closed());
        assert!(!conn.is_open());
        assert_eq!(network.connection_count(sub.address()), 0);

        let fresh = dial(&network, sub.address()).await;
        assert!(!sub.attach(fresh));
        sub.close().await;
    }
}
