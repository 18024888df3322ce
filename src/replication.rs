//! Replication role
//!
//! A node is either the master (read/write) or a replica following a
//! master host. A replica rejects every mutating command; no data is
//! actually shipped between nodes.

use std::sync::RwLock;

use tracing::info;

use crate::error::{Error, Result};

/// Current role of this node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeRole {
    #[default]
    Master,
    Replica {
        master_host: String,
    },
}

#[derive(Debug, Default)]
pub struct ReplicationManager {
    role: RwLock<NodeRole>,
}

impl ReplicationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Result<NodeRole> {
        Ok(self.role.read().map_err(Error::poisoned)?.clone())
    }

    /// Switch to master (read/write)
    pub fn become_master(&self) -> Result<()> {
        *self.role.write().map_err(Error::poisoned)? = NodeRole::Master;
        info!("node is now master (read/write)");
        Ok(())
    }

    /// Switch to replica of `master_host` (read-only)
    pub fn become_replica(&self, master_host: &str) -> Result<()> {
        *self.role.write().map_err(Error::poisoned)? = NodeRole::Replica {
            master_host: master_host.to_string(),
        };
        info!(master_host, "node is now a read-only replica");
        Ok(())
    }

    /// Fail with [`Error::ReadOnlyReplica`] while this node is a replica
    pub fn ensure_writable(&self) -> Result<()> {
        match *self.role.read().map_err(Error::poisoned)? {
            NodeRole::Master => Ok(()),
            NodeRole::Replica { .. } => Err(Error::ReadOnlyReplica),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_switch() {
        let replication = ReplicationManager::new();
        assert_eq!(replication.role().unwrap(), NodeRole::Master);
        assert!(replication.ensure_writable().is_ok());

        replication.become_replica("10.0.0.1:7070").unwrap();
        assert!(matches!(
            replication.ensure_writable(),
            Err(Error::ReadOnlyReplica)
        ));
        assert_eq!(
            replication.role().unwrap(),
            NodeRole::Replica {
                master_host: "10.0.0.1:7070".to_string()
            }
        );

        replication.become_master().unwrap();
        assert!(replication.ensure_writable().is_ok());
    }
}
