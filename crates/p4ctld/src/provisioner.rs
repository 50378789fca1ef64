//! Static forwarding rule installation.

use sonic_p4rt::{FieldMatch, P4RuntimeClient, TableAction, TableEntry};
use tracing::{debug, instrument};

use crate::config::ProvisioningConfig;
use crate::error::Fault;
use crate::fault::FaultReporter;
use crate::links::{LinkConfig, LinkSource};

/// Installs one LPM route per configured link.
#[derive(Debug, Clone)]
pub struct ConfigProvisioner {
    table: String,
    action: String,
    prefix_len: i32,
}

impl ConfigProvisioner {
    /// Creates a provisioner for the configured table and action.
    pub fn new(config: &ProvisioningConfig) -> Self {
        Self {
            table: config.table.clone(),
            action: config.action.clone(),
            prefix_len: config.prefix_len,
        }
    }

    /// Builds the table entry for one link: LPM on the address, direct
    /// action with (MAC, port).
    pub fn build_entry(&self, link: &LinkConfig) -> TableEntry {
        TableEntry::new(
            self.table.as_str(),
            vec![FieldMatch::lpm(link.ip.clone(), self.prefix_len)],
            TableAction::direct(self.action.as_str(), vec![link.mac.clone(), link.port.clone()]),
        )
    }

    /// Installs every link of `device_id` in order.
    ///
    /// Stops at the first failed insert, which is reported as a fault.
    /// Returns the number of entries installed.
    #[instrument(skip_all, fields(device_id = device_id))]
    pub async fn provision(
        &self,
        device_id: u64,
        links: &dyn LinkSource,
        client: &dyn P4RuntimeClient,
        faults: &FaultReporter,
    ) -> usize {
        let mut installed = 0;

        for link in links.links(device_id) {
            let entry = self.build_entry(&link);
            if let Err(e) = client.insert_table_entry(entry).await {
                faults.report(Fault::TableInsert {
                    table: self.table.clone(),
                    source: e,
                });
                return installed;
            }
            installed += 1;
            debug!(ip = ?link.ip, port = ?link.port, "Added table entry to device");
        }

        installed
    }
}
