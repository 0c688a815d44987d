//! Service name to port number lookup.

use crate::config::schema::PortConfig;

impl PortConfig {
    /// Port of the named service, if the service is known and the sum fits.
    pub fn port_for_service(&self, service: &str) -> Option<u16> {
        let offset = *self.offsets.get(service)?;
        self.base_port.checked_add(offset)
    }
}
