//! EAP Session Table
//!
//! Correlates the EAP identifier of an in-flight AKA' exchange with the
//! absolute N12 `eap-session` URI the AUSF returned for it. The table is
//! process-wide and shared by every handler invocation; per-key
//! transitions are effectively sequential because the RADIUS client keeps
//! a single identifier in flight per EAP exchange.

use dashmap::DashMap;
use rand::Rng;
use tracing::debug;

/// Concurrency-safe EAP-Id -> eap-session URI map
pub struct SessionTable {
    entries: DashMap<u8, String>,
    ausf_address: String,
    overwrite_link: bool,
}

impl SessionTable {
    pub fn new(ausf_address: impl Into<String>, overwrite_link: bool) -> Self {
        SessionTable {
            entries: DashMap::new(),
            ausf_address: ausf_address.into(),
            overwrite_link,
        }
    }

    /// Read the current binding for an EAP identifier
    pub fn load(&self, eap_id: u8) -> Option<String> {
        match self.entries.get(&eap_id) {
            Some(uri) => {
                debug!("[EAP id table] LOAD / key: 0x{:02X} / value: {}", eap_id, *uri);
                Some(uri.clone())
            }
            None => {
                debug!("[EAP id table] LOAD / key: 0x{:02X} / value not found", eap_id);
                None
            }
        }
    }

    /// Bind an EAP identifier to an eap-session URI, replacing any
    /// previous binding.
    ///
    /// With `overwriteLinkString` enabled, the authority of an `http://`
    /// URI is rewritten to the configured AUSF address (path preserved)
    /// so AUSF-advertised hosts are canonicalized before use.
    pub fn store(&self, eap_id: u8, uri: &str) {
        let value = self.rewrite_link(uri);
        debug!("[EAP id table] STORE / key: 0x{:02X} / value: {}", eap_id, value);
        self.entries.insert(eap_id, value);
    }

    /// Remove a binding; idempotent
    pub fn remove(&self, eap_id: u8) {
        match self.entries.remove(&eap_id) {
            Some((_, uri)) => {
                debug!("[EAP id table] DELETE / key: 0x{:02X} / value: {}", eap_id, uri)
            }
            None => debug!("[EAP id table] DELETE / key: 0x{:02X} / value not found", eap_id),
        }
    }

    /// Pick an EAP identifier not currently bound in the table.
    ///
    /// Used on the pseudonym/fast-reauth branch where the gateway invents
    /// the identifier itself; retrying on collision keeps it clear of ids
    /// still in flight against the AUSF.
    pub fn generate_eap_id(&self) -> u8 {
        let mut rng = rand::rng();
        loop {
            let id: u8 = rng.random_range(0..255);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    fn rewrite_link(&self, uri: &str) -> String {
        if !self.overwrite_link {
            return uri.to_string();
        }
        match uri.strip_prefix("http://") {
            Some(rest) => {
                let path = rest.split_once('/').map(|(_, p)| p).unwrap_or("");
                format!("http://{}/{}", self.ausf_address, path)
            }
            None => uri.to_string(),
        }
    }
}
