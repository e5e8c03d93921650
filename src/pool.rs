//! Credential/model rotation pool.
//!
//! Walks the cross product of API keys and models round-robin, keeping one
//! pair active. A rotation sweeps at most one full cycle, so a pool where
//! every key is dead reports exhaustion instead of spinning.

use crate::backend::{Connector, Session};
use crate::utils::mask_key;
use tracing::{debug, info, warn};

/// The currently active credential/model pair and its live session.
pub struct ActiveConfig {
    /// Position in the rotation order.
    pub index: usize,
    /// Masked API key, safe to print.
    pub label: String,
    /// Model identifier.
    pub model: String,
    session: Box<dyn Session>,
}

impl ActiveConfig {
    /// Returns the live session for this pair.
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }
}

/// Round-robin pool over every (API key, model) pair.
pub struct RotationPool {
    connector: Box<dyn Connector>,
    credentials: Vec<String>,
    models: Vec<String>,
    cursor: Option<usize>,
    active: Option<ActiveConfig>,
}

impl RotationPool {
    /// Creates a pool. Nothing is activated until [`activate_next`](Self::activate_next).
    pub fn new(connector: Box<dyn Connector>, credentials: Vec<String>, models: Vec<String>) -> Self {
        Self {
            connector,
            credentials,
            models,
            cursor: None,
            active: None,
        }
    }

    /// Total number of credential/model pairs.
    pub fn len(&self) -> usize {
        self.credentials.len() * self.models.len()
    }

    /// Returns true if there is nothing to rotate through.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the active configuration, if one has ever been established.
    pub fn active(&self) -> Option<&ActiveConfig> {
        self.active.as_ref()
    }

    /// Returns the credential and model at `index` in rotation order.
    ///
    /// Keys vary fastest, so a quota hit moves to another key before
    /// giving up on the preferred model.
    fn pair(&self, index: usize) -> (&str, &str) {
        let keys = self.credentials.len();
        (
            &self.credentials[index % keys],
            &self.models[(index / keys) % self.models.len()],
        )
    }

    /// Advances to the next pair that can be activated.
    ///
    /// Tries each pair at most once, starting after the current one. On
    /// success the pair becomes active and `true` is returned. When every
    /// pair fails, the previous active configuration (if any) is kept and
    /// `false` is returned.
    pub async fn activate_next(&mut self) -> bool {
        let total = self.len();
        if total == 0 {
            warn!("Rotation pool has no credential/model pairs");
            return false;
        }

        let start = self.cursor.map_or(0, |c| c + 1);
        for offset in 0..total {
            let index = (start + offset) % total;
            self.cursor = Some(index);

            let (credential, model) = self.pair(index);
            let label = mask_key(credential);
            let model = model.to_string();

            match self.connector.connect(credential, &model).await {
                Ok(session) => {
                    info!(key = %label, model = %model, "Activated API configuration");
                    self.active = Some(ActiveConfig {
                        index,
                        label,
                        model,
                        session,
                    });
                    return true;
                }
                Err(e) => {
                    debug!(key = %label, model = %model, error = %e, "Activation failed");
                }
            }
        }

        warn!(
            pairs = total,
            backend = self.connector.name(),
            "Every credential/model pair failed to activate"
        );
        false
    }
}
