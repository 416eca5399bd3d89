use std::fmt;

/// Last step an account completed. An account that fails keeps the stage it
/// had reached, which is where manual reconciliation has to pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationStage {
    Pending,
    TrustGranted,
    RemovedFromSource,
    Invited,
    /// Handshake accepted and trust narrowed to the target organization.
    Accepted,
    Placed,
}

impl MigrationStage {
    /// Whether the account has already left the source organization.
    pub fn left_source(self) -> bool {
        self >= MigrationStage::RemovedFromSource
    }
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Pending => "PENDING",
            MigrationStage::TrustGranted => "TRUST_GRANTED",
            MigrationStage::RemovedFromSource => "REMOVED_FROM_SOURCE",
            MigrationStage::Invited => "INVITED",
            MigrationStage::Accepted => "ACCEPTED/TRUST_FINALIZED",
            MigrationStage::Placed => "PLACED",
        };
        f.write_str(name)
    }
}
