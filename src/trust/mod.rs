pub mod editor;
pub mod policy;

pub use editor::{GrantOutcome, TrustPolicyEditor};
pub use policy::{Effect, Principal, Statement, TrustPolicyDocument};
