mod token;

pub use token::{CapabilityTokens, TokenCost};
