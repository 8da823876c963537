// Token lifecycle module
// Storage, decoding, expiry detection, and refresh of the JWT pair

pub mod decode;
pub mod manager;
pub mod store;
pub mod types;

pub use decode::decode_token;
pub use manager::{MaintenanceTask, TokenConfig, TokenManager};
pub use store::TokenStore;
pub use types::{MalformedToken, TokenClaims, TokenPair};
