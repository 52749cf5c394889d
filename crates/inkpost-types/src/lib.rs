pub mod api;
pub mod claims;
pub mod models;

/// Largest identity that survives a round trip through an IEEE-754 double.
/// Token claims are JSON numbers, so ids above this are refused at issue time.
pub const MAX_SAFE_ID: u64 = 1 << 53;
