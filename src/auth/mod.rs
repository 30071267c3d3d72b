//! Credential persistence over the same backends as the store.

pub mod buffer_json;
pub mod key_store;

pub use buffer_json::{BufferBytes, decode_bytes, encode_bytes};
pub use key_store::{AuthStateStore, CREDS_KEY, KeyData, auth_key};
