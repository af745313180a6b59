/// Noticeboard key helpers
///
/// VAPID application-server keys travel as unpadded URL-safe base64; the
/// platform subscribe call needs the raw bytes. This crate converts between
/// the two and checks the key shape push services accept.
pub mod vapid;

pub use vapid::{APPLICATION_SERVER_KEY_LEN, decode_vapid_key, encode_vapid_key, is_uncompressed_p256};
