//! Payload serialization capability.
//!
//! The store never interprets payload bytes. Callers hand it anything that
//! implements [`Payload`]; the bytes are written verbatim.

/// Converts a domain payload into the opaque bytes persisted with an event.
pub trait Payload: Sync {
    /// Serialize this payload.
    fn serialize_payload(&self) -> Vec<u8>;
}

impl Payload for [u8] {
    fn serialize_payload(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl Payload for Vec<u8> {
    fn serialize_payload(&self) -> Vec<u8> {
        self.clone()
    }
}

impl Payload for str {
    fn serialize_payload(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Payload for String {
    fn serialize_payload(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl Payload for serde_json::Value {
    fn serialize_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pass_through() {
        assert_eq!(vec![1u8, 2, 3].serialize_payload(), vec![1, 2, 3]);
        assert_eq!(b"raw"[..].serialize_payload(), b"raw".to_vec());
    }

    #[test]
    fn strings_are_utf8() {
        assert_eq!("héllo".serialize_payload(), "héllo".as_bytes());
        assert_eq!(String::from("x").serialize_payload(), b"x".to_vec());
    }

    #[test]
    fn json_value_is_compact() {
        let value = serde_json::json!({"test": "success"});
        assert_eq!(value.serialize_payload(), br#"{"test":"success"}"#.to_vec());
    }

    #[test]
    fn usable_as_trait_object() {
        struct Custom(u8);
        impl Payload for Custom {
            fn serialize_payload(&self) -> Vec<u8> {
                vec![self.0; 2]
            }
        }
        let payloads: Vec<Box<dyn Payload>> = vec![Box::new(Custom(7)), Box::new(vec![9u8])];
        let bytes: Vec<Vec<u8>> = payloads.iter().map(|p| p.serialize_payload()).collect();
        assert_eq!(bytes, vec![vec![7, 7], vec![9]]);
    }
}
