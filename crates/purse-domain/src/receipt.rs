//! Receipt images owned by at most one transaction.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::common::{new_record_id, Identifiable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    #[serde(serialize_with = "encode_image", deserialize_with = "decode_image")]
    pub image: Vec<u8>,
}

impl Receipt {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            id: new_record_id(),
            image,
        }
    }
}

impl Identifiable for Receipt {
    fn id(&self) -> &str {
        &self.id
    }
}

fn encode_image<S>(image: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(image))
}

fn decode_image<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
}
