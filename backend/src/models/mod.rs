use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub lat: f64,
    pub lng: f64,
}

/// A property offered for sale or rent, as stored in the `listings` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default)]
    pub user_ref: Option<String>,
    pub bedrooms: i16,
    pub bathrooms: i16,
    #[serde(default)]
    pub parking: bool,
    #[serde(default)]
    pub furnished: bool,
    #[serde(default)]
    pub offer: bool,
    pub regular_price: i64,
    #[serde(default)]
    pub discounted_price: Option<i64>,
    pub location: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub geolocation: Option<Geolocation>,
    pub timestamp: i64, // ms since epoch
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub data: Listing,
}

impl ListingRecord {
    pub fn cursor(&self) -> Cursor {
        Cursor {
            timestamp: self.data.timestamp,
            id: self.id.clone(),
        }
    }
}

/// Sort key of the last listing a query returned.
///
/// Listings are ordered by `(timestamp desc, id desc)`, so resuming after a
/// cursor means taking only records whose key is strictly smaller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: i64,
    pub id: String,
}

impl Cursor {
    pub fn admits(&self, record: &ListingRecord) -> bool {
        (record.data.timestamp, record.id.as_str()) < (self.timestamp, self.id.as_str())
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.timestamp, self.id))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || AppError::BadRequest("Invalid pagination cursor".to_string());

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (timestamp, id) = raw.split_once(':').ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            timestamp: timestamp.parse().map_err(|_| invalid())?,
            id: id.to_string(),
        })
    }
}

/// Document in the `users` collection, keyed by the account uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Signed-in account as seen by the views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub uid: String,
    #[serde(skip)]
    pub session_id: String,
    #[serde(skip)]
    pub token: String,
    pub display_name: Option<String>,
    pub email: String,
}

#[cfg(test)]
pub(crate) fn listing(id: &str, category: &str, timestamp: i64) -> ListingRecord {
    ListingRecord {
        id: id.to_string(),
        data: Listing {
            name: format!("Listing {}", id),
            category: category.to_string(),
            user_ref: None,
            bedrooms: 2,
            bathrooms: 1,
            parking: false,
            furnished: false,
            offer: false,
            regular_price: 1500,
            discounted_price: None,
            location: "12 Main Street".to_string(),
            image_urls: vec![],
            geolocation: None,
            timestamp,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_token_survives_encoding() {
        let cursor = Cursor {
            timestamp: 1_700_000_000_000,
            id: "abc:def".to_string(),
        };
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        assert!(matches!(Cursor::decode("!!!"), Err(AppError::BadRequest(_))));
        let no_id = URL_SAFE_NO_PAD.encode("1700:");
        assert!(Cursor::decode(&no_id).is_err());
        let bad_ts = URL_SAFE_NO_PAD.encode("yesterday:abc");
        assert!(Cursor::decode(&bad_ts).is_err());
    }

    #[test]
    fn cursor_admits_only_later_records_in_descending_order() {
        let cursor = listing("m", "rent", 100).cursor();
        assert!(cursor.admits(&listing("z", "rent", 99)));
        assert!(cursor.admits(&listing("a", "rent", 100)));
        assert!(!cursor.admits(&listing("m", "rent", 100)));
        assert!(!cursor.admits(&listing("z", "rent", 100)));
        assert!(!cursor.admits(&listing("a", "rent", 101)));
    }

    #[test]
    fn listing_uses_document_field_names() {
        let value = serde_json::to_value(&listing("x", "sale", 5).data).unwrap();
        assert_eq!(value["type"], "sale");
        assert_eq!(value["regularPrice"], 1500);
        assert!(value.get("category").is_none());
    }
}
