//! Upstream media types and normalization
//!
//! The media list is requested with fields
//! `id,caption,media_type,media_url,thumbnail_url,permalink` and normalized
//! down to the caption/link/thumbnail tuple callers consume. Responses are
//! deserialized into typed records; a required field missing from an entry
//! fails that entry (and with it the whole fetch) rather than producing a
//! null value downstream.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// One normalized feed entry served to callers and persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub caption: Option<String>,
    pub link: String,
    pub thumbnail_url: String,
}

/// Media listing envelope as returned by `GET /me/media`.
#[derive(Debug, Deserialize)]
pub struct MediaList {
    pub data: Vec<MediaEntry>,
}

/// Raw media entry from the provider.
///
/// `media_url` and `thumbnail_url` are both optional on the wire: which one
/// is required depends on the media type (see `normalize`).
#[derive(Debug, Deserialize)]
pub struct MediaEntry {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub media_type: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub permalink: String,
}

impl MediaEntry {
    /// Normalize to the persisted tuple.
    ///
    /// Video items do not expose a playable thumbnail under `media_url`, so
    /// the dedicated `thumbnail_url` field is substituted for `VIDEO` and
    /// `media_url` is used for everything else.
    pub fn normalize(self) -> Result<FeedItem> {
        let thumbnail_url = if self.media_type == "VIDEO" {
            self.thumbnail_url
                .ok_or_else(|| missing_field(&self.id, "thumbnail_url"))?
        } else {
            self.media_url
                .ok_or_else(|| missing_field(&self.id, "media_url"))?
        };

        Ok(FeedItem {
            caption: self.caption,
            link: self.permalink,
            thumbnail_url,
        })
    }
}

fn missing_field(id: &str, field: &str) -> Error {
    warn!(media_id = id, field, "media entry missing required field");
    Error::Fetch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(media_type: &str, media_url: Option<&str>, thumbnail_url: Option<&str>) -> MediaEntry {
        MediaEntry {
            id: "17900000000000001".into(),
            caption: Some("spring collection".into()),
            media_type: media_type.into(),
            media_url: media_url.map(Into::into),
            thumbnail_url: thumbnail_url.map(Into::into),
            permalink: "https://www.instagram.com/p/abc123/".into(),
        }
    }

    #[test]
    fn image_uses_media_url() {
        let item = entry("IMAGE", Some("https://cdn.example/full.jpg"), None)
            .normalize()
            .unwrap();
        assert_eq!(item.thumbnail_url, "https://cdn.example/full.jpg");
        assert_eq!(item.link, "https://www.instagram.com/p/abc123/");
        assert_eq!(item.caption.as_deref(), Some("spring collection"));
    }

    #[test]
    fn video_substitutes_thumbnail_url() {
        let item = entry(
            "VIDEO",
            Some("https://cdn.example/clip.mp4"),
            Some("https://cdn.example/poster.jpg"),
        )
        .normalize()
        .unwrap();
        assert_eq!(item.thumbnail_url, "https://cdn.example/poster.jpg");
    }

    #[test]
    fn carousel_album_uses_media_url() {
        let item = entry("CAROUSEL_ALBUM", Some("https://cdn.example/first.jpg"), None)
            .normalize()
            .unwrap();
        assert_eq!(item.thumbnail_url, "https://cdn.example/first.jpg");
    }

    #[test]
    fn video_without_thumbnail_fails() {
        let err = entry("VIDEO", Some("https://cdn.example/clip.mp4"), None)
            .normalize()
            .unwrap_err();
        assert!(matches!(err, Error::Fetch));
    }

    #[test]
    fn image_without_media_url_fails() {
        let err = entry("IMAGE", None, Some("https://cdn.example/poster.jpg"))
            .normalize()
            .unwrap_err();
        assert!(matches!(err, Error::Fetch));
    }

    #[test]
    fn caption_is_optional_on_the_wire() {
        let json = r#"{
            "data": [
                {"id": "1", "media_type": "IMAGE",
                 "media_url": "https://cdn.example/a.jpg",
                 "permalink": "https://www.instagram.com/p/a/"}
            ]
        }"#;
        let list: MediaList = serde_json::from_str(json).unwrap();
        let item = list.data.into_iter().next().unwrap().normalize().unwrap();
        assert!(item.caption.is_none());
    }
}
