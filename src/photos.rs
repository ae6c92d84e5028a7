use anyhow::{Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A post as supplied by the feed. Only posts with an image become part of the galaxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    #[serde(default, alias = "imgUrl")]
    pub img_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl Photo {
    pub fn new(id: &str, img_url: &str) -> Self {
        Self {
            id: id.to_string(),
            img_url: Some(img_url.to_string()),
            caption: None,
        }
    }

    fn has_image(&self) -> bool {
        self.img_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Ordered, read-only list of photos the browser indexes into.
#[derive(Debug, Clone, Default)]
pub struct PhotoCollection {
    photos: Vec<Photo>,
}

impl PhotoCollection {
    /// Keeps feed order, dropping posts without an image.
    pub fn from_posts(posts: Vec<Photo>) -> Self {
        let total = posts.len();
        let photos: Vec<Photo> = posts.into_iter().filter(Photo::has_image).collect();
        if photos.len() < total {
            debug!("skipped {} post(s) without an image", total - photos.len());
        }
        Self { photos }
    }

    pub fn from_json_str(txt: &str) -> Result<Self> {
        let posts: Vec<Photo> = serde_json::from_str(txt)?;
        Ok(Self::from_posts(posts))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let photos = Self::from_json_str(&txt)
            .map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        info!("loaded {} photo(s) from {}", photos.len(), path.display());
        Ok(photos)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Photo> {
        self.photos.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.photos.iter().position(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Photo> {
        self.photos.iter()
    }

    /// Position label shown under the photo in the detail view, e.g. "2 / 5".
    pub fn counter(&self, index: usize) -> Option<String> {
        (index < self.len()).then(|| format!("{} / {}", index + 1, self.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"id": "a", "img_url": "https://img/a.jpg", "caption": "sunset"},
        {"id": "b"},
        {"id": "c", "imgUrl": "https://img/c.jpg"},
        {"id": "d", "img_url": "  "},
        {"id": "e", "img_url": "https://img/e.jpg", "caption": null}
    ]"#;

    #[test]
    fn drops_posts_without_images() {
        let photos = PhotoCollection::from_json_str(FEED).unwrap();
        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "e"]);
        assert_eq!(photos.get(0).unwrap().caption.as_deref(), Some("sunset"));
    }

    #[test]
    fn looks_up_by_id() {
        let photos = PhotoCollection::from_json_str(FEED).unwrap();
        assert_eq!(photos.index_of("c"), Some(1));
        assert_eq!(photos.index_of("b"), None);
        assert_eq!(photos.index_of("zzz"), None);
    }

    #[test]
    fn counter_is_one_based() {
        let photos = PhotoCollection::from_posts(vec![
            Photo::new("x", "u1"),
            Photo::new("y", "u2"),
        ]);
        assert_eq!(photos.counter(0).as_deref(), Some("1 / 2"));
        assert_eq!(photos.counter(1).as_deref(), Some("2 / 2"));
        assert_eq!(photos.counter(2), None);
        assert_eq!(PhotoCollection::default().counter(0), None);
    }

    #[test]
    fn rejects_non_array_json() {
        assert!(PhotoCollection::from_json_str("{\"id\": \"a\"}").is_err());
    }
}
