//! CMS documents for the public homepage and branch pages.
//!
//! Both documents are edited as a whole from the dashboard and stored as
//! JSON. Missing fields deserialize to empty values so older documents keep
//! loading as the shape grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BranchId, ServiceId};

/// Maximum number of images in a gallery.
pub const MAX_GALLERY_IMAGES: usize = 12;

/// Validation failures for CMS documents.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("{0} cannot be empty")]
    MissingField(&'static str),

    #[error("gallery has {count} images, at most {max} allowed")]
    GalleryTooLarge { count: usize, max: usize },

    #[error("announcement '{0}' ends before it starts")]
    InvertedAnnouncement(String),

    #[error("image url must be http(s): {0}")]
    InvalidImageUrl(String),
}

/// A hosted image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    /// Hosting provider's identifier, used to delete the asset.
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub alt: String,
}

impl ImageRef {
    fn validate(&self) -> Result<(), ContentError> {
        if self.url.starts_with("https://") || self.url.starts_with("http://") {
            Ok(())
        } else {
            Err(ContentError::InvalidImageUrl(self.url.clone()))
        }
    }
}

/// Homepage banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hero {
    pub title: String,
    pub subtitle: String,
    pub image: Option<ImageRef>,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
}

/// A titled block of copy with an optional picture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Section {
    pub title: String,
    pub body: String,
    pub image: Option<ImageRef>,
}

/// A client quote shown on the homepage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Testimonial {
    pub author: String,
    pub quote: String,
    pub rating: Option<u8>,
}

/// The public homepage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomepageContent {
    pub hero: Hero,
    pub about: Section,
    pub highlights: Vec<Section>,
    pub featured_service_ids: Vec<ServiceId>,
    pub testimonials: Vec<Testimonial>,
    pub gallery: Vec<ImageRef>,
}

impl HomepageContent {
    /// Check the document before saving.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.hero.title.trim().is_empty() {
            return Err(ContentError::MissingField("hero title"));
        }
        validate_gallery(&self.gallery)?;
        for image in self
            .hero
            .image
            .iter()
            .chain(self.about.image.iter())
            .chain(self.highlights.iter().filter_map(|s| s.image.as_ref()))
        {
            image.validate()?;
        }
        Ok(())
    }
}

/// A time-boxed notice on a branch page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Announcement {
    /// Whether the announcement should be shown at `now`.
    #[must_use]
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|s| s <= now) && self.ends_at.is_none_or(|e| now < e)
    }
}

/// A branch's public page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchContent {
    pub branch_id: BranchId,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover: Option<ImageRef>,
    #[serde(default)]
    pub gallery: Vec<ImageRef>,
    #[serde(default)]
    pub featured_service_ids: Vec<ServiceId>,
    #[serde(default)]
    pub announcements: Vec<Announcement>,
}

impl BranchContent {
    /// An empty page for a branch that has no content yet.
    #[must_use]
    pub const fn empty(branch_id: BranchId) -> Self {
        Self {
            branch_id,
            tagline: String::new(),
            description: String::new(),
            cover: None,
            gallery: Vec::new(),
            featured_service_ids: Vec::new(),
            announcements: Vec::new(),
        }
    }

    /// Check the document before saving.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ContentError> {
        validate_gallery(&self.gallery)?;
        if let Some(cover) = &self.cover {
            cover.validate()?;
        }
        validate_announcements(&self.announcements)
    }

    /// Copy of the page with only announcements visible at `now`.
    #[must_use]
    pub fn visible_at(&self, now: DateTime<Utc>) -> Self {
        let mut page = self.clone();
        page.announcements.retain(|a| a.is_visible_at(now));
        page
    }
}

fn validate_announcements(announcements: &[Announcement]) -> Result<(), ContentError> {
    for a in announcements {
        if a.title.trim().is_empty() {
            return Err(ContentError::MissingField("announcement title"));
        }
        if let (Some(start), Some(end)) = (a.starts_at, a.ends_at)
            && end <= start
        {
            return Err(ContentError::InvertedAnnouncement(a.title.clone()));
        }
    }
    Ok(())
}

fn validate_gallery(gallery: &[ImageRef]) -> Result<(), ContentError> {
    if gallery.len() > MAX_GALLERY_IMAGES {
        return Err(ContentError::GalleryTooLarge {
            count: gallery.len(),
            max: MAX_GALLERY_IMAGES,
        });
    }
    gallery.iter().try_for_each(ImageRef::validate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn image(url: &str) -> ImageRef {
        ImageRef {
            url: url.to_string(),
            public_id: None,
            alt: String::new(),
        }
    }

    #[test]
    fn test_homepage_requires_hero_title() {
        let page = HomepageContent::default();
        assert_eq!(page.validate(), Err(ContentError::MissingField("hero title")));
    }

    #[test]
    fn test_gallery_limit() {
        let mut page = HomepageContent::default();
        page.hero.title = "Look good, feel good".to_string();
        page.gallery = vec![image("https://cdn.example.com/a.jpg"); MAX_GALLERY_IMAGES + 1];
        assert!(matches!(
            page.validate(),
            Err(ContentError::GalleryTooLarge { .. })
        ));
    }

    #[test]
    fn test_rejects_non_http_image() {
        let mut branch = BranchContent::empty(BranchId::new(1));
        branch.cover = Some(image("javascript:alert(1)"));
        assert!(matches!(
            branch.validate(),
            Err(ContentError::InvalidImageUrl(_))
        ));
    }

    #[test]
    fn test_announcement_window() {
        let now = Utc::now();
        let mut branch = BranchContent::empty(BranchId::new(3));
        branch.announcements = vec![
            Announcement {
                title: "Holiday hours".to_string(),
                body: String::new(),
                starts_at: Some(now - Duration::days(1)),
                ends_at: Some(now + Duration::days(1)),
            },
            Announcement {
                title: "Expired promo".to_string(),
                body: String::new(),
                starts_at: None,
                ends_at: Some(now - Duration::hours(1)),
            },
        ];
        assert!(branch.validate().is_ok());

        let visible = branch.visible_at(now);
        assert_eq!(visible.announcements.len(), 1);
        assert_eq!(visible.announcements[0].title, "Holiday hours");
    }

    #[test]
    fn test_inverted_announcement() {
        let now = Utc::now();
        let mut branch = BranchContent::empty(BranchId::new(3));
        branch.announcements = vec![Announcement {
            title: "Oops".to_string(),
            body: String::new(),
            starts_at: Some(now),
            ends_at: Some(now - Duration::minutes(5)),
        }];
        assert_eq!(
            branch.validate(),
            Err(ContentError::InvertedAnnouncement("Oops".to_string()))
        );
    }

    #[test]
    fn test_partial_document_loads() {
        let page: HomepageContent =
            serde_json::from_str(r#"{"hero":{"title":"Welcome"}}"#).unwrap();
        assert_eq!(page.hero.title, "Welcome");
        assert!(page.gallery.is_empty());
    }

    #[test]
    fn test_homepage_checks_section_images() {
        let mut page = HomepageContent::default();
        page.hero.title = "Welcome".to_string();
        page.hero.image = Some(image("https://cdn.example.com/hero.jpg"));
        page.highlights = vec![Section {
            title: "Colour".to_string(),
            body: String::new(),
            image: Some(image("https://cdn.example.com/colour.jpg")),
        }];
        assert!(page.validate().is_ok());

        page.highlights[0].image = Some(image("ftp://cdn.example.com/colour.jpg"));
        assert!(matches!(
            page.validate(),
            Err(ContentError::InvalidImageUrl(_))
        ));
    }
}
