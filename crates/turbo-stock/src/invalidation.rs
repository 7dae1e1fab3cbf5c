//! Best-effort CDN cache invalidation.
//!
//! Separate from the KV cache: a changed product or category is announced
//! to an external edge cache as a list of tags. Failures never reach the
//! caller of the write that triggered them.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ids::{CategoryId, RewriteId, TemplateId};
use crate::InvalidationError;

/// Tag naming an entity whose rendered pages must be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheTag {
    Product(TemplateId),
    Category(CategoryId),
    Rewrite(RewriteId),
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTag::Product(id) => write!(f, "P{}", id),
            CacheTag::Category(id) => write!(f, "C{}", id),
            CacheTag::Rewrite(id) => write!(f, "WR{}", id),
        }
    }
}

/// Tags for a product write: the product itself plus each of its public
/// categories, once each.
pub fn product_tags(template: TemplateId, categories: &[CategoryId]) -> Vec<CacheTag> {
    std::iter::once(CacheTag::Product(template))
        .chain(categories.iter().copied().map(CacheTag::Category))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// `[invalidation]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            key: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Sink for invalidation tags.
pub trait Notifier {
    fn notify(&self, tags: &[CacheTag]) -> Result<(), InvalidationError>;
}

/// Sends tags to an HTTP endpoint as `GET <url>?key=..&tag=..&tag=..`.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::blocking::Client,
    url: Url,
    key: String,
}

impl HttpNotifier {
    pub fn new(url: &str, key: impl Into<String>, timeout: Duration) -> Result<Self, InvalidationError> {
        let url = Url::parse(url).map_err(|e| InvalidationError::Config(format!("url {}: {}", url, e)))?;
        let key = key.into();
        if key.trim().is_empty() {
            return Err(InvalidationError::Config("key is empty".to_string()));
        }
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, key })
    }

    /// Build a notifier from settings. Returns `None` when notifications are
    /// disabled or the url/key pair is incomplete.
    pub fn from_config(config: &InvalidationConfig) -> Result<Option<Self>, InvalidationError> {
        if !config.enabled {
            return Ok(None);
        }
        match (config.url.as_deref(), config.key.as_deref()) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                Self::new(url, key, Duration::from_millis(config.timeout_ms)).map(Some)
            }
            _ => {
                debug!("cache invalidation enabled without url and key");
                Ok(None)
            }
        }
    }

    /// Full request URL for a set of tags.
    pub fn request_url(&self, tags: &[CacheTag]) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &self.key);
            for tag in tags {
                query.append_pair("tag", &tag.to_string());
            }
        }
        url
    }
}

impl Notifier for HttpNotifier {
    fn notify(&self, tags: &[CacheTag]) -> Result<(), InvalidationError> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .get(self.request_url(tags))
            .send()?
            .error_for_status()?;
        debug!(tags = tags.len(), "cache invalidation sent");
        Ok(())
    }
}

/// Notify and swallow any failure. Returns whether the notification went out.
pub fn notify_best_effort<N: Notifier + ?Sized>(notifier: Option<&N>, tags: &[CacheTag]) -> bool {
    let Some(notifier) = notifier else {
        return false;
    };
    match notifier.notify(tags) {
        Ok(()) => true,
        Err(e) => {
            let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
            warn!(error = %e, tags = ?tags, "cache invalidation failed");
            false
        }
    }
}

/// Shared secret the edge cache checks on every invalidation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationKey(String);

impl InvalidationKey {
    /// Generate a random URL-safe key.
    pub fn generate() -> Self {
        let bytes: [u8; 24] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        sent: RefCell<Vec<Vec<CacheTag>>>,
        fail: bool,
    }

    impl Notifier for Recorder {
        fn notify(&self, tags: &[CacheTag]) -> Result<(), InvalidationError> {
            if self.fail {
                return Err(InvalidationError::Config("down".to_string()));
            }
            self.sent.borrow_mut().push(tags.to_vec());
            Ok(())
        }
    }

    fn notifier() -> HttpNotifier {
        HttpNotifier::new("https://cdn.example.com/purge", "s3cret", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_tag_format() {
        assert_eq!(CacheTag::Product(TemplateId::new(7)).to_string(), "P7");
        assert_eq!(CacheTag::Category(CategoryId::new(3)).to_string(), "C3");
        assert_eq!(CacheTag::Rewrite(RewriteId::new(12)).to_string(), "WR12");
    }

    #[test]
    fn test_product_tags_include_categories() {
        let tags = product_tags(TemplateId::new(1), &[CategoryId::new(4), CategoryId::new(5)]);
        let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["P1", "C4", "C5"]);
    }

    #[test]
    fn test_product_tags_drop_repeated_categories() {
        let categories = [CategoryId::new(5), CategoryId::new(4), CategoryId::new(5)];
        let tags = product_tags(TemplateId::new(1), &categories);
        let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["P1", "C4", "C5"]);
    }

    #[test]
    fn test_request_url_repeats_tag_param() {
        let url = notifier().request_url(&[
            CacheTag::Product(TemplateId::new(1)),
            CacheTag::Category(CategoryId::new(2)),
        ]);
        assert_eq!(url.as_str(), "https://cdn.example.com/purge?key=s3cret&tag=P1&tag=C2");
    }

    #[test]
    fn test_from_config_disabled_or_incomplete() {
        let mut config = InvalidationConfig::default();
        assert!(HttpNotifier::from_config(&config).unwrap().is_none());

        config.enabled = true;
        config.url = Some("https://cdn.example.com/purge".to_string());
        assert!(HttpNotifier::from_config(&config).unwrap().is_none());

        config.key = Some("k".to_string());
        assert!(HttpNotifier::from_config(&config).unwrap().is_some());
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = HttpNotifier::new("not a url", "k", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, InvalidationError::Config(_)));
    }

    #[test]
    fn test_best_effort_swallows_failures() {
        let ok = Recorder { sent: RefCell::new(Vec::new()), fail: false };
        let down = Recorder { sent: RefCell::new(Vec::new()), fail: true };
        let tags = [CacheTag::Product(TemplateId::new(1))];

        assert!(notify_best_effort(Some(&ok), &tags));
        assert_eq!(ok.sent.borrow().len(), 1);
        assert!(!notify_best_effort(Some(&down), &tags));
        assert!(!notify_best_effort::<Recorder>(None, &tags));
    }

    #[test]
    fn test_unreachable_endpoint_is_swallowed() {
        let notifier =
            HttpNotifier::new("http://127.0.0.1:1/purge", "k", Duration::from_millis(200)).unwrap();
        assert!(!notify_best_effort(Some(&notifier), &[CacheTag::Rewrite(RewriteId::new(1))]));
    }

    #[test]
    fn test_generated_keys_are_url_safe_and_distinct() {
        let a = InvalidationKey::generate();
        let b = InvalidationKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
