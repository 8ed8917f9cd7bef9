//! RSS 2.0 feed synthesis.
//!
//! [`synthesize`] is a pure projection of the catalog onto a [`FeedDocument`]; only
//! [`write_rss`] touches XML. Item order always equals catalog order.

use std::io::Write;

use rss::{
    Channel, Enclosure, Guid, Image, Item, extension::itunes::ITunesItemExtension,
};
use thiserror::Error;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc2822};

use crate::domain::entities::EpisodeRecord;

pub const ENCLOSURE_MIME_TYPE: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum SyndicationError {
    #[error("failed to serialize feed: {0}")]
    Serialize(String),
    #[error("failed to write feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Static feed-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub title: String,
    pub link: String,
    pub description: String,
    pub image_url: Option<String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            title: "GopherPods".to_owned(),
            link: "https://gopherpods.appspot.com".to_owned(),
            description: "Podcasts about Go (golang)".to_owned(),
            image_url: None,
        }
    }
}

/// Which link an item carries. The guid is the episode URL in both flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFlavor {
    /// Item link is the episode page; served at `/feed`.
    Web,
    /// Item link is the media asset; served at `/podcast/feed`.
    Podcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEnclosure {
    pub url: String,
    pub length: i64,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub guid: String,
    pub published: Date,
    pub enclosure: FeedEnclosure,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub image_url: Option<String>,
    pub last_build: OffsetDateTime,
    pub items: Vec<FeedItem>,
}

pub fn synthesize(
    settings: &FeedSettings,
    flavor: FeedFlavor,
    episodes: &[EpisodeRecord],
) -> FeedDocument {
    FeedDocument {
        title: settings.title.clone(),
        link: settings.link.clone(),
        description: settings.description.clone(),
        image_url: settings.image_url.clone(),
        last_build: OffsetDateTime::now_utc(),
        items: episodes
            .iter()
            .map(|episode| feed_item(flavor, episode))
            .collect(),
    }
}

fn feed_item(flavor: FeedFlavor, episode: &EpisodeRecord) -> FeedItem {
    let link = match flavor {
        FeedFlavor::Web => episode.episode_url.clone(),
        FeedFlavor::Podcast => episode.media_or_episode_url().to_owned(),
    };

    FeedItem {
        title: format!("{} - {}", episode.show, episode.title),
        link,
        description: episode.description.clone(),
        guid: episode.episode_url.clone(),
        published: episode.episode_date,
        enclosure: FeedEnclosure {
            url: episode.media_or_episode_url().to_owned(),
            length: episode.size_bytes.unwrap_or(0),
            mime_type: ENCLOSURE_MIME_TYPE,
        },
        duration: episode.runtime_seconds.map(format_duration),
    }
}

/// `HH:MM:SS`, the form podcast clients parse most reliably.
fn format_duration(seconds: i32) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn rfc2822(at: OffsetDateTime) -> Option<String> {
    at.format(&Rfc2822).ok()
}

fn to_channel(document: &FeedDocument) -> Channel {
    let mut channel = Channel::default();
    channel.set_title(document.title.as_str());
    channel.set_link(document.link.as_str());
    channel.set_description(document.description.as_str());
    channel.set_last_build_date(rfc2822(document.last_build));

    if let Some(url) = &document.image_url {
        let mut image = Image::default();
        image.set_url(url.as_str());
        image.set_title(document.title.as_str());
        image.set_link(document.link.as_str());
        channel.set_image(image);
    }

    let items: Vec<Item> = document.items.iter().map(to_rss_item).collect();
    channel.set_items(items);
    channel
}

fn to_rss_item(item: &FeedItem) -> Item {
    let mut guid = Guid::default();
    guid.set_value(item.guid.as_str());
    guid.set_permalink(true);

    let mut enclosure = Enclosure::default();
    enclosure.set_url(item.enclosure.url.as_str());
    enclosure.set_length(item.enclosure.length.to_string());
    enclosure.set_mime_type(item.enclosure.mime_type);

    let mut rss_item = Item::default();
    rss_item.set_title(item.title.clone());
    rss_item.set_link(item.link.clone());
    rss_item.set_description(item.description.clone());
    rss_item.set_guid(guid);
    rss_item.set_pub_date(rfc2822(item.published.midnight().assume_utc()));
    rss_item.set_enclosure(enclosure);

    if let Some(duration) = &item.duration {
        let mut itunes = ITunesItemExtension::default();
        itunes.set_duration(duration.clone());
        rss_item.set_itunes_ext(itunes);
    }
    rss_item
}

/// Serialize `document` as RSS 2.0 into `sink`.
///
/// Nothing reaches `sink` unless serialization succeeds as a whole.
pub fn write_rss<W: Write>(document: &FeedDocument, mut sink: W) -> Result<(), SyndicationError> {
    let buffer = to_channel(document)
        .write_to(Vec::new())
        .map_err(|err| SyndicationError::Serialize(err.to_string()))?;
    sink.write_all(&buffer)?;
    Ok(())
}
