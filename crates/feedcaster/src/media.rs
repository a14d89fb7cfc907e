use crate::http;
use crate::imgur::ImgurClient;
use feedcaster_core::{CollaboratorError, MediaResolver, MAX_MEDIA_PER_POST};
use reqwest::blocking::Client;
use scraper::{Html, Selector};

/// Finds the uploadable media behind album, page and animation links.
pub struct WebMediaResolver {
    http: Client,
    imgur: Option<ImgurClient>,
    og_image: Selector,
}

impl WebMediaResolver {
    pub fn new(http: Client, imgur: Option<ImgurClient>) -> anyhow::Result<Self> {
        let og_image = Selector::parse(r#"meta[property="og:image"]"#)
            .map_err(|e| anyhow::anyhow!("invalid og:image selector: {:?}", e))?;
        Ok(Self {
            http,
            imgur,
            og_image,
        })
    }

    /// First non-empty `og:image` of a page, entities already decoded.
    fn og_image_of(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        doc.select(&self.og_image)
            .filter_map(|meta| meta.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    }
}

impl MediaResolver for WebMediaResolver {
    fn album_images(&self, album_url: &str) -> Result<Vec<String>, CollaboratorError> {
        match &self.imgur {
            Some(imgur) => imgur.album_images(album_url, MAX_MEDIA_PER_POST),
            None => Err(CollaboratorError::new(
                "album images",
                "unconfigured",
                "no imgur client id",
            )),
        }
    }

    fn page_image(&self, page_url: &str) -> Result<Option<String>, CollaboratorError> {
        let html = http::get_text(&self.http, "page image", page_url)?;
        Ok(self.og_image_of(&html))
    }

    fn gif_video(&self, page_url: &str) -> Result<Option<String>, CollaboratorError> {
        let Some(info_url) = gfycat_info_url(page_url) else {
            return Ok(None);
        };
        let info = http::get_json(&self.http, "gif info", &info_url)?;
        Ok(info
            .pointer("/gfyItem/mp4Url")
            .and_then(|v| v.as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string))
    }
}

/// API address of a gfycat page, or `None` when the URL is not one.
fn gfycat_info_url(page_url: &str) -> Option<String> {
    let info = page_url.replacen("gfycat.com/", "api.gfycat.com/v1/gfycats/", 1);
    (info != page_url).then_some(info)
}
