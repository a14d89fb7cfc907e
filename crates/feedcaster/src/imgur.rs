use crate::http;
use feedcaster_core::{AlbumCounter, CollaboratorError};
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;

const API_BASE: &str = "https://api.imgur.com/3";

/// Album lookups against the Imgur API.
#[derive(Clone)]
pub struct ImgurClient {
    http: Client,
    client_id: String,
    album_hash: Regex,
}

impl ImgurClient {
    pub fn new(http: Client, client_id: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            client_id: client_id.into(),
            album_hash: Regex::new(r"(?i)imgur\.com/(?:a|gallery)/([A-Za-z0-9]+)")?,
        })
    }

    fn album(&self, album_url: &str) -> Result<Value, CollaboratorError> {
        let hash = album_hash(&self.album_hash, album_url).ok_or_else(|| {
            CollaboratorError::new("album lookup", "bad_url", format!("no album id in {}", album_url))
        })?;
        let resp = self
            .http
            .get(format!("{}/album/{}", API_BASE, hash))
            .header("Authorization", format!("Client-ID {}", self.client_id))
            .send()
            .map_err(|e| http::transport_error("album lookup", e))?;
        let body: Value = http::check_status("album lookup", resp)?
            .json()
            .map_err(|e| http::transport_error("album lookup", e))?;
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Direct links of the first images of an album.
    pub fn album_images(&self, album_url: &str, max: usize) -> Result<Vec<String>, CollaboratorError> {
        Ok(image_links(&self.album(album_url)?, max))
    }
}

impl AlbumCounter for ImgurClient {
    fn image_count(&self, album_url: &str) -> Result<u32, CollaboratorError> {
        let data = self.album(album_url)?;
        image_count(&data).ok_or_else(|| {
            CollaboratorError::new("album lookup", "no_count", "album carried no image count")
        })
    }
}

fn album_hash<'a>(re: &Regex, url: &'a str) -> Option<&'a str> {
    re.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str())
}

fn image_count(data: &Value) -> Option<u32> {
    data.get("images_count")
        .and_then(Value::as_u64)
        .or_else(|| data.get("images").and_then(Value::as_array).map(|a| a.len() as u64))
        .and_then(|n| u32::try_from(n).ok())
}

fn image_links(data: &Value, max: usize) -> Vec<String> {
    data.get("images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter_map(|img| img.get("link").and_then(Value::as_str))
                .take(max)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
