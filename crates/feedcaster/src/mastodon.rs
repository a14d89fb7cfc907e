use crate::http::{self, check_status, transport_error};
use feedcaster_core::{
    check_payload, AccountLookup, CollaboratorError, FeedcasterError, MediaRequest, MediaSource,
    MediaUploader, Poster,
};
use reqwest::blocking::{multipart, Client};

/// Status, media and account endpoints of one Mastodon instance.
pub struct MastodonClient {
    http: Client,
    base_url: String,
    token: String,
}

impl MastodonClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn read_media(&self, request: &MediaRequest) -> feedcaster_core::Result<(Vec<u8>, String)> {
        let limit = request.kind.limit();
        match &request.source {
            MediaSource::Path(path) => {
                let size = std::fs::metadata(path)?.len();
                check_payload(request.kind, size)?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                Ok((std::fs::read(path)?, name))
            }
            MediaSource::Url(url) => {
                // one byte over the limit so check_payload reports the real failure
                let bytes = http::get_bytes(&self.http, "media download", url, limit + 1)?;
                check_payload(request.kind, bytes.len() as u64)?;
                let name = url
                    .rsplit('/')
                    .next()
                    .and_then(|n| n.split('?').next())
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload")
                    .to_string();
                Ok((bytes, name))
            }
        }
    }
}

impl Poster for MastodonClient {
    fn post(&self, text: &str, media_ids: &[String]) -> Result<(), CollaboratorError> {
        let mut form: Vec<(&str, &str)> = vec![("status", text)];
        form.extend(media_ids.iter().map(|id| ("media_ids[]", id.as_str())));

        let resp = self
            .http
            .post(self.url("/api/v1/statuses"))
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .map_err(|e| transport_error("statuses", e))?;
        check_status("statuses", resp)?;
        Ok(())
    }
}

impl MediaUploader for MastodonClient {
    fn upload(&self, request: &MediaRequest) -> feedcaster_core::Result<String> {
        let (bytes, name) = self.read_media(request)?;
        tracing::debug!("Uploading {} ({} bytes)", name, bytes.len());

        let mime = mime_for(&name).unwrap_or_else(|| request.kind.mime_hint().to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str(&mime)
            .map_err(|e| transport_error("media upload", e))?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url("/api/v2/media"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .map_err(|e| transport_error("media upload", e))?;
        let body: serde_json::Value = check_status("media upload", resp)?
            .json()
            .map_err(|e| transport_error("media upload", e))?;

        match body.get("id").and_then(|id| id.as_str()) {
            Some(id) => Ok(id.to_string()),
            None => Err(FeedcasterError::Collaborator(CollaboratorError::new(
                "media upload",
                "no_id",
                "response carried no media id",
            ))),
        }
    }
}

impl AccountLookup for MastodonClient {
    fn authenticated_account(&self) -> Result<String, CollaboratorError> {
        let resp = self
            .http
            .get(self.url("/api/v1/accounts/verify_credentials"))
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| transport_error("verify credentials", e))?;
        let body: serde_json::Value = check_status("verify credentials", resp)?
            .json()
            .map_err(|e| transport_error("verify credentials", e))?;

        body.get("username")
            .or_else(|| body.get("acct"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::new("verify credentials", "no_username", "response carried no username"))
    }
}

fn mime_for(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for("cat.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_for("clip.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(mime_for("scan.tiff").as_deref(), Some("image/tiff"));
        assert_eq!(mime_for("noext"), None);
    }

    #[test]
    fn oversized_local_file_is_refused_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        std::fs::write(&path, vec![0u8; (feedcaster_core::publish::IMAGE_LIMIT_BYTES + 1) as usize]).unwrap();

        let client = MastodonClient::new(Client::new(), "http://127.0.0.1:9", "token");
        let err = client
            .upload(&MediaRequest::image(MediaSource::Path(path)))
            .unwrap_err();
        assert!(matches!(err, FeedcasterError::PayloadTooLarge { .. }));
    }
}
