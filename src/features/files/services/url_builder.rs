use reqwest::Url;

use crate::core::config::S3Settings;
use crate::shared::constants::FETCH_ENDPOINT_PATH;

/// Key and display name recovered from a stored file URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub key: String,
    pub file_name: Option<String>,
}

/// Builds and parses the URLs stored on file rows
#[derive(Debug, Clone)]
pub struct FileUrlBuilder {
    fetch_path: String,
    /// `{public_endpoint}/{bucket}`
    public_base: String,
}

fn encode_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl FileUrlBuilder {
    pub fn new(settings: &S3Settings) -> Self {
        Self {
            fetch_path: FETCH_ENDPOINT_PATH.to_string(),
            public_base: format!(
                "{}/{}",
                settings.public_endpoint.trim_end_matches('/'),
                settings.bucket
            ),
        }
    }

    /// Private files go through the signed-fetch endpoint; public files link straight to the bucket
    pub fn file_url(&self, key: &str, file_name: &str, is_private: bool) -> String {
        if is_private {
            format!(
                "{}?key={}&file_name={}",
                self.fetch_path,
                urlencoding::encode(key),
                urlencoding::encode(file_name)
            )
        } else {
            format!("{}/{}", self.public_base, encode_path(key))
        }
    }

    /// Recover the object key (and display name, for fetch URLs) from a stored URL
    pub fn parse_remote_url(&self, url: &str) -> Option<RemoteLocation> {
        if url.starts_with(&self.fetch_path) {
            let parsed = Url::parse("http://localhost").ok()?.join(url).ok()?;
            let mut key = None;
            let mut file_name = None;
            for (name, value) in parsed.query_pairs() {
                match name.as_ref() {
                    "key" => key = Some(value.into_owned()),
                    "file_name" => file_name = Some(value.into_owned()),
                    _ => {}
                }
            }
            return key
                .filter(|k| !k.is_empty())
                .map(|key| RemoteLocation { key, file_name });
        }

        let rest = url.strip_prefix(&format!("{}/", self.public_base))?;
        let key = urlencoding::decode(rest).ok()?.into_owned();
        (!key.is_empty()).then_some(RemoteLocation {
            key,
            file_name: None,
        })
    }
}
