use std::path::{Path, PathBuf};

use crate::search::normalize_episode_number;

use reqwest::Client;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("'{0}' is not an episode number")]
    InvalidEpisode(String),
}

/// Saves episode audio into a cache directory, one file per episode number.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    cache_dir: PathBuf,
}

impl Downloader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
        })
    }

    pub fn path_for(&self, episode: &str) -> Result<PathBuf, DownloadError> {
        let number = normalize_episode_number(episode);
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DownloadError::InvalidEpisode(episode.to_string()));
        }
        Ok(self.cache_dir.join(format!("discopolis_{}.mp3", number)))
    }

    /// Streams `audio_url` to the episode's cache file and returns its path.
    /// An existing file is returned as is, without any request.
    ///
    /// `progress` receives the bytes written so far and the total size when
    /// the server announces it.
    pub async fn download<F>(
        &self,
        audio_url: &str,
        episode: &str,
        mut progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let path = self.path_for(episode)?;
        fs::create_dir_all(&self.cache_dir)
            .await
            .inspect_err(|e| log::error!("Could not create {}: {e}", self.cache_dir.display()))?;

        if fs::try_exists(&path).await? {
            log::info!("Episode {} already downloaded: {}", episode, path.display());
            return Ok(path);
        }

        log::info!("Downloading {} to {}", audio_url, path.display());
        let mut response = self
            .client
            .get(audio_url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()
            .inspect_err(|e| log::error!("Download refused: {e}"))?;

        let total = response.content_length();
        let partial = path.with_extension("mp3.part");
        let written = match save_stream(&mut response, &partial, &path, total, &mut progress).await
        {
            Ok(written) => written,
            Err(e) => {
                log::error!("Download of episode {} failed: {}", episode, e);
                discard_partial(&partial).await;
                return Err(e);
            }
        };
        log::info!("Saved {} bytes to {}", written, path.display());

        Ok(path)
    }
}

async fn save_stream<F>(
    response: &mut reqwest::Response,
    partial: &Path,
    path: &Path,
    total: Option<u64>,
    progress: &mut F,
) -> Result<u64, DownloadError>
where
    F: FnMut(u64, Option<u64>),
{
    let file = fs::File::create(partial).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut written: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress(written, total);
    }

    writer.flush().await?;
    fs::rename(partial, path).await?;
    Ok(written)
}

async fn discard_partial(partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => log::debug!("Removed {}", partial.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {}", partial.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_path_for_normalizes_number() {
        let downloader = Downloader::new("/tmp/cache").expect("downloader");
        assert_eq!(
            downloader.path_for(" 10.939 ").expect("path"),
            PathBuf::from("/tmp/cache/discopolis_10939.mp3")
        );
        assert!(downloader.path_for("..").is_err());
        assert!(downloader.path_for("../etc").is_err());
    }

    #[tokio::test]
    async fn test_download_streams_to_cache() {
        let server = MockServer::start().await;
        let body = vec![7u8; 200_000];
        Mock::given(method("GET"))
            .and(path("/audio/10939.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let cache = dir.path().join("downloads");
        let downloader = Downloader::new(&cache).expect("downloader");

        let mut reports = Vec::new();
        let url = format!("{}/audio/10939.mp3", server.uri());
        let saved = downloader
            .download(&url, "10939", |written, total| reports.push((written, total)))
            .await
            .expect("download");

        assert_eq!(saved, cache.join("discopolis_10939.mp3"));
        assert_eq!(std::fs::read(&saved).expect("read"), body);
        assert!(!cache.join("discopolis_10939.mp3.part").exists());

        let (last_written, total) = *reports.last().expect("progress reported");
        assert_eq!(last_written, 200_000);
        assert_eq!(total, Some(200_000));
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_second_download_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 audio".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = Downloader::new(dir.path()).expect("downloader");
        let url = format!("{}/audio.mp3", server.uri());

        let first = downloader
            .download(&url, "10939", |_, _| {})
            .await
            .expect("first download");
        let second = downloader
            .download(&url, "10939", |_, _| {})
            .await
            .expect("second download");

        assert_eq!(first, second);
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn test_existing_file_is_returned_without_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let existing = dir.path().join("discopolis_500.mp3");
        std::fs::write(&existing, b"already here").expect("write");

        let downloader = Downloader::new(dir.path()).expect("downloader");
        let saved = downloader
            .download("http://127.0.0.1:9/unreachable.mp3", "500", |_, _| {
                panic!("nothing should be downloaded")
            })
            .await
            .expect("cached path");

        assert_eq!(saved, existing);
        assert_eq!(std::fs::read(&saved).expect("read"), b"already here");
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3 audio".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let partial = dir.path().join("discopolis_7.mp3.part");
        let target = dir.path().join("missing").join("discopolis_7.mp3");

        let mut response = reqwest::get(format!("{}/audio.mp3", server.uri()))
            .await
            .expect("response");
        let mut progress = |_: u64, _: Option<u64>| {};
        let result = save_stream(&mut response, &partial, &target, None, &mut progress).await;
        assert!(matches!(result, Err(DownloadError::Io(_))));
        assert!(partial.exists(), "rename into a missing directory leaves the part file");

        discard_partial(&partial).await;
        assert!(!partial.exists());
        discard_partial(&partial).await;
    }

    #[tokio::test]
    async fn test_http_error_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = Downloader::new(dir.path()).expect("downloader");
        let url = format!("{}/missing.mp3", server.uri());

        let result = downloader.download(&url, "42", |_, _| {}).await;
        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!dir.path().join("discopolis_42.mp3").exists());
    }
}
