use crate::{
    error::Result,
    io::{process::run_capture, progress::Reporter},
    types::{BatchSummary, Track},
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// How to invoke the downloader.
#[derive(Clone, Debug)]
pub struct Downloader {
    pub binary: String,
    pub audio_format: String,
    /// Bitrate in kbps.
    pub audio_quality: String,
}

impl Default for Downloader {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".into(),
            audio_format: "mp3".into(),
            audio_quality: "192".into(),
        }
    }
}

pub fn is_playlist(url: &str) -> bool {
    url.contains("list=")
}

/// Flatten a playlist into individual watch URLs.
pub fn get_playlist_urls(dl: &Downloader, url: &str, reporter: &Reporter) -> Result<Vec<String>> {
    reporter.status(format!("Fetching playlist {url}"));
    let out = run_capture(
        &dl.binary,
        ["--flat-playlist", "--skip-download", "--quiet", "--print", "id", url],
    )?;
    let urls: Vec<String> = out
        .lines()
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != "NA")
        .map(|id| format!("{WATCH_URL}{id}"))
        .collect();
    reporter.log(format!("Found {} links", urls.len()));
    Ok(urls)
}

/// Turn free-text input (one URL per line) into a flat URL list.
/// Playlists that fail to resolve are logged and dropped.
pub fn resolve_links<S: AsRef<str>>(dl: &Downloader, lines: &[S], reporter: &Reporter) -> Vec<String> {
    let mut urls = Vec::new();
    for line in lines {
        let u = line.as_ref().trim();
        if u.is_empty() {
            continue;
        }
        if is_playlist(u) {
            match get_playlist_urls(dl, u, reporter) {
                Ok(found) => urls.extend(found),
                Err(e) => reporter.log(format!("Error: {e}")),
            }
        } else {
            urls.push(u.to_string());
        }
    }
    urls
}

fn download_one(dl: &Downloader, url: &str, download_dir: &Path) -> Result<Vec<PathBuf>> {
    let template = download_dir.join("%(title)s.%(ext)s");
    let quality = format!("{}K", dl.audio_quality);
    let template = template.to_string_lossy();
    let out = run_capture(
        &dl.binary,
        [
            "--format",
            "bestaudio",
            "--quiet",
            "--no-simulate",
            "--extract-audio",
            "--audio-format",
            dl.audio_format.as_str(),
            "--audio-quality",
            quality.as_str(),
            "--output",
            &*template,
            "--print",
            "after_move:filepath",
            url,
        ],
    )?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Download each URL as compressed audio into `download_dir`. A failing
/// item is logged and the loop moves on.
pub fn download_urls(
    dl: &Downloader,
    urls: &[String],
    download_dir: &Path,
    reporter: &Reporter,
) -> Result<(Vec<Track>, BatchSummary)> {
    fs::create_dir_all(download_dir)?;

    let total = urls.len();
    let mut summary = BatchSummary::new(total);
    let mut tracks = Vec::new();
    reporter.log(format!("Downloading {total} URLs..."));

    for (i, url) in urls.iter().enumerate() {
        let i = i + 1;
        reporter.status(format!("Download {i}/{total}"));
        reporter.log(format!("DL: {url}"));
        match download_one(dl, url, download_dir) {
            Ok(paths) => {
                summary.succeeded += 1;
                tracks.extend(
                    paths
                        .into_iter()
                        .map(|p| Track::from_path(p, Some(url.clone()))),
                );
            }
            Err(e) => {
                warn!("download failed for {url}: {e}");
                summary.failed += 1;
                reporter.log(format!("Error: {e}"));
            }
        }
        reporter.progress(i, total);
    }

    reporter.status("Download complete");
    Ok((tracks, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_detection() {
        assert!(is_playlist("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist("https://www.youtube.com/watch?v=a&list=PL1"));
        assert!(!is_playlist("https://www.youtube.com/watch?v=abc"));
    }

    #[test]
    fn plain_links_pass_through_trimmed() {
        let dl = Downloader::default();
        let lines = ["  https://example.com/a ", "", "https://example.com/b"];
        let urls = resolve_links(&dl, &lines, &Reporter::silent());
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }
}
