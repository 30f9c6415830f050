//! External tool plumbing, driven by small shell scripts standing in for
//! `yt-dlp` and `demucs`. Everything runs in one test so no other test
//! thread can fork while a script is still open for writing.
#![cfg(unix)]

use sample_pack_core::{
    core::{
        acquire::{download_urls, resolve_links, Downloader},
        separate::{list_tracks, separate_all},
    },
    DemucsCli, Event, Layout, Reporter, SampleError, Separator,
};
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tempfile::tempdir;

const FAKE_YT_DLP: &str = r#"#!/bin/sh
for a in "$@"; do
  case "$a" in --flat-playlist) echo id1; echo id2; exit 0;; esac
done
prev=""
for a in "$@"; do
  if [ "$prev" = "--output" ]; then out="$a"; fi
  prev="$a"
  last="$a"
done
case "$last" in *fail*) echo "ERROR: video unavailable" >&2; exit 1;; esac
f="$(dirname "$out")/$(basename "$last").mp3"
: > "$f"
echo "$f"
"#;

const FAKE_DEMUCS: &str = r#"#!/bin/sh
out="$4"
name=$(basename "$5" .mp3)
case "$name" in *bad*) echo "demucs crashed" >&2; exit 2;; esac
mkdir -p "$out/separated/$name/stems"
: > "$out/separated/$name/stems/drums.wav"
"#;

fn install(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn recording() -> (Reporter, Arc<Mutex<Vec<Event>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let reporter = Reporter::callback(move |ev| sink.lock().unwrap().push(ev));
    (reporter, events)
}

#[test]
fn external_tools() {
    let bin = tempdir().unwrap();
    let yt = install(bin.path(), "yt-dlp", FAKE_YT_DLP);
    let demucs = install(bin.path(), "demucs", FAKE_DEMUCS);

    let work = tempdir().unwrap();
    let layout = Layout::new(work.path());
    layout.ensure().unwrap();

    // Playlist expansion.
    let dl = Downloader {
        binary: yt.to_string_lossy().into_owned(),
        ..Downloader::default()
    };
    let (reporter, events) = recording();
    let urls = resolve_links(
        &dl,
        &["https://www.youtube.com/playlist?list=PL1", "https://x/fail"],
        &reporter,
    );
    assert_eq!(
        urls,
        vec![
            "https://www.youtube.com/watch?v=id1",
            "https://www.youtube.com/watch?v=id2",
            "https://x/fail",
        ]
    );
    assert!(events
        .lock()
        .unwrap()
        .contains(&Event::Log("Found 2 links".into())));

    // Downloads: one failure does not stop the batch.
    let (reporter, events) = recording();
    let (tracks, summary) = download_urls(&dl, &urls, &layout.tracks_dir(), &reporter).unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.path.is_file() && t.format == "mp3"));
    {
        let events = events.lock().unwrap();
        assert!(events.contains(&Event::Status("Download 3/3".into())));
        assert!(events.contains(&Event::Progress { done: 3, total: 3 }));
        assert_eq!(events.last(), Some(&Event::Status("Download complete".into())));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Log(m) if m.starts_with("Error:") && m.contains("unavailable"))));
    }

    // Separation over the downloaded tracks plus one the fake tool rejects.
    fs::write(layout.tracks_dir().join("bad_song.mp3"), b"").unwrap();
    fs::write(layout.tracks_dir().join("cover.jpg"), b"").unwrap();
    assert_eq!(list_tracks(&layout.tracks_dir()).unwrap().len(), 3);

    let sep = DemucsCli::new(demucs.to_string_lossy(), "mdx_extra");
    let (reporter, events) = recording();
    let summary = separate_all(&layout.tracks_dir(), &layout.separated_dir(), &sep, &reporter).unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(layout.stems_dir("watch?v=id1").join("drums.wav").is_file());
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::Log(m) if m.starts_with("Err sep bad_song.mp3"))));

    let err = sep
        .separate(&layout.tracks_dir().join("bad_song.mp3"), &layout.separated_dir())
        .unwrap_err();
    match err {
        SampleError::ToolFailed { status, .. } => assert!(status.contains("demucs crashed")),
        other => panic!("unexpected error: {other}"),
    }

    // A separator that is not installed.
    let missing = DemucsCli::new(bin.path().join("nope").to_string_lossy(), "mdx_extra");
    let err = missing
        .separate(&layout.tracks_dir().join("bad_song.mp3"), &layout.separated_dir())
        .unwrap_err();
    assert!(matches!(err, SampleError::ToolMissing { .. }), "{err}");
}
