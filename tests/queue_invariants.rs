use tokio::sync::mpsc;
use trackplayer::engine::{NullPlayer, Player, PlayerEvent};
use trackplayer::model::{Track, TrackDescriptor};
use trackplayer::playback::{Playback, SessionConfig};
use trackplayer::queue::PlaybackNotice;

fn session() -> (
    tempfile::TempDir,
    Playback<NullPlayer>,
    mpsc::UnboundedReceiver<PlaybackNotice>,
) {
    let dir = tempfile::tempdir().expect("tempdir");
    let (tx, rx) = mpsc::unbounded_channel();
    let config = SessionConfig::new(dir.path()).with_cache_capacity(0);
    (dir, Playback::new(NullPlayer::new(), config, tx), rx)
}

fn track(n: u64) -> Track {
    Track::new(TrackDescriptor::from_url(format!("https://example.com/{n}.mp3")))
}

/// 线性同余，固定种子保证可复现
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        if n == 0 { 0 } else { self.next() % n }
    }
}

#[test]
fn queue_and_timeline_stay_in_sync() {
    let (_dir, mut p, _rx) = session();
    let mut rng = Lcg(42);
    let mut next_id = 0u64;

    for step in 0..500 {
        let len = p.queue().len() as u64;
        match rng.below(7) {
            0 | 1 => {
                let count = rng.below(3) + 1;
                let tracks = (0..count)
                    .map(|_| {
                        next_id += 1;
                        track(next_id)
                    })
                    .collect();
                let index = rng.below(len + 1) as usize;
                p.add(tracks, Some(index)).expect("add");
            }
            2 => {
                let indexes = (0..rng.below(4))
                    .map(|_| rng.below(len + 2) as i64 - 1)
                    .collect::<Vec<_>>();
                let current = p.current_track_index();
                let current_uri = current.and_then(|i| p.track(i)).map(|t| t.uri());
                p.remove(&indexes).expect("remove");
                // 当前曲目永远不会被删除
                if let Some(uri) = current_uri {
                    assert!(p.queue().iter().any(|t| t.uri() == uri), "step {step}");
                }
            }
            3 => p.remove_upcoming().expect("remove_upcoming"),
            4 if rng.below(10) == 0 => p.reset().expect("reset"),
            5 if len > 0 => {
                let target = rng.below(len) as usize;
                p.player_mut().set_current_index(Some(target));
                p.on_player_event(PlayerEvent::Started);
            }
            _ => p.play().expect("play"),
        }

        assert_eq!(
            p.queue().len(),
            p.player().item_count(),
            "queue/timeline mismatch at step {step}"
        );
    }
}

#[test]
fn window_pointer_drift_matches_removed_count() {
    let (_dir, mut p, _rx) = session();
    p.add((0..8).map(track).collect(), None).expect("add");
    p.player_mut().set_current_index(Some(5));
    p.on_player_event(PlayerEvent::Started);
    assert_eq!(p.controller().last_known_window(), Some(5));

    // 1、3 在窗口之前，7 在之后，5 是当前曲目
    p.remove(&[7, 1, 5, 3]).expect("remove");
    assert_eq!(p.controller().last_known_window(), Some(3));
    assert_eq!(p.current_track_index(), Some(3));
    assert_eq!(p.queue().len(), 5);
}

#[test]
fn play_is_idempotent_until_terminal_event() {
    let (_dir, mut p, _rx) = session();
    p.add(vec![track(1)], None).expect("add");
    let prepared = p.player().prepare_count();

    p.play().expect("play");
    p.play().expect("play");
    assert_eq!(p.player().prepare_count(), prepared);

    p.on_player_event(PlayerEvent::Ended);
    p.play().expect("play");
    assert_eq!(p.player().prepare_count(), prepared + 1);
}

#[test]
fn session_usable_after_player_error() {
    let (_dir, mut p, mut rx) = session();
    p.add(vec![track(1)], None).expect("add");
    p.on_player_event(PlayerEvent::FatalError {
        code: 1004,
        message: "io".to_owned(),
    });
    assert!(!p.controller().is_prepared());

    p.add(vec![track(2)], None).expect("add after error");
    assert!(p.controller().is_prepared());

    let mut got_error = false;
    while let Ok(n) = rx.try_recv() {
        got_error |= matches!(n, PlaybackNotice::PlayerError { code: 1004, .. });
    }
    assert!(got_error);
}
