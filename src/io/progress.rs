use std::sync::{mpsc::Sender, Arc, Mutex};

use tracing::{debug, info};

/// Event emitted by a running stage. The interactive loop renders
/// `Status` in a status line, `Log` in the scrollback and `Progress`
/// as a bar.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Status(String),
    Log(String),
    Progress { done: usize, total: usize },
    /// A background stage finished (successfully or not).
    Finished { stage: String },
}

type Callback = Arc<dyn Fn(Event) + Send + Sync + 'static>;

#[derive(Clone, Default)]
enum Sink {
    #[default]
    Silent,
    Channel(Arc<Mutex<Sender<Event>>>),
    Callback(Callback),
}

/// Cheap, cloneable handle that stages use to report what they are doing.
#[derive(Clone, Default)]
pub struct Reporter {
    sink: Sink,
}

impl Reporter {
    /// Reporter that only forwards to `tracing`.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel(tx: Sender<Event>) -> Self {
        Self {
            sink: Sink::Channel(Arc::new(Mutex::new(tx))),
        }
    }

    pub fn callback(cb: impl Fn(Event) + Send + Sync + 'static) -> Self {
        Self {
            sink: Sink::Callback(Arc::new(cb)),
        }
    }

    pub fn status(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.emit(Event::Status(msg));
    }

    pub fn log(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.emit(Event::Log(msg));
    }

    pub fn progress(&self, done: usize, total: usize) {
        debug!("progress {done}/{total}");
        self.emit(Event::Progress { done, total });
    }

    pub fn finished(&self, stage: impl Into<String>) {
        self.emit(Event::Finished {
            stage: stage.into(),
        });
    }

    pub fn emit(&self, event: Event) {
        match &self.sink {
            Sink::Silent => {}
            Sink::Channel(tx) => {
                if let Ok(g) = tx.lock() {
                    // Receiver gone means nobody is listening anymore.
                    let _ = g.send(event);
                }
            }
            Sink::Callback(cb) => cb(event),
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.sink {
            Sink::Silent => "silent",
            Sink::Channel(_) => "channel",
            Sink::Callback(_) => "callback",
        };
        f.debug_struct("Reporter").field("sink", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_reporter_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let r = Reporter::channel(tx);
        r.status("Download 1/2");
        r.log("DL: x");
        r.progress(1, 2);

        let got: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                Event::Status("Download 1/2".into()),
                Event::Log("DL: x".into()),
                Event::Progress { done: 1, total: 2 },
            ]
        );
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        Reporter::channel(tx).log("nobody hears this");
    }
}
