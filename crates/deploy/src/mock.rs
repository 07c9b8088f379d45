//! In-memory remote used by the orchestrator tests.
//!
//! Interprets the `cp`, `rm` and `touch` command lines issued by activation
//! so tests can check the resulting remote state.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use revdeploy_remote::{
    BoxFuture, ChannelError, CommandError, FileChannel, RemoteDirEntry, RemoteIoError,
    RemoteSession,
};
use revdeploy_revision::MARKER_SUFFIX;

#[derive(Debug, Clone)]
pub(crate) struct MemoryFile {
    pub content: Vec<u8>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct MemoryRemote {
    pub files: Mutex<BTreeMap<String, MemoryFile>>,
    pub commands: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<String>>,
    pub listings: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub closed: AtomicBool,
    pub clock: AtomicI64,
    pub fail_channel: bool,
    pub fail_list: bool,
    pub fail_write: bool,
    /// Commands starting with this word fail with a transport error.
    pub fail_command: Option<&'static str>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            clock: AtomicI64::new(1_000),
            ..Self::default()
        }
    }

    /// The `app.html` example directory: revisions 123 (active) and 456 (newer).
    pub fn example() -> Self {
        let remote = Self::new();
        remote.put("/directory/123.active-revision", b"", 100);
        remote.put("/directory/app.html", b"<live 123>", 100);
        remote.put("/directory/app.html:123", b"<rev 123>", 100);
        remote.put("/directory/app.html:456", b"<rev 456>", 200);
        remote
    }

    pub fn put(&self, path: &str, content: &[u8], secs: i64) {
        self.files.lock().unwrap().insert(
            path.to_string(),
            MemoryFile {
                content: content.to_vec(),
                modified_at: DateTime::from_timestamp(secs, 0).unwrap(),
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<MemoryFile> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn now(&self) -> DateTime<Utc> {
        let secs = self.clock.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn apply(&self, command_line: &str) {
        for part in command_line.split(" && ") {
            let words = shell_words(part);
            let Some((program, rest)) = words.split_first() else {
                continue;
            };
            let mut files = self.files.lock().unwrap();
            match program.as_str() {
                "cp" => {
                    if let [src, dst] = rest {
                        if let Some(file) = files.get(src).cloned() {
                            let modified_at = self.now();
                            files.insert(
                                dst.clone(),
                                MemoryFile {
                                    content: file.content,
                                    modified_at,
                                },
                            );
                        }
                    }
                }
                "rm" => {
                    for target in rest.iter().filter(|w| !w.starts_with('-')) {
                        if let Some(dir) = target.strip_suffix(&format!("/*{MARKER_SUFFIX}")) {
                            let prefix = format!("{dir}/");
                            files.retain(|path, _| {
                                !(path.starts_with(&prefix)
                                    && !path[prefix.len()..].contains('/')
                                    && path.ends_with(MARKER_SUFFIX))
                            });
                        } else {
                            files.remove(target);
                        }
                    }
                }
                "touch" => {
                    for target in rest {
                        let modified_at = self.now();
                        files
                            .entry(target.clone())
                            .and_modify(|f| f.modified_at = modified_at)
                            .or_insert(MemoryFile {
                                content: Vec::new(),
                                modified_at,
                            });
                    }
                }
                other => panic!("unexpected remote command {other}"),
            }
        }
    }
}

/// Splits a command line into words, honouring single quotes and backslashes.
fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_quote = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                in_word = true;
            }
            '\\' if !in_quote => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            ' ' if !in_quote => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

pub(crate) struct MemoryChannel<'a> {
    remote: &'a MemoryRemote,
}

impl FileChannel for MemoryChannel<'_> {
    fn list_directory<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RemoteDirEntry>, RemoteIoError>> {
        Box::pin(async move {
            let remote = self.remote;
            if remote.is_closed() {
                return Err(RemoteIoError::Closed);
            }
            remote.listings.fetch_add(1, Ordering::SeqCst);
            if remote.fail_list {
                remote.closed.store(true, Ordering::SeqCst);
                return Err(RemoteIoError::List {
                    path: path.to_string(),
                    message: "No such file or directory".into(),
                });
            }

            let prefix = format!("{}/", path.trim_end_matches('/'));
            let files = remote.files.lock().unwrap();
            Ok(files
                .iter()
                .filter_map(|(p, f)| {
                    let name = p.strip_prefix(&prefix)?;
                    (!name.contains('/')).then(|| RemoteDirEntry {
                        filename: name.to_string(),
                        modified_at: f.modified_at,
                    })
                })
                .collect())
        })
    }

    fn write_file<'a>(
        &'a self,
        path: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, Result<(), RemoteIoError>> {
        Box::pin(async move {
            let remote = self.remote;
            if remote.is_closed() {
                return Err(RemoteIoError::Closed);
            }
            remote.writes.lock().unwrap().push(path.to_string());
            if remote.fail_write {
                remote.closed.store(true, Ordering::SeqCst);
                return Err(RemoteIoError::Write {
                    path: path.to_string(),
                    message: "stream closed".into(),
                });
            }
            let modified_at = remote.now();
            remote.files.lock().unwrap().insert(
                path.to_string(),
                MemoryFile {
                    content: bytes.to_vec(),
                    modified_at,
                },
            );
            Ok(())
        })
    }
}

impl RemoteSession for MemoryRemote {
    fn open_file_channel(
        &self,
    ) -> BoxFuture<'_, Result<Box<dyn FileChannel + '_>, ChannelError>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(ChannelError::NotReady);
            }
            if self.fail_channel {
                self.closed.store(true, Ordering::SeqCst);
                return Err(ChannelError::Rejected("subsystem request failed".into()));
            }
            Ok(Box::new(MemoryChannel { remote: self }) as Box<dyn FileChannel + '_>)
        })
    }

    fn run_command<'a>(
        &'a self,
        command_line: &'a str,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(CommandError::Closed);
            }
            self.commands.lock().unwrap().push(command_line.to_string());
            if let Some(word) = self.fail_command {
                if command_line.starts_with(word) {
                    return Err(CommandError::Transport {
                        command: command_line.to_string(),
                        message: "connection reset".into(),
                    });
                }
            }
            self.apply(command_line);
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
        })
    }

    fn destination(&self) -> &str {
        "deploy@memory"
    }
}

#[test]
fn shell_words_handles_quotes() {
    assert_eq!(
        shell_words("rm -f '/srv/my app'/*.active-revision"),
        vec!["rm", "-f", "/srv/my app/*.active-revision"]
    );
    assert_eq!(shell_words("cp 'it'\\''s' 'b'"), vec!["cp", "it's", "b"]);
}
