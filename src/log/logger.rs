use crate::log::tag::Tag;
use crate::log::tag_list::TagList;
use crate::log::tag_value::TagValue;
use crate::log::Level;
use crate::time::FormatTime;
use std::cell::RefCell;
use std::io::Write;
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LogEvent {
    pub time: SystemTime,
    pub level: Level,
    pub tags: TagList,
}
impl LogEvent {
    pub fn new(level: Level, tags: impl Into<TagList>) -> Self {
        Self {
            time: SystemTime::now(),
            level,
            tags: tags.into(),
        }
    }
}

pub trait Logger: Send {
    fn add(&self, event: LogEvent);
}

/// Writes each event as a single line to stdout.
/// One `write` call per line, so lines from the master and forked workers
/// do not interleave mid-line.
#[derive(Clone)]
pub struct StdoutLogger {}
impl Logger for StdoutLogger {
    fn add(&self, event: LogEvent) {
        let time = event.time.iso8601_utc();
        let level = event.level;
        let mut tags = event.tags;
        let line = if let Some(msg_index) = tags.iter().position(|tag| tag.name == "msg") {
            let msg_tag = tags.remove(msg_index);
            let msg = msg_tag.value;
            if tags.is_empty() {
                format!("{time} {level} {msg}\n")
            } else {
                format!("{time} {level} {msg} {tags}\n")
            }
        } else {
            format!("{time} {level} {tags}\n")
        };
        let _ignored = std::io::stdout().write_all(line.as_bytes());
    }
}

static GLOBAL_LOGGER: once_cell::sync::OnceCell<Mutex<Box<dyn Logger>>> =
    once_cell::sync::OnceCell::new();

thread_local! {
    static THREAD_LOCAL_TAGS: RefCell<Vec<Tag>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GlobalLoggerAlreadySetError {}

/// # Errors
/// Returns an error when a global logger was already set.
pub fn set_global_logger(logger: impl Logger + 'static) -> Result<(), GlobalLoggerAlreadySetError> {
    GLOBAL_LOGGER
        .set(Mutex::new(Box::new(logger)))
        .map_err(|_| GlobalLoggerAlreadySetError {})
}

pub static STDOUT_LOGGER: StdoutLogger = StdoutLogger {};

/// Adds a tag to every log event made by the current thread.
/// The master tags its pid once at startup; each worker re-tags after fork.
pub fn add_thread_local_log_tag(name: &'static str, value: impl Into<TagValue>) {
    let tag = Tag::new(name, value);
    THREAD_LOCAL_TAGS.with(|cell| cell.borrow_mut().push(tag));
}

pub fn clear_thread_local_log_tags() {
    THREAD_LOCAL_TAGS.with(|cell| cell.borrow_mut().clear());
}

pub fn with_thread_local_log_tags<R, F: FnOnce(&[Tag]) -> R>(f: F) -> R {
    THREAD_LOCAL_TAGS.with(|cell| f(cell.borrow().as_slice()))
}

pub fn log(time: SystemTime, level: Level, tags: impl Into<TagList>) {
    let mut tags = tags.into();
    with_thread_local_log_tags(|thread_tags| tags.0.extend_from_slice(thread_tags));
    let event = LogEvent { time, level, tags };
    if let Some(mutex_box_logger) = GLOBAL_LOGGER.get() {
        mutex_box_logger.lock().unwrap().add(event);
    } else {
        STDOUT_LOGGER.add(event);
    }
}
