// Local input: line sources and the pump that makes them cancellable
use crossbeam::channel::{bounded, Receiver};
use relay_core::trim_line_ending;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::thread;

/// Blocking source of input lines. `Ok(None)` is end-of-input.
pub trait InputSource: Send {
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        (**self).read_line()
    }
}

// Lines from any buffered reader, terminators stripped
pub struct ReaderInput<R> {
    reader: R,
}

impl<R: BufRead + Send> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        ReaderInput { reader }
    }
}

impl<R: BufRead + Send> InputSource for ReaderInput<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(trim_line_ending(&line).to_string()))
    }
}

/// The process console.
pub fn stdin() -> ReaderInput<BufReader<io::Stdin>> {
    ReaderInput::new(BufReader::new(io::stdin()))
}

// Fixed script of lines followed by end-of-input
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedInput {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Lines pushed from another thread. Blocks until a line arrives; all
/// senders dropped means end-of-input.
pub struct ChannelInput {
    rx: Receiver<String>,
}

impl ChannelInput {
    pub fn new(rx: Receiver<String>) -> Self {
        ChannelInput { rx }
    }
}

impl InputSource for ChannelInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.rx.recv().ok())
    }
}

#[derive(Debug)]
pub enum InputEvent {
    Line(String),
    End,
    Failed(io::Error),
}

/// Run `source` on a detached thread and hand its lines over a rendezvous
/// channel. The pump reads at most one line ahead and stops once the
/// receiving side is dropped; a source blocked in `read_line` keeps its
/// thread until the process exits.
pub fn spawn_pump(mut source: Box<dyn InputSource>) -> io::Result<Receiver<InputEvent>> {
    let (tx, rx) = bounded(0);
    thread::Builder::new()
        .name("relay-input".to_string())
        .spawn(move || loop {
            let event = match source.read_line() {
                Ok(Some(line)) => InputEvent::Line(line),
                Ok(None) => InputEvent::End,
                Err(e) => InputEvent::Failed(e),
            };
            let last = !matches!(event, InputEvent::Line(_));
            if tx.send(event).is_err() || last {
                tracing::trace!("input pump finished");
                break;
            }
        })?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reader_strips_line_endings() {
        let mut input = ReaderInput::new(Cursor::new("hello\r\nhi\nbreak"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("hi"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("break"));
        assert_eq!(input.read_line().unwrap(), None);
    }

    #[test]
    fn reader_keeps_empty_lines() {
        let mut input = ReaderInput::new(Cursor::new("\n\nx\n"));
        assert_eq!(input.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(input.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(input.read_line().unwrap().as_deref(), Some("x"));
        assert_eq!(input.read_line().unwrap(), None);
    }

    #[test]
    fn pump_forwards_script_then_end() {
        let rx = spawn_pump(Box::new(ScriptedInput::new(["a", "b"]))).unwrap();
        assert!(matches!(rx.recv().unwrap(), InputEvent::Line(l) if l == "a"));
        assert!(matches!(rx.recv().unwrap(), InputEvent::Line(l) if l == "b"));
        assert!(matches!(rx.recv().unwrap(), InputEvent::End));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn channel_input_ends_when_senders_drop() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut input = ChannelInput::new(rx);
        tx.send("one".to_string()).unwrap();
        drop(tx);
        assert_eq!(input.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(input.read_line().unwrap(), None);
    }

    struct FailingInput;

    impl InputSource for FailingInput {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "not utf-8"))
        }
    }

    #[test]
    fn pump_reports_failure() {
        let rx = spawn_pump(Box::new(FailingInput)).unwrap();
        match rx.recv().unwrap() {
            InputEvent::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
