// Output sinks for text received from the peer
use relay_core::format_received;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub trait OutputSink: Send {
    fn display(&mut self, text: &str) -> io::Result<()>;
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn display(&mut self, text: &str) -> io::Result<()> {
        (**self).display(text)
    }
}

/// Prints `label: text` lines to stdout, optionally stamped with local time.
pub struct ConsoleSink {
    label: String,
    timestamps: bool,
}

impl ConsoleSink {
    pub fn new(label: &str) -> Self {
        ConsoleSink {
            label: label.to_string(),
            timestamps: false,
        }
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    fn render(&self, text: &str) -> String {
        let line = format_received(&self.label, text);
        if self.timestamps {
            let now = chrono::Local::now();
            format!("[{}] {}", now.format("%H:%M:%S"), line)
        } else {
            line
        }
    }
}

impl OutputSink for ConsoleSink {
    fn display(&mut self, text: &str) -> io::Result<()> {
        let line = self.render(text);
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)?;
        out.flush()
    }
}

/// Records everything displayed; clones share the same record.
#[derive(Clone, Default)]
pub struct CollectingSink {
    label: String,
    received: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new(label: &str) -> Self {
        CollectingSink {
            label: label.to_string(),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Raw text units in arrival order.
    pub fn units(&self) -> Vec<String> {
        match self.received.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Everything received, concatenated.
    pub fn text(&self) -> String {
        self.units().concat()
    }

    /// Units rendered the way the console shows them.
    pub fn lines(&self) -> Vec<String> {
        self.units()
            .iter()
            .map(|text| format_received(&self.label, text))
            .collect()
    }
}

impl OutputSink for CollectingSink {
    fn display(&mut self, text: &str) -> io::Result<()> {
        let mut guard = match self.received.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(text.to_string());
        Ok(())
    }
}
