use std::{ fmt, io::{ self, BufRead, IsTerminal, Write } };

/// Title shared by the scan outcome messages.
pub const TITLE: &str = "Hauptwerk Affinity Setting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// The terminal messages a run can end with. Exactly one is shown per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The current context lacks administrative rights.
    ElevationRequired,
    /// The mask was applied to the named process.
    AffinitySet { process: String },
    /// No candidate could be updated; lists every name checked, in order.
    NotFound { checked: Vec<String> },
}

impl Message {
    pub fn title(&self) -> &'static str {
        match self {
            Message::ElevationRequired => "Error",
            Message::AffinitySet { .. } | Message::NotFound { .. } => TITLE,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Message::AffinitySet { .. } => Severity::Info,
            Message::ElevationRequired | Message::NotFound { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::ElevationRequired => {
                write!(f, "This application requires administrative privileges to set CPU affinity.")
            }
            Message::AffinitySet { process } => write!(f, "Affinity set for process: {}.", process),
            Message::NotFound { checked } => {
                write!(
                    f,
                    "Hauptwerk affinity not set. \nNone of the specified processes found.\n\nProcess names checked:\n{}",
                    checked.join("\n")
                )
            }
        }
    }
}

/// Surfaces a message to the user and blocks until it is acknowledged.
pub trait Notifier {
    /// Returns `true` once the user acknowledged the message.
    fn notify(&mut self, message: &Message) -> bool;
}

/// Prints messages to a terminal and waits for Enter.
///
/// When input is not interactive the message is printed and acknowledged
/// immediately, so the program never hangs under a scheduler or a pipe.
pub struct TerminalNotifier<R, W> {
    input: R,
    output: W,
    interactive: bool,
}

impl TerminalNotifier<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self::new(stdin.lock(), io::stdout(), interactive)
    }
}

impl<R: BufRead, W: Write> TerminalNotifier<R, W> {
    pub fn new(input: R, output: W, interactive: bool) -> Self {
        Self { input, output, interactive }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn show(&mut self, message: &Message) -> io::Result<()> {
        let marker = match message.severity() {
            Severity::Info => "",
            Severity::Error => " [error]",
        };
        writeln!(self.output, "{}{}", message.title(), marker)?;
        writeln!(self.output)?;
        writeln!(self.output, "{}", message)?;
        if self.interactive {
            writeln!(self.output)?;
            write!(self.output, "Press Enter to close.")?;
            self.output.flush()?;
            let mut line = String::new();
            self.input.read_line(&mut line)?;
        } else {
            self.output.flush()?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Notifier for TerminalNotifier<R, W> {
    fn notify(&mut self, message: &Message) -> bool {
        match self.show(message) {
            Ok(()) => true,
            Err(err) => {
                log::error!("failed to display message: {}", err);
                false
            }
        }
    }
}
