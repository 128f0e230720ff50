//! Button presses, read as lines of text.
use std::io::BufRead;

use crossbeam::channel::Sender;
use log::warn;

pub const HELP: &str = "
Commands:

play: start the current track, or resume after a pause
pause
next: skip to the next track
prev: go back to the previous track
quit
";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ControlEvent {
    Play,
    Pause,
    Next,
    Prev,
    Quit,
}

impl ControlEvent {
    /// Parse one line of input.  Blank lines are `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let event = match line.trim() {
            "" => return Ok(None),
            "play" | "resume" => ControlEvent::Play,
            "pause" => ControlEvent::Pause,
            "next" | "forward" => ControlEvent::Next,
            "prev" | "back" => ControlEvent::Prev,
            "quit" | "exit" => ControlEvent::Quit,
            other => return Err(other.to_string()),
        };
        Ok(Some(event))
    }
}

/// Forward events from `input` until it ends, it fails, or nobody is listening.
///
/// Dropping `sender` on return is how the shell learns that no more input is coming.
pub fn read_events(input: impl BufRead, sender: Sender<ControlEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Unable to read commands: {e}");
                return;
            }
        };

        match ControlEvent::parse(&line) {
            Ok(Some(event)) => {
                if sender.send(event).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(unknown) => {
                warn!("Unknown command {unknown:?}");
                println!("{HELP}");
            }
        }
    }
}

pub fn spawn_stdin_reader(sender: Sender<ControlEvent>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || read_events(std::io::stdin().lock(), sender))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse() {
        assert_eq!(ControlEvent::parse("play\n"), Ok(Some(ControlEvent::Play)));
        assert_eq!(ControlEvent::parse("  back "), Ok(Some(ControlEvent::Prev)));
        assert_eq!(ControlEvent::parse(""), Ok(None));
        assert_eq!(ControlEvent::parse("louder"), Err("louder".to_string()));
    }

    #[test]
    fn test_read_events_until_eof() {
        let (sender, receiver) = crossbeam::channel::unbounded();
        read_events(Cursor::new("pause\n\nbogus\nnext\r\nquit\n"), sender);

        let events: Vec<_> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![ControlEvent::Pause, ControlEvent::Next, ControlEvent::Quit]
        );
    }
}
