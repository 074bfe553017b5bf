// Navigation module
// Drives the Loading -> Previewing -> Done cycle over the candidate list

use crate::fit::DisplayBounds;
use crate::image_loader::{load_image, DecodedImage, Frame};
use anyhow::Result;
use log::{debug, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A key press delivered by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// The window was closed from outside the browser
    Closed,
    Other,
}

/// The windowing collaborator the browser renders into
pub trait Display {
    /// Show `frame`, replacing whatever image is currently visible
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Block until exactly one key is pressed
    fn wait_for_key(&mut self) -> Result<Key>;

    /// Release the window. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;

    /// Dimensions of the primary screen, if known
    fn screen_size(&self) -> Option<(u32, u32)> {
        None
    }
}

/// What the user asked for while an image was shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Quit,
    Unrecognized,
}

impl From<Key> for Command {
    fn from(key: Key) -> Self {
        match key {
            Key::Char(' ' | 'n' | 'N') => Command::Next,
            Key::Char('p' | 'P') => Command::Previous,
            Key::Char('q' | 'Q') | Key::Closed => Command::Quit,
            _ => Command::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unclassified,
    Image,
    Rejected,
}

/// Position of a candidate in the arena. Slots are never reused or shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

/// Candidates in enumeration order.
///
/// Rejected entries keep their slot and are skipped by every lookup, so a
/// cursor stays valid across rejections.
#[derive(Debug)]
pub struct CandidateList {
    entries: Vec<(PathBuf, Status)>,
}

impl CandidateList {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            entries: paths
                .into_iter()
                .map(|path| (path, Status::Unclassified))
                .collect(),
        }
    }

    pub fn first(&self) -> Option<Cursor> {
        self.live_from(0)
    }

    /// The next entry after `cursor` that has not been rejected
    pub fn next(&self, cursor: Cursor) -> Option<Cursor> {
        self.live_from(cursor.0 + 1)
    }

    /// The closest entry before `cursor` that has not been rejected
    pub fn previous(&self, cursor: Cursor) -> Option<Cursor> {
        self.entries[..cursor.0]
            .iter()
            .rposition(|(_, status)| *status != Status::Rejected)
            .map(Cursor)
    }

    pub fn is_first(&self, cursor: Cursor) -> bool {
        self.previous(cursor).is_none()
    }

    pub fn is_last(&self, cursor: Cursor) -> bool {
        self.next(cursor).is_none()
    }

    pub fn path(&self, cursor: Cursor) -> &Path {
        &self.entries[cursor.0].0
    }

    fn confirm(&mut self, cursor: Cursor) {
        self.entries[cursor.0].1 = Status::Image;
    }

    fn reject(&mut self, cursor: Cursor) {
        self.entries[cursor.0].1 = Status::Rejected;
    }

    /// Number of candidates not yet rejected
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, status)| *status != Status::Rejected)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1-based position of `cursor` among the remaining candidates
    pub fn position(&self, cursor: Cursor) -> usize {
        self.entries[..=cursor.0]
            .iter()
            .filter(|(_, status)| *status != Status::Rejected)
            .count()
    }

    fn live_from(&self, start: usize) -> Option<Cursor> {
        self.entries
            .iter()
            .skip(start)
            .position(|(_, status)| *status != Status::Rejected)
            .map(|offset| Cursor(start + offset))
    }
}

/// Where a command sends the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Load(Cursor),
    /// Show the same image again and re-prompt
    Stay,
    Quit,
}

/// Interpret `command` at `cursor`. Next at the last candidate ends the session.
pub fn transition(list: &CandidateList, cursor: Cursor, command: Command) -> Transition {
    match command {
        Command::Next => match list.next(cursor) {
            Some(next) => Transition::Load(next),
            None => Transition::Quit,
        },
        Command::Previous => match list.previous(cursor) {
            Some(previous) => Transition::Load(previous),
            None => Transition::Stay,
        },
        Command::Quit => Transition::Quit,
        Command::Unrecognized => Transition::Stay,
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user quit, or pressed Next on the last image
    Quit,
    /// No decodable candidates were left to show
    Exhausted,
}

enum State {
    Loading(Cursor),
    Previewing(Cursor, DecodedImage),
    Done(Outcome),
}

/// Statistics reported when the session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub previewed: usize,
    pub skipped: usize,
}

/// The browsing session: candidates, bounds, display and console
pub struct Navigator<D: Display, W: Write> {
    list: CandidateList,
    bounds: DisplayBounds,
    display: D,
    out: W,
    stats: SessionStats,
}

impl<D: Display, W: Write> Navigator<D, W> {
    pub fn new(list: CandidateList, bounds: DisplayBounds, display: D, out: W) -> Self {
        Self {
            list,
            bounds,
            display,
            out,
            stats: SessionStats::default(),
        }
    }

    /// Run until the user quits or the candidates run out.
    ///
    /// The display is closed before this returns, on success and on error.
    pub fn run(&mut self) -> Result<Outcome> {
        let result = self.run_states();
        let closed = self.display.close();
        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (CandidateList, D, W) {
        (self.list, self.display, self.out)
    }

    fn run_states(&mut self) -> Result<Outcome> {
        let mut state = match self.list.first() {
            Some(cursor) => State::Loading(cursor),
            None => State::Done(Outcome::Exhausted),
        };

        loop {
            state = match state {
                State::Loading(cursor) => self.load(cursor),
                State::Previewing(cursor, image) => self.preview(cursor, image)?,
                State::Done(outcome) => {
                    if self.list.is_empty() {
                        warn!("No decodable images were found");
                    }
                    if outcome == Outcome::Quit {
                        writeln!(self.out, "Application closed.")?;
                        writeln!(self.out)?;
                    }
                    return Ok(outcome);
                }
            };
        }
    }

    fn load(&mut self, cursor: Cursor) -> State {
        let path = self.list.path(cursor);
        match load_image(path) {
            Ok(image) => {
                self.list.confirm(cursor);
                State::Previewing(cursor, image)
            }
            Err(e) => {
                debug!("Skipping candidate: {}", e);
                self.list.reject(cursor);
                self.stats.skipped += 1;
                match self.list.next(cursor) {
                    Some(next) => State::Loading(next),
                    None => State::Done(Outcome::Exhausted),
                }
            }
        }
    }

    fn preview(&mut self, cursor: Cursor, image: DecodedImage) -> Result<State> {
        self.stats.previewed += 1;
        let frame = image.to_frame(self.bounds);
        self.print_info(cursor, &image, &frame)?;
        // Release the decoded raster before blocking; only the frame is needed now
        drop(image);

        loop {
            self.display.show(&frame)?;
            self.print_hints(cursor)?;

            let key = self.display.wait_for_key()?;
            debug!("Key received: {:?}", key);

            match transition(&self.list, cursor, Command::from(key)) {
                Transition::Load(next) => return Ok(State::Loading(next)),
                Transition::Quit => return Ok(State::Done(Outcome::Quit)),
                Transition::Stay => {
                    if Command::from(key) == Command::Unrecognized {
                        writeln!(self.out)?;
                        writeln!(self.out, "INVALID KEY.")?;
                    }
                }
            }
        }
    }

    fn print_info(&mut self, cursor: Cursor, image: &DecodedImage, frame: &Frame) -> Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "[{}/{}]",
            self.list.position(cursor),
            self.list.len()
        )?;
        writeln!(self.out, "{}", image.info)?;
        if (frame.width, frame.height) != (image.info.width, image.info.height) {
            writeln!(self.out, "Displayed:  {} x {}", frame.width, frame.height)?;
        }
        Ok(())
    }

    fn print_hints(&mut self, cursor: Cursor) -> Result<()> {
        let first = self.list.is_first(cursor);
        let last = self.list.is_last(cursor);

        writeln!(self.out)?;
        writeln!(self.out, "Awaiting User Response...")?;
        if last {
            writeln!(
                self.out,
                "Press Space, the N key, or the Q key to end the application."
            )?;
        } else {
            writeln!(self.out, "Press Space or the N key to go to the next image.")?;
        }
        if !first {
            writeln!(self.out, "Press the P key to go to the previous image.")?;
        }
        if !last {
            writeln!(self.out, "Press the Q key to quit the application.")?;
        }
        self.out.flush()?;
        Ok(())
    }
}
