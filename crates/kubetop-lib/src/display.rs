//! Output sink for rendered frames
//!
//! The display is the only shared mutable resource in the pipeline. It has
//! a single writer, and every write is followed by a flush, including when
//! the write itself failed.

use crate::error::{Error, Result};
use crate::models::Geometry;
use crate::render::clip_lines;
use async_trait::async_trait;
use std::io::{self, Write};
use tracing::{debug, warn};

/// Whether the display can take another frame right away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

/// A surface frames are written to
#[async_trait]
pub trait Display: Send {
    /// Write a frame; reports whether another frame may follow immediately
    fn write(&mut self, text: &str) -> Result<Readiness>;

    fn flush(&mut self) -> Result<()>;

    /// Current size, queried fresh on every call
    fn geometry(&self) -> Result<Geometry>;

    /// Release the underlying handle. Later writes fail.
    fn close(&mut self) -> Result<()>;

    /// Resolves once a display that reported `NotReady` can accept more
    async fn drained(&mut self) {}
}

/// Write a frame and flush, flushing even if the write failed
pub fn present<D: Display + ?Sized>(display: &mut D, text: &str) -> Result<Readiness> {
    let written = display.write(text);
    let flushed = display.flush();
    let readiness = written?;
    flushed?;
    Ok(readiness)
}

/// Something that knows the current terminal size
pub trait Terminal: Send {
    fn size(&self) -> io::Result<Geometry>;
}

/// The controlling terminal, sized through crossterm
#[derive(Debug, Clone, Copy, Default)]
pub struct CrosstermTerminal;

impl Terminal for CrosstermTerminal {
    fn size(&self) -> io::Result<Geometry> {
        let (columns, rows) = crossterm::terminal::size()?;
        Ok(Geometry::new(rows, columns))
    }
}

/// A display backed by a writer and a terminal size query
///
/// Each write is clipped to the number of rows the terminal has at that
/// moment. Without a readable size, as when stdout is redirected, frames
/// are written whole.
pub struct TerminalDisplay<W: Write + Send, T: Terminal> {
    writer: Option<W>,
    terminal: T,
}

impl TerminalDisplay<io::Stdout, CrosstermTerminal> {
    /// Display on the process's standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout(), CrosstermTerminal)
    }
}

impl<W: Write + Send, T: Terminal> TerminalDisplay<W, T> {
    pub fn new(writer: W, terminal: T) -> Self {
        Self {
            writer: Some(writer),
            terminal,
        }
    }

    /// The underlying writer, until the display is closed
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn writer(&mut self) -> Result<&mut W> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::Output(io::Error::new(io::ErrorKind::BrokenPipe, "display is closed")))
    }
}

#[async_trait]
impl<W: Write + Send, T: Terminal> Display for TerminalDisplay<W, T> {
    fn write(&mut self, text: &str) -> Result<Readiness> {
        let clipped = match self.terminal.size() {
            Ok(geometry) => {
                let clipped = clip_lines(text, geometry.rows as usize);
                if clipped.len() < text.len() {
                    debug!(rows = geometry.rows, "Clipped frame to terminal height");
                }
                clipped
            }
            Err(e) => {
                debug!(error = %e, "No terminal size, writing frame unclipped");
                text
            }
        };
        self.writer()?.write_all(clipped.as_bytes())?;
        Ok(Readiness::Ready)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn geometry(&self) -> Result<Geometry> {
        Ok(self.terminal.size()?)
    }

    fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                Ok(())
            }
            None => {
                warn!("Display closed twice");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTerminal {
        size: Geometry,
    }

    impl Terminal for StubTerminal {
        fn size(&self) -> io::Result<Geometry> {
            Ok(self.size)
        }
    }

    fn display(rows: u16) -> TerminalDisplay<Vec<u8>, StubTerminal> {
        TerminalDisplay::new(
            Vec::new(),
            StubTerminal {
                size: Geometry::new(rows, 80),
            },
        )
    }

    #[test]
    fn test_write_is_limited_to_rows() {
        let mut display = display(3);
        let lines: Vec<String> = (0..4).map(|n| format!("Hello {n}\n")).collect();

        let readiness = present(&mut display, &lines.concat()).unwrap();

        assert_eq!(readiness, Readiness::Ready);
        let written = String::from_utf8(display.get_ref().unwrap().clone()).unwrap();
        assert_eq!(written, lines[..3].concat());
    }

    #[test]
    fn test_short_frame_is_written_whole() {
        let mut display = display(24);
        present(&mut display, "one\ntwo\n").unwrap();
        assert_eq!(display.get_ref().unwrap().as_slice(), b"one\ntwo\n");
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut display = display(24);
        display.close().unwrap();
        assert!(display.is_closed());

        let err = present(&mut display, "late\n").unwrap_err();
        assert!(matches!(err, Error::Output(_)));
        // A second close is harmless
        display.close().unwrap();
    }

    struct NoTerminal;

    impl Terminal for NoTerminal {
        fn size(&self) -> io::Result<Geometry> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "not a terminal"))
        }
    }

    #[test]
    fn test_redirected_output_is_written_unclipped() {
        let mut display = TerminalDisplay::new(Vec::new(), NoTerminal);
        let frame: String = (0..100).map(|n| format!("row {n}\n")).collect();

        assert_eq!(present(&mut display, &frame).unwrap(), Readiness::Ready);
        assert_eq!(display.get_ref().unwrap().as_slice(), frame.as_bytes());
        assert!(matches!(display.geometry(), Err(Error::Output(_))));
    }

    struct BrokenWriter {
        flushes: usize,
    }

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_is_still_flushed() {
        let mut display = TerminalDisplay::new(
            BrokenWriter { flushes: 0 },
            StubTerminal {
                size: Geometry::new(24, 80),
            },
        );
        let err = present(&mut display, "frame\n").unwrap_err();
        assert!(matches!(err, Error::Output(_)));
        assert_eq!(display.get_ref().unwrap().flushes, 1);
    }
}
