//! Source position tracking for Firth programs.

use std::fmt::Write;
use std::sync::LazyLock;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a position in the global [PositionTable].
pub struct PosIdx(pub(crate) u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// Handle to a file in the global [PositionTable].
pub struct FileIdx(u32);

/// A source file registered with the position table.
struct File {
    name: Box<str>,
    source: Box<str>,
}

/// A byte span within a registered file.
struct PosData {
    file: FileIdx,
    start: usize,
    end: usize,
}

/// Append-only table of files and spans. Index 0 is reserved for the
/// unknown position.
struct PositionTable {
    files: boxcar::Vec<File>,
    spans: boxcar::Vec<PosData>,
}

impl PositionTable {
    const UNKNOWN: PosIdx = PosIdx(0);

    fn new() -> Self {
        let table = PositionTable {
            files: boxcar::Vec::new(),
            spans: boxcar::Vec::new(),
        };
        table.add_file("unknown".to_string(), String::new());
        let pos = table.add_pos(FileIdx(0), 0, 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    fn add_file(&self, name: String, source: String) -> FileIdx {
        let idx = self.files.push(File {
            name: name.into(),
            source: source.into(),
        });
        FileIdx(idx as u32)
    }

    fn add_pos(&self, file: FileIdx, start: usize, end: usize) -> PosIdx {
        let idx = self.spans.push(PosData { file, start, end });
        PosIdx(idx as u32)
    }

    fn pos(&self, pos: PosIdx) -> &PosData {
        &self.spans[pos.0 as usize]
    }

    fn file(&self, file: FileIdx) -> &File {
        &self.files[file.0 as usize]
    }
}

static POS_TABLE: LazyLock<PositionTable> = LazyLock::new(PositionTable::new);

/// The process-wide position table.
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    pub fn add_file(name: String, source: String) -> FileIdx {
        POS_TABLE.add_file(name, source)
    }

    pub fn add_pos(file: FileIdx, start: usize, end: usize) -> PosIdx {
        POS_TABLE.add_pos(file, start, end)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// A position index backed by the global [PositionTable].
pub struct GPosIdx(pub PosIdx);

impl Default for GPosIdx {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl GPosIdx {
    /// Symbol for the unknown position.
    pub const UNKNOWN: GPosIdx = GPosIdx(PositionTable::UNKNOWN);

    /// Convert the position into an optional.
    /// Returns `None` if the position is the unknown position.
    pub fn into_option(self) -> Option<Self> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self)
        }
    }

    /// The 1-based line and column of the start of this span.
    fn line_col(&self) -> (usize, usize) {
        let data = POS_TABLE.pos(self.0);
        let source = &POS_TABLE.file(data.file).source;
        let mut line = 1;
        let mut col = 1;
        for (off, ch) in source.char_indices() {
            if off >= data.start {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// The source line containing the start of this span.
    fn line_text(&self) -> &'static str {
        let data = POS_TABLE.pos(self.0);
        let source = &POS_TABLE.file(data.file).source;
        let start = source[..data.start].rfind('\n').map_or(0, |p| p + 1);
        let end = source[data.start..]
            .find('\n')
            .map_or(source.len(), |p| data.start + p);
        &source[start..end]
    }

    /// Format this position with the message `msg`, rendering the source
    /// line with a marker under the span.
    pub fn format<S: AsRef<str>>(&self, msg: S) -> String {
        let data = POS_TABLE.pos(self.0);
        let name = &POS_TABLE.file(data.file).name;
        let (line, col) = self.line_col();
        let text = self.line_text();

        let mut buf = String::new();
        writeln!(buf, "{name}:{line}:{col}").unwrap();
        let gutter = format!("{line} ");
        writeln!(buf, "{gutter}|{text}").unwrap();
        let avail = text.len().saturating_sub(col - 1).max(1);
        let marker = "^".repeat((data.end - data.start).clamp(1, avail));
        write!(
            buf,
            "{}|{}{} {}",
            " ".repeat(gutter.len()),
            " ".repeat(col - 1),
            marker,
            msg.as_ref()
        )
        .unwrap();
        buf
    }

    /// The `(file, start, end)` triple backing this position.
    pub fn location(&self) -> (&str, usize, usize) {
        let data = POS_TABLE.pos(self.0);
        (&POS_TABLE.file(data.file).name, data.start, data.end)
    }
}

/// An IR node that may carry position information.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> GPosIdx;
}

impl WithPos for GPosIdx {
    fn copy_span(&self) -> GPosIdx {
        *self
    }
}
