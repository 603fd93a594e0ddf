/// FFmpeg's `;FFMETADATA1` chapter format
///
/// Writing produces exactly what `ffmpeg -map_chapters` expects from a chapters
/// sidecar. Reading accepts documents written by us or by `ffmpeg -f ffmetadata`.
use super::{Chapter, ParsedChapter};
use thiserror::Error;

pub const HEADER: &str = ";FFMETADATA1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Missing ;FFMETADATA1 header")]
    MissingHeader,

    #[error("Invalid TIMEBASE on line {line}: {value}")]
    InvalidTimebase { line: usize, value: String },

    #[error("Invalid {key} value on line {line}: {value}")]
    InvalidNumber { line: usize, key: String, value: String },

    #[error("Chapter starting on line {line} has no START")]
    MissingStart { line: usize },
}

/// Serialize chapters for FFmpeg.
///
/// Each chapter ends where the next one starts; the last one ends at
/// `duration`. Titles lose their leading and trailing spaces, nothing else
/// is altered.
pub fn to_ffmetadata(chapters: &[Chapter], duration: u64) -> String {
    let mut lines = Vec::with_capacity(1 + chapters.len() * 5);
    lines.push(HEADER.to_string());

    for (i, chapter) in chapters.iter().enumerate() {
        let end = chapters.get(i + 1).map_or(duration, |next| next.offset);
        lines.push("[CHAPTER]".to_string());
        lines.push("TIMEBASE=1/1000".to_string());
        lines.push(format!("START={}", chapter.offset));
        lines.push(format!("END={}", end));
        lines.push(format!("title={}", chapter.name.trim_matches(' ')));
    }

    lines.join("\n")
}

/// Chapter section being accumulated while reading
struct PendingChapter {
    line: usize,
    timebase: (u64, u64),
    start: Option<u64>,
    end: Option<u64>,
    title: Option<String>,
}

impl PendingChapter {
    fn new(line: usize) -> Self {
        Self {
            line,
            timebase: (1, 1000),
            start: None,
            end: None,
            title: None,
        }
    }

    fn finish(self, index: usize) -> Result<ParsedChapter, MetadataError> {
        let start = self.start.ok_or(MetadataError::MissingStart { line: self.line })?;
        let offset = to_millis(start, self.timebase);
        let end = self.end.map(|end| to_millis(end, self.timebase)).unwrap_or(offset);

        Ok(ParsedChapter {
            name: self.title.unwrap_or_else(|| format!("Chapter {}", index + 1)),
            offset,
            duration: end.saturating_sub(offset),
        })
    }
}

/// Read the chapters of an FFMETADATA document, in document order
pub fn parse_ffmetadata(text: &str) -> Result<Vec<ParsedChapter>, MetadataError> {
    let lines = logical_lines(text);

    match lines.first() {
        Some((_, first)) if first.trim_end() == HEADER => {}
        _ => return Err(MetadataError::MissingHeader),
    }

    let mut chapters = Vec::new();
    let mut pending: Option<PendingChapter> = None;

    for (line_no, line) in lines.iter().skip(1) {
        let line_no = *line_no;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some(chapter) = pending.take() {
                chapters.push(chapter.finish(chapters.len())?);
            }
            if trimmed == "[CHAPTER]" {
                pending = Some(PendingChapter::new(line_no));
            }
            continue;
        }

        // Global and stream keys are not ours to keep
        let Some(chapter) = pending.as_mut() else {
            continue;
        };

        let Some((key, value)) = split_key_value(line) else {
            continue;
        };

        match key.to_ascii_uppercase().as_str() {
            "TIMEBASE" => chapter.timebase = parse_timebase(&value).ok_or_else(|| {
                MetadataError::InvalidTimebase { line: line_no, value: value.clone() }
            })?,
            "START" => chapter.start = Some(parse_number(line_no, "START", &value)?),
            "END" => chapter.end = Some(parse_number(line_no, "END", &value)?),
            "TITLE" => chapter.title = Some(value),
            _ => {}
        }
    }

    if let Some(chapter) = pending.take() {
        chapters.push(chapter.finish(chapters.len())?);
    }

    Ok(chapters)
}

/// Join backslash-continued lines, keeping the number of the first physical line
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (i, raw) in text.lines().enumerate() {
        let (start, mut buffer) = current.take().unwrap_or((i + 1, String::new()));
        buffer.push_str(raw);

        if ends_with_escape(&buffer) {
            // Keep the escaped newline so the value reader can restore it
            buffer.push('\n');
            current = Some((start, buffer));
        } else {
            lines.push((start, buffer));
        }
    }

    if let Some(rest) = current {
        lines.push(rest);
    }
    lines
}

/// True when the line ends with an odd number of backslashes
fn ends_with_escape(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split on the first unescaped '=' and unescape the value
fn split_key_value(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                if in_value {
                    value.push(escaped);
                } else {
                    key.push(escaped);
                }
            }
            '=' if !in_value => in_value = true,
            _ if in_value => value.push(c),
            _ => key.push(c),
        }
    }

    in_value.then(|| (key.trim().to_string(), value))
}

fn parse_timebase(value: &str) -> Option<(u64, u64)> {
    let (num, den) = value.trim().split_once('/')?;
    let num: u64 = num.trim().parse().ok()?;
    let den: u64 = den.trim().parse().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

fn parse_number(line: usize, key: &str, value: &str) -> Result<u64, MetadataError> {
    value.trim().parse().map_err(|_| MetadataError::InvalidNumber {
        line,
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Convert a timestamp expressed in `num/den` seconds to milliseconds
fn to_millis(value: u64, (num, den): (u64, u64)) -> u64 {
    let millis = value as u128 * num as u128 * 1000 / den as u128;
    millis.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(name: &str, offset: u64) -> Chapter {
        Chapter::new(name, offset)
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(to_ffmetadata(&[], 5000), ";FFMETADATA1");
    }

    #[test]
    fn test_serialize_chapters() {
        let chapters = vec![chapter("A", 0), chapter(" B ", 1000)];
        let expected = ";FFMETADATA1\n\
            [CHAPTER]\nTIMEBASE=1/1000\nSTART=0\nEND=1000\ntitle=A\n\
            [CHAPTER]\nTIMEBASE=1/1000\nSTART=1000\nEND=5000\ntitle=B";
        assert_eq!(to_ffmetadata(&chapters, 5000), expected);
    }

    #[test]
    fn test_serialize_trims_spaces_only() {
        let chapters = vec![chapter("\t Tab stays\t ", 0)];
        let text = to_ffmetadata(&chapters, 10);
        assert!(text.ends_with("title=\t Tab stays\t"));

        let chapters = vec![chapter("  a=b; #c  ", 0)];
        assert!(to_ffmetadata(&chapters, 10).ends_with("title=a=b; #c"));
    }

    #[test]
    fn test_parse_own_output() {
        let chapters = vec![chapter("Intro", 0), chapter("Guard", 1500), chapter("Outro", 4000)];
        let parsed = parse_ffmetadata(&to_ffmetadata(&chapters, 6000)).unwrap();

        let offsets: Vec<u64> = parsed.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 1500, 4000]);
        assert_eq!(parsed[1], ParsedChapter::new("Guard", 1500, 2500));
        assert_eq!(parsed[2].duration, 2000);
    }

    #[test]
    fn test_parse_ffmpeg_dump() {
        let text = ";FFMETADATA1\n\
            major_brand=isom\n\
            encoder=Lavf60.3.100\n\
            \n\
            [CHAPTER]\n\
            TIMEBASE=1/1000000\n\
            START=0\n\
            END=2500000\n\
            title=Opening \\= part 1\n\
            [STREAM]\n\
            title=ignored\n\
            [CHAPTER]\n\
            TIMEBASE=1/1\n\
            START=3\n\
            END=10\n";

        let parsed = parse_ffmetadata(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ParsedChapter::new("Opening = part 1", 0, 2500));
        assert_eq!(parsed[1], ParsedChapter::new("Chapter 2", 3000, 7000));
    }

    #[test]
    fn test_parse_escaped_newline() {
        let text = ";FFMETADATA1\n[CHAPTER]\nSTART=0\ntitle=two\\\nlines\n";
        let parsed = parse_ffmetadata(text).unwrap();
        assert_eq!(parsed[0].name, "two\nlines");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_ffmetadata(""), Err(MetadataError::MissingHeader));
        assert_eq!(parse_ffmetadata("[CHAPTER]\nSTART=0"), Err(MetadataError::MissingHeader));

        assert!(matches!(
            parse_ffmetadata(";FFMETADATA1\n[CHAPTER]\nTIMEBASE=0/1000\nSTART=0"),
            Err(MetadataError::InvalidTimebase { line: 3, .. })
        ));
        assert!(matches!(
            parse_ffmetadata(";FFMETADATA1\n[CHAPTER]\nSTART=soon"),
            Err(MetadataError::InvalidNumber { line: 3, .. })
        ));
        assert_eq!(
            parse_ffmetadata(";FFMETADATA1\n[CHAPTER]\ntitle=x\n[CHAPTER]\nSTART=1"),
            Err(MetadataError::MissingStart { line: 2 })
        );
    }
}
