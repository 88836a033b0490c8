// src/descriptor.rs

use std::{
    collections::{BTreeSet, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, instrument, trace, warn};

use crate::error::{CompileError, CompileResult};
use crate::schema::{ColumnSpec, LengthUnit, OffsetRange};

/// Name field that ends the record layout.
pub const END_OF_RECORD: &str = "EOR";

/// Columns of a format file, in descriptor order, with their record slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorLayout {
    columns: Vec<ColumnSpec>,
    ranges: Vec<OffsetRange>,
}

impl DescriptorLayout {
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn ranges(&self) -> &[OffsetRange] {
        &self.ranges
    }

    /// Total width of one fixed-width record.
    pub fn record_width(&self) -> usize {
        self.ranges.last().map(|r| r.last).unwrap_or(0)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub(crate) fn into_parts(self) -> (Vec<ColumnSpec>, Vec<OffsetRange>) {
        (self.columns, self.ranges)
    }
}

/// Open and parse the format file at `path`.
///
/// The handle lives only for the duration of this call.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_descriptor(
    path: &Path,
    char_columns: &BTreeSet<String>,
) -> CompileResult<DescriptorLayout> {
    let file = File::open(path).map_err(|source| CompileError::DescriptorIo {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    parse_descriptor(
        reader.lines().map(|line| {
            line.map_err(|source| CompileError::DescriptorIo {
                path: path.to_path_buf(),
                source,
            })
        }),
        char_columns,
    )
}

/// Parse `NAME,LENGTH[,...]` lines up to the `EOR` sentinel.
///
/// Lines are pulled lazily, so nothing after the sentinel is read.
pub fn parse_descriptor<I, S>(
    lines: I,
    char_columns: &BTreeSet<String>,
) -> CompileResult<DescriptorLayout>
where
    I: IntoIterator<Item = CompileResult<S>>,
    S: AsRef<str>,
{
    debug!("Starting descriptor parsing");

    let mut columns = Vec::new();
    let mut ranges = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset: usize = 0;
    let mut terminated = false;
    let mut line_no = 0;

    for line in lines {
        line_no += 1;
        let line = line?;
        let line = line.as_ref();
        if line.trim().is_empty() {
            return Err(CompileError::parse(line_no, "blank line"));
        }

        let mut parts = line.split(',');
        let name = parts.next().unwrap_or("").trim().to_uppercase();
        if name == END_OF_RECORD {
            trace!(line = line_no, "Reached end-of-record marker");
            terminated = true;
            break;
        }
        if name.is_empty() {
            return Err(CompileError::parse(line_no, "empty column name"));
        }

        let raw_len = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| CompileError::parse(line_no, format!("`{}` has no length", name)))?;
        let length: usize = raw_len.parse().map_err(|_| {
            CompileError::parse(
                line_no,
                format!("length `{}` of `{}` is not an integer", raw_len, name),
            )
        })?;
        if length == 0 {
            return Err(CompileError::parse(
                line_no,
                format!("`{}` has zero length", name),
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(CompileError::parse(
                line_no,
                format!("`{}` is declared more than once", name),
            ));
        }

        let unit = if char_columns.contains(&name) {
            LengthUnit::Char
        } else {
            LengthUnit::Byte
        };
        let overflow =
            || CompileError::parse(line_no, format!("offset overflow at `{}`", name));
        let first = offset.checked_add(1).ok_or_else(overflow)?;
        let last = offset.checked_add(length).ok_or_else(overflow)?;
        trace!(name = %name, length, unit = %unit, first, last, "Parsed column");

        ranges.push(OffsetRange {
            column_name: name.clone(),
            first,
            last,
        });
        columns.push(ColumnSpec::new(&name, length, unit));
        offset = last;
    }

    if !terminated {
        warn!("Descriptor ended without an {} line", END_OF_RECORD);
    }
    if columns.is_empty() {
        return Err(CompileError::parse(line_no, "descriptor declares no columns"));
    }

    debug!(columns = columns.len(), width = offset, "Finished descriptor parsing");
    Ok(DescriptorLayout { columns, ranges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(text: &str, chars: &[&str]) -> CompileResult<DescriptorLayout> {
        let chars: BTreeSet<String> = chars.iter().map(|s| s.to_string()).collect();
        parse_descriptor(text.lines().map(Ok), &chars)
    }

    #[test]
    fn offsets_are_one_based_and_cumulative() {
        let layout = parse("NAME,10\nADDR,20\nEOR,0\n", &[]).unwrap();
        let spans: Vec<_> = layout
            .ranges()
            .iter()
            .map(|r| (r.column_name.as_str(), r.first, r.last))
            .collect();
        assert_eq!(spans, vec![("NAME", 1, 10), ("ADDR", 11, 30)]);
        assert_eq!(layout.record_width(), 30);
        assert!(layout
            .columns()
            .iter()
            .all(|c| c.unit() == LengthUnit::Byte));
    }

    #[test]
    fn ranges_are_contiguous() {
        let text = "a,1\nb,7\nc,3\nd,12\ne,1\nEOR,0";
        let layout = parse(text, &[]).unwrap();
        let ranges = layout.ranges();
        assert_eq!(ranges[0].first, 1);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].first, pair[0].last + 1);
        }
        for (col, r) in layout.columns().iter().zip(ranges) {
            assert_eq!(r.last - r.first + 1, col.length());
        }
    }

    #[test]
    fn char_set_selects_unit() {
        let layout = parse("city,15\nzip,5\nEOR", &["CITY"]).unwrap();
        assert_eq!(layout.columns()[0].name(), "CITY");
        assert_eq!(layout.columns()[0].unit(), LengthUnit::Char);
        assert_eq!(layout.columns()[1].unit(), LengthUnit::Byte);
    }

    #[test]
    fn stops_at_sentinel_and_ignores_extra_fields() {
        let layout = parse(
            "NAME,10,A,left\r\nEOR,0\nGARBAGE,not-a-number\n",
            &[],
        )
        .unwrap();
        assert_eq!(layout.columns().len(), 1);
        let expected: BTreeSet<String> = ["NAME".to_string()].into_iter().collect();
        assert_eq!(layout.names(), expected);
    }

    #[test]
    fn lines_after_sentinel_are_not_pulled() {
        let chars = BTreeSet::new();
        let lines = vec![
            Ok("NAME,10".to_string()),
            Ok("EOR,0".to_string()),
            Err(CompileError::parse(3, "should never be read")),
        ];
        assert!(parse_descriptor(lines, &chars).is_ok());
    }

    #[test]
    fn malformed_lines_are_fatal() {
        let err = parse("NAME,ten\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 1, .. }));

        let err = parse("NAME,10\nADDR\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));

        let err = parse("NAME,0\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 1, .. }));

        let err = parse("NAME,-4\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 1, .. }));

        let err = parse("NAME,4\nname,4\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));
    }

    #[test]
    fn missing_sentinel_is_tolerated_but_empty_is_not() {
        let layout = parse("NAME,10\nADDR,2\n", &[]).unwrap();
        assert_eq!(layout.record_width(), 12);

        assert!(parse("EOR,0\n", &[]).is_err());
    }

    #[test]
    fn blank_line_inside_record_is_fatal() {
        let err = parse("NAME,10\n\nADDR,20\nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));

        let err = parse("NAME,10\n   \nEOR,0", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));
    }

    #[test]
    fn blank_lines_after_sentinel_are_ignored() {
        let layout = parse("NAME,10\nEOR,0\n\n\n", &[]).unwrap();
        assert_eq!(layout.record_width(), 10);
    }

    #[test]
    fn offset_overflow_is_a_parse_error() {
        let text = format!("A,{}\nB,1\nEOR,0", usize::MAX);
        let err = parse(&text, &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));

        let text = format!("A,{}\nB,2\nEOR,0", usize::MAX - 1);
        let err = parse(&text, &[]).unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 2, .. }));
    }

    #[test]
    fn read_descriptor_from_file() -> anyhow::Result<()> {
        let mut f = NamedTempFile::new()?;
        write!(f, "name,10\naddr,20\nEOR,0\n")?;
        let layout = read_descriptor(f.path(), &BTreeSet::new())?;
        assert_eq!(layout.ranges()[1].first, 11);
        Ok(())
    }

    #[test]
    fn unreadable_descriptor_is_io_error() {
        let err = read_descriptor(Path::new("/nonexistent/format.fmt"), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::DescriptorIo { .. }));
    }
}
