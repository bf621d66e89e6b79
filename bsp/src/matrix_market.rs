//! Matrix market import
//!
//! Reads `%%MatrixMarket matrix` text files in `coordinate` or `array`
//! layout into any container implementing [`AssignCoordinates`]. The
//! container is built by the caller, so persistent-heap containers are filled
//! in place. Entries are deduplicated, expanded and sorted here; containers
//! only see the final coordinate list.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use bsp_core::{BinsparseError, Element, Order, Result, Structure};
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use crate::config::{DuplicatePolicy, ImportOptions};
use crate::containers::AssignCoordinates;
use crate::io_error;

const BANNER: &str = "%%MatrixMarket";

/// Upper bound on entries reserved up front from the size line
const MAX_PRESIZED_ENTRIES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One `row col [value]` line per stored entry
    Coordinate,
    /// Every value in column-major order
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Real,
    Double,
    Integer,
    /// Coordinates only; every stored value is one
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
    /// Treated as symmetric since only real fields are supported
    Hermitian,
}

impl Symmetry {
    fn lower_structure(self) -> Structure {
        match self {
            Symmetry::General => Structure::General,
            Symmetry::Symmetric => Structure::SymmetricLower,
            Symmetry::SkewSymmetric => Structure::SkewSymmetricLower,
            Symmetry::Hermitian => Structure::HermitianLower,
        }
    }

    fn mirror<T: Element>(self, value: T) -> T {
        match self {
            Symmetry::SkewSymmetric => value.negate(),
            _ => value,
        }
    }
}

/// What the banner and size line declared, plus the final entry count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixMarketHeader {
    pub layout: Layout,
    pub field: Field,
    pub symmetry: Symmetry,
    pub nrows: usize,
    pub ncols: usize,
    /// Entry lines announced by the size line
    pub declared_entries: usize,
    /// Entries handed to the container after expansion and deduplication
    pub stored_entries: usize,
}

/// Import the file at `path` into `container`
pub fn read_matrix_market<T, C>(
    path: impl AsRef<Path>,
    options: &ImportOptions,
    container: &mut C,
) -> Result<MatrixMarketHeader>
where
    T: Element,
    C: AssignCoordinates<T> + ?Sized,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error(path.display().to_string(), e))?;
    let header = parse_matrix_market(BufReader::new(file), options, container)?;
    tracing::debug!(path = %path.display(), "read matrix market file");
    Ok(header)
}

/// Import matrix market text from `reader` into `container`
///
/// Fails with `ParseError` carrying the 1-based line (and column when a
/// single field is at fault) for a malformed banner or size line, an index
/// outside the declared shape, a non-numeric field, or a number of entries
/// that differs from the size line.
pub fn parse_matrix_market<R, T, C>(
    reader: R,
    options: &ImportOptions,
    container: &mut C,
) -> Result<MatrixMarketHeader>
where
    R: BufRead,
    T: Element,
    C: AssignCoordinates<T> + ?Sized,
{
    let mut lines = ContentLines {
        inner: reader.lines(),
        line_no: 0,
    };
    let banner = lines
        .next_raw()?
        .ok_or_else(|| BinsparseError::parse(1, None, "empty input"))?;
    let (layout, field, symmetry) = parse_banner(&banner)?;

    let (size_line_no, size_line) = lines
        .next_content()?
        .ok_or_else(|| BinsparseError::parse(lines.line_no + 1, None, "missing size line"))?;
    let (nrows, ncols, declared) = parse_size(size_line_no, &size_line, layout, symmetry)?;

    // The declared count is untrusted; grow past this instead of trusting it
    let capacity = declared.min(MAX_PRESIZED_ENTRIES);
    let mut collector = Collector::new(options.duplicates, field == Field::Pattern, capacity);
    let mut positions = array_positions(nrows, ncols, symmetry);
    let mut count = 0usize;
    while let Some((line_no, line)) = lines.next_content()? {
        if count == declared {
            return Err(BinsparseError::parse(
                line_no,
                None,
                format!("expected {declared} entries, found more"),
            ));
        }
        let (row, col, value) = match layout {
            Layout::Coordinate => parse_coordinate(line_no, &line, nrows, ncols, field)?,
            Layout::Array => {
                let (row, col) = positions.next().ok_or_else(|| {
                    BinsparseError::parse(line_no, None, format!("expected {declared} entries, found more"))
                })?;
                (row, col, parse_array_value(line_no, &line)?)
            }
        };
        collector.insert(row, col, value);
        if options.expand_symmetry && symmetry != Symmetry::General && row != col {
            collector.insert(col, row, symmetry.mirror(value));
        }
        count += 1;
    }
    if count < declared {
        return Err(BinsparseError::parse(
            lines.line_no,
            None,
            format!("expected {declared} entries, found {count}"),
        ));
    }

    let mut entries = collector.entries;
    match container.preferred_order() {
        Order::RowMajor => entries.sort_unstable_by_key(|&(row, col, _)| (row, col)),
        Order::ColumnMajor => entries.sort_unstable_by_key(|&(row, col, _)| (col, row)),
    }
    let iso = (field == Field::Pattern && options.iso_pattern).then_some(T::ONE);
    container.assign_coordinates(nrows, ncols, &entries, iso)?;
    let structure = if options.expand_symmetry {
        Structure::General
    } else {
        symmetry.lower_structure()
    };
    container.assign_structure(structure)?;

    tracing::debug!(
        ?layout,
        ?field,
        ?symmetry,
        nrows,
        ncols,
        declared,
        stored = entries.len(),
        "imported matrix market data"
    );
    Ok(MatrixMarketHeader {
        layout,
        field,
        symmetry,
        nrows,
        ncols,
        declared_entries: declared,
        stored_entries: entries.len(),
    })
}

struct ContentLines<R> {
    inner: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> ContentLines<R> {
    fn next_raw(&mut self) -> Result<Option<String>> {
        match self.inner.next() {
            Some(line) => {
                self.line_no += 1;
                line.map(Some)
                    .map_err(|e| io_error("matrix market input", e))
            }
            None => Ok(None),
        }
    }

    /// Next line that is neither blank nor a `%` comment
    fn next_content(&mut self) -> Result<Option<(usize, String)>> {
        while let Some(line) = self.next_raw()? {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('%') {
                continue;
            }
            return Ok(Some((self.line_no, line)));
        }
        Ok(None)
    }
}

/// Whitespace-separated fields paired with their 1-based column
struct Fields<'a> {
    line: &'a str,
    pos: usize,
}

fn fields(line: &str) -> Fields<'_> {
    Fields { line, pos: 0 }
}

impl<'a> Iterator for Fields<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.pos + self.line[self.pos..].find(|c: char| !c.is_whitespace())?;
        let len = self.line[start..]
            .find(char::is_whitespace)
            .unwrap_or(self.line.len() - start);
        self.pos = start + len;
        Some((start + 1, &self.line[start..start + len]))
    }
}

fn parse_banner(line: &str) -> Result<(Layout, Field, Symmetry)> {
    let mut tokens = fields(line);
    match tokens.next() {
        Some((_, token)) if token.eq_ignore_ascii_case(BANNER) => {}
        _ => {
            return Err(BinsparseError::parse(
                1,
                Some(1),
                format!("first line must start with {BANNER}"),
            ))
        }
    }
    let mut next = |what: &str| {
        tokens
            .next()
            .map(|(column, token)| (column, token.to_ascii_lowercase()))
            .ok_or_else(|| BinsparseError::parse(1, None, format!("banner has no {what}")))
    };

    let (column, object) = next("object")?;
    if object != "matrix" {
        return Err(BinsparseError::parse(
            1,
            Some(column),
            format!("unsupported object '{object}'"),
        ));
    }

    let (column, layout) = next("format")?;
    let layout = match layout.as_str() {
        "coordinate" => Layout::Coordinate,
        "array" => Layout::Array,
        other => {
            return Err(BinsparseError::parse(
                1,
                Some(column),
                format!("unknown format '{other}'"),
            ))
        }
    };

    let (column, field) = next("field")?;
    let field = match field.as_str() {
        "real" => Field::Real,
        "double" => Field::Double,
        "integer" => Field::Integer,
        "pattern" if layout == Layout::Coordinate => Field::Pattern,
        "pattern" => {
            return Err(BinsparseError::parse(
                1,
                Some(column),
                "pattern field requires coordinate format",
            ))
        }
        "complex" => {
            return Err(BinsparseError::parse(
                1,
                Some(column),
                "complex values are not supported",
            ))
        }
        other => {
            return Err(BinsparseError::parse(
                1,
                Some(column),
                format!("unknown field '{other}'"),
            ))
        }
    };

    let (column, symmetry) = next("symmetry")?;
    let symmetry = match symmetry.as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        "skew-symmetric" => Symmetry::SkewSymmetric,
        "hermitian" => Symmetry::Hermitian,
        other => {
            return Err(BinsparseError::parse(
                1,
                Some(column),
                format!("unknown symmetry '{other}'"),
            ))
        }
    };
    Ok((layout, field, symmetry))
}

/// `(nrows, ncols, entry lines)` from the size line
fn parse_size(
    line_no: usize,
    line: &str,
    layout: Layout,
    symmetry: Symmetry,
) -> Result<(usize, usize, usize)> {
    let values = fields(line)
        .map(|(column, token)| {
            token.parse::<usize>().map_err(|_| {
                BinsparseError::parse(line_no, Some(column), format!("invalid size '{token}'"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let (nrows, ncols, declared) = match (layout, values.as_slice()) {
        (Layout::Coordinate, &[nrows, ncols, entries]) => (nrows, ncols, Some(entries)),
        (Layout::Array, &[nrows, ncols]) => (nrows, ncols, None),
        (Layout::Coordinate, _) => {
            return Err(BinsparseError::parse(
                line_no,
                None,
                "coordinate size line needs rows, columns and entries",
            ))
        }
        (Layout::Array, _) => {
            return Err(BinsparseError::parse(
                line_no,
                None,
                "array size line needs rows and columns",
            ))
        }
    };
    if symmetry != Symmetry::General && nrows != ncols {
        return Err(BinsparseError::parse(
            line_no,
            None,
            format!("{symmetry:?} matrix must be square, found {nrows}x{ncols}"),
        ));
    }

    let declared = match declared {
        Some(entries) => entries,
        None => {
            let count = match symmetry {
                Symmetry::General => nrows.checked_mul(ncols),
                Symmetry::SkewSymmetric => nrows.checked_mul(nrows.saturating_sub(1)).map(|n| n / 2),
                _ => nrows
                    .checked_add(1)
                    .and_then(|n| n.checked_mul(nrows))
                    .map(|n| n / 2),
            };
            count.ok_or_else(|| {
                BinsparseError::parse(line_no, None, format!("{nrows}x{ncols} is too large"))
            })?
        }
    };
    Ok((nrows, ncols, declared))
}

/// Column-major positions of the values an array file stores
fn array_positions(
    nrows: usize,
    ncols: usize,
    symmetry: Symmetry,
) -> impl Iterator<Item = (usize, usize)> {
    (0..ncols)
        .flat_map(move |col| (0..nrows).map(move |row| (row, col)))
        .filter(move |&(row, col)| match symmetry {
            Symmetry::General => true,
            Symmetry::SkewSymmetric => row > col,
            _ => row >= col,
        })
}

fn parse_coordinate<T: Element>(
    line_no: usize,
    line: &str,
    nrows: usize,
    ncols: usize,
    field: Field,
) -> Result<(usize, usize, T)> {
    let mut tokens = fields(line);
    let row = parse_index(line_no, tokens.next(), nrows, "row")?;
    let col = parse_index(line_no, tokens.next(), ncols, "column")?;
    let value = match field {
        Field::Pattern => T::ONE,
        _ => parse_value(line_no, tokens.next())?,
    };
    reject_trailing(line_no, tokens)?;
    Ok((row, col, value))
}

fn parse_array_value<T: Element>(line_no: usize, line: &str) -> Result<T> {
    let mut tokens = fields(line);
    let value = parse_value(line_no, tokens.next())?;
    reject_trailing(line_no, tokens)?;
    Ok(value)
}

/// 1-based index in `1..=bound`, returned 0-based
fn parse_index(
    line_no: usize,
    field: Option<(usize, &str)>,
    bound: usize,
    what: &str,
) -> Result<usize> {
    let (column, token) = field
        .ok_or_else(|| BinsparseError::parse(line_no, None, format!("missing {what} index")))?;
    match token.parse::<usize>() {
        Ok(index) if (1..=bound).contains(&index) => Ok(index - 1),
        Ok(index) => Err(BinsparseError::parse(
            line_no,
            Some(column),
            format!("{what} index {index} outside 1..={bound}"),
        )),
        Err(_) => Err(BinsparseError::parse(
            line_no,
            Some(column),
            format!("invalid {what} index '{token}'"),
        )),
    }
}

fn parse_value<T: Element>(line_no: usize, field: Option<(usize, &str)>) -> Result<T> {
    let (column, token) =
        field.ok_or_else(|| BinsparseError::parse(line_no, None, "missing value"))?;
    T::parse_token(token).ok_or_else(|| {
        BinsparseError::parse(
            line_no,
            Some(column),
            format!("invalid {} value '{token}'", T::DATA_TYPE),
        )
    })
}

fn reject_trailing(line_no: usize, mut tokens: Fields<'_>) -> Result<()> {
    match tokens.next() {
        Some((column, token)) => Err(BinsparseError::parse(
            line_no,
            Some(column),
            format!("unexpected field '{token}'"),
        )),
        None => Ok(()),
    }
}

/// Coordinate list with one entry per position
struct Collector<T> {
    entries: Vec<(usize, usize, T)>,
    positions: HashMap<(usize, usize), usize>,
    policy: DuplicatePolicy,
    pattern: bool,
}

impl<T: Element> Collector<T> {
    fn new(policy: DuplicatePolicy, pattern: bool, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            policy,
            pattern,
        }
    }

    fn insert(&mut self, row: usize, col: usize, value: T) {
        match self.positions.entry((row, col)) {
            Entry::Occupied(slot) => {
                // Pattern duplicates collapse to a single one
                if self.pattern {
                    return;
                }
                let stored = &mut self.entries[*slot.get()].2;
                *stored = match self.policy {
                    DuplicatePolicy::Sum => stored.accumulate(value),
                    DuplicatePolicy::KeepLast => value,
                };
            }
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push((row, col, value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{CooMatrix, CscMatrix, CsrMatrix, DenseMatrix};
    use bsp_core::MatrixView;

    fn import<C: AssignCoordinates<f64>>(
        text: &str,
        options: &ImportOptions,
        container: &mut C,
    ) -> Result<MatrixMarketHeader> {
        parse_matrix_market(text.as_bytes(), options, container)
    }

    fn parse_error(result: Result<MatrixMarketHeader>) -> (usize, Option<usize>, String) {
        match result {
            Err(BinsparseError::ParseError {
                line,
                column,
                message,
            }) => (line, column, message),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_fields_columns() {
        let collected: Vec<_> = fields("  12 3\t-4.5 ").collect();
        assert_eq!(collected, vec![(3, "12"), (6, "3"), (8, "-4.5")]);
        assert_eq!(fields("   ").next(), None);
    }

    #[test]
    fn test_general_coordinate() {
        let text = "%%MatrixMarket matrix coordinate real general\n\
                    % comment\n\
                    3 4 3\n\
                    3 4 2.5\n\
                    1 1 1.0\n\
                    \n\
                    2 3 -1\n";
        let mut matrix = CsrMatrix::<f64, u32>::new();
        let header = import(text, &ImportOptions::default(), &mut matrix).unwrap();

        assert_eq!(header.layout, Layout::Coordinate);
        assert_eq!((header.nrows, header.ncols), (3, 4));
        assert_eq!(header.stored_entries, 3);
        assert_eq!(matrix.row_ptr(), &[0, 1, 2, 3]);
        assert_eq!(matrix.view().get(2, 3), Some(2.5));
        assert_eq!(matrix.view().get(1, 2), Some(-1.0));
        assert!(matrix.view().validate().is_ok());
    }

    #[test]
    fn test_skew_symmetric_expansion() {
        let text = "%%MatrixMarket matrix coordinate real skew-symmetric\n\
                    3 3 2\n\
                    2 1 4\n\
                    3 1 -2\n";
        let mut matrix = CscMatrix::<f64, u64>::new();
        import(text, &ImportOptions::default(), &mut matrix).unwrap();

        let view = matrix.view();
        assert_eq!(view.nnz(), 4);
        assert_eq!(view.get(1, 0), Some(4.0));
        assert_eq!(view.get(0, 1), Some(-4.0));
        assert_eq!(view.get(0, 2), Some(2.0));
        assert_eq!(matrix.structure(), Structure::General);
    }

    #[test]
    fn test_symmetric_kept_lower() {
        let text = "%%MatrixMarket matrix coordinate real symmetric\n\
                    3 3 3\n\
                    1 1 4\n\
                    2 1 1\n\
                    3 2 2\n";
        let mut matrix = CooMatrix::<f64, u32>::new();
        let options = ImportOptions::default().with_expand_symmetry(false);
        let header = import(text, &options, &mut matrix).unwrap();

        assert_eq!(header.stored_entries, 3);
        assert_eq!(matrix.structure(), Structure::SymmetricLower);
        assert_eq!(matrix.view().get(0, 1), None);
    }

    #[test]
    fn test_duplicate_policies() {
        let text = "%%MatrixMarket matrix coordinate real general\n\
                    2 2 3\n\
                    1 2 1.5\n\
                    2 1 1\n\
                    1 2 2\n";
        let mut summed = CooMatrix::<f64, u32>::new();
        import(text, &ImportOptions::default(), &mut summed).unwrap();
        assert_eq!(summed.stored_count(), 2);
        assert_eq!(summed.view().get(0, 1), Some(3.5));

        let mut last = CooMatrix::<f64, u32>::new();
        let options = ImportOptions::default().with_duplicates(DuplicatePolicy::KeepLast);
        import(text, &options, &mut last).unwrap();
        assert_eq!(last.view().get(0, 1), Some(2.0));
    }

    #[test]
    fn test_pattern_duplicates_stay_one() {
        let text = "%%MatrixMarket matrix coordinate pattern general\n\
                    2 2 3\n\
                    1 1\n\
                    1 1\n\
                    2 2\n";
        let mut matrix = CsrMatrix::<f64, u32>::new();
        import(text, &ImportOptions::default(), &mut matrix).unwrap();
        assert_eq!(matrix.values(), &[1.0, 1.0]);
        assert!(!matrix.is_iso());

        let mut iso = CsrMatrix::<f64, u32>::new();
        import(text, &ImportOptions::default().with_iso_pattern(true), &mut iso).unwrap();
        assert!(iso.is_iso());
        assert_eq!(iso.values(), &[1.0]);
        assert_eq!(iso.view().get(1, 1), Some(1.0));
    }

    #[test]
    fn test_array_symmetric() {
        // Lower triangle of [[1, 2], [2, 3]] in column-major order
        let text = "%%MatrixMarket matrix array real symmetric\n\
                    2 2\n\
                    1\n\
                    2\n\
                    3\n";
        let mut matrix = DenseMatrix::<f64>::new().with_order(Order::ColumnMajor);
        let header = import(text, &ImportOptions::default(), &mut matrix).unwrap();

        assert_eq!(header.declared_entries, 3);
        assert_eq!(matrix.values(), &[1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_banner_errors() {
        let mut matrix = CsrMatrix::<f64, u32>::new();
        let options = ImportOptions::default();

        let (line, column, message) = parse_error(import(
            "%%MatrixMarket matrix coordinate complex general\n1 1 0\n",
            &options,
            &mut matrix,
        ));
        assert_eq!((line, column), (1, Some(34)));
        assert!(message.contains("complex"));

        let (line, column, _) = parse_error(import("1 1 0\n", &options, &mut matrix));
        assert_eq!((line, column), (1, Some(1)));

        let (_, column, _) = parse_error(import(
            "%%MatrixMarket vector coordinate real general\n",
            &options,
            &mut matrix,
        ));
        assert_eq!(column, Some(16));

        let (line, _, _) = parse_error(import("", &options, &mut matrix));
        assert_eq!(line, 1);
    }

    #[test]
    fn test_entry_errors() {
        let mut matrix = CsrMatrix::<f64, u32>::new();
        let options = ImportOptions::default();
        let banner = "%%MatrixMarket matrix coordinate real general\n";

        let (line, column, _) =
            parse_error(import(&format!("{banner}2 2 1\n3 1 1.0\n"), &options, &mut matrix));
        assert_eq!((line, column), (3, Some(1)));

        let (line, column, _) =
            parse_error(import(&format!("{banner}2 2 1\n1 1 abc\n"), &options, &mut matrix));
        assert_eq!((line, column), (3, Some(5)));

        let (line, _, message) =
            parse_error(import(&format!("{banner}2 2 2\n1 1 1.0\n"), &options, &mut matrix));
        assert_eq!(line, 3);
        assert_eq!(message, "expected 2 entries, found 1");

        let (line, _, _) = parse_error(import(
            &format!("{banner}2 2 1\n1 1 1.0\n2 2 2.0\n"),
            &options,
            &mut matrix,
        ));
        assert_eq!(line, 4);

        let (line, column, _) =
            parse_error(import(&format!("{banner}2 x 1\n"), &options, &mut matrix));
        assert_eq!((line, column), (2, Some(3)));
    }

    #[test]
    fn test_huge_declared_sizes_are_not_reserved() {
        let mut matrix = CsrMatrix::<f64, u32>::new();
        let options = ImportOptions::default();

        let text = "%%MatrixMarket matrix coordinate real general\n\
                    3 3 100000000000000000\n\
                    1 1 1.0\n";
        let (line, _, message) = parse_error(import(text, &options, &mut matrix));
        assert_eq!(line, 3);
        assert_eq!(message, "expected 100000000000000000 entries, found 1");

        let text = "%%MatrixMarket matrix array real general\n100000000 100000000\n1.0\n";
        let (line, _, message) = parse_error(import(text, &options, &mut matrix));
        assert_eq!(line, 3);
        assert_eq!(message, "expected 10000000000000000 entries, found 1");

        let text = format!(
            "%%MatrixMarket matrix array real symmetric\n{max} {max}\n1.0\n",
            max = usize::MAX
        );
        let (line, _, message) = parse_error(import(&text, &options, &mut matrix));
        assert_eq!(line, 2);
        assert!(message.ends_with("is too large"));

        let mut dense = DenseMatrix::<f64>::new();
        let text = "%%MatrixMarket matrix coordinate real general\n100000000 100000000 1\n1 1 1.0\n";
        assert!(matches!(
            import(text, &options, &mut dense),
            Err(BinsparseError::InvalidArgument { .. })
        ));
    }
}
