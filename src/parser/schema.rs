//! Declarative table schemas for the simulator statistics report.
//!
//! The report is a sequence of titled tables. Each table is described by a
//! [`TableSchema`]: which tokens identify its title line, how many lines below
//! the title its data starts, and how many columns a data row needs. A single
//! [`Report`] reader locates titles and hands out typed cells.
//!
//! ```text
//! //                      Statistics                          <- title (matched)
//! //===--------------------------------------------------===//
//! RESOURCE  N_OPS_ISSUED  SPAN  ISSUE-SPAN  STALL-SPAN  MAX_OCCUPANCY
//! ...first data row...                                       <- title + 3
//! ```

use std::str::FromStr;

use super::ReportError;

/// How a title line is recognised.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Every `required` token is present and no `forbidden` token is.
    Tokens {
        required: &'static [&'static str],
        forbidden: &'static [&'static str],
    },
    /// The raw line contains the substring.
    Substring(&'static str),
}

/// Layout of one report table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Name used in error messages.
    pub name: &'static str,
    /// Title line predicate.
    pub matcher: Matcher,
    /// Lines between the title and the first data row.
    pub row_offset: usize,
    /// Minimum tokens in every data row (including the leading name).
    pub min_columns: usize,
}

impl TableSchema {
    fn matches(&self, raw: &str, tokens: &[&str]) -> bool {
        match self.matcher {
            Matcher::Tokens { required, forbidden } => {
                required.iter().all(|t| tokens.contains(t)) && !forbidden.iter().any(|t| tokens.contains(t))
            }
            Matcher::Substring(needle) => raw.contains(needle),
        }
    }
}

/// Per-resource statistics table.
pub const STATISTICS: TableSchema = TableSchema {
    name: "Statistics",
    matcher: Matcher::Tokens { required: &["Statistics"], forbidden: &[] },
    row_offset: 3,
    min_columns: 5,
};

/// Per-buffer stall span table.
pub const STALL_CYCLES: TableSchema = TableSchema {
    name: "Stall Cycles",
    matcher: Matcher::Tokens { required: &["Stall", "Cycles"], forbidden: &[] },
    row_offset: 3,
    min_columns: 2,
};

/// Per-buffer stall bound table.
pub const BUFFER_BOTTLENECKS: TableSchema = TableSchema {
    name: "Buffers Bottlenecks",
    matcher: Matcher::Tokens { required: &["Buffers", "Bottlenecks"], forbidden: &[] },
    row_offset: 3,
    min_columns: 2,
};

/// Resource x buffer issue-stall span table.
pub const ISSUE_STALL_SPAN: TableSchema = TableSchema {
    name: "ResourceIssue-Stall",
    matcher: Matcher::Tokens { required: &["ResourceIssue-Stall"], forbidden: &[] },
    row_offset: 3,
    min_columns: 1 + crate::resource::Buffer::COUNT,
};

/// Pairwise overlap, stall cycles excluded. Rows are triangular, so the
/// column requirement is checked per row.
pub const OVERLAP_WITHOUT_STALLS: TableSchema = TableSchema {
    name: "Resource-Resource Overlap (without stalls)",
    matcher: Matcher::Tokens {
        required: &["Resource-Resource", "Overlap", "without"],
        forbidden: &[],
    },
    row_offset: 3,
    min_columns: 1,
};

/// Pairwise overlap, stall cycles included.
pub const OVERLAP_WITH_STALLS: TableSchema = TableSchema {
    name: "Resource-Resource Overlap (with stalls)",
    matcher: Matcher::Tokens {
        required: &["Resource-Resource", "Overlap"],
        forbidden: &["without"],
    },
    row_offset: 3,
    min_columns: 1,
};

/// Grand total block; the elapsed cycle count sits six lines below.
pub const GRAND_TOTAL: TableSchema = TableSchema {
    name: "TOTAL",
    matcher: Matcher::Tokens { required: &["TOTAL"], forbidden: &["RESOURCE"] },
    row_offset: 6,
    min_columns: 3,
};

/// Floating-point operation count line.
pub const FLOPS: TableSchema = TableSchema {
    name: "FLOPS",
    matcher: Matcher::Substring("FLOPS"),
    row_offset: 0,
    min_columns: 3,
};

/// Every table a complete report must contain.
pub const REQUIRED: [TableSchema; 8] = [
    STATISTICS,
    STALL_CYCLES,
    BUFFER_BOTTLENECKS,
    ISSUE_STALL_SPAN,
    OVERLAP_WITHOUT_STALLS,
    OVERLAP_WITH_STALLS,
    GRAND_TOTAL,
    FLOPS,
];

/// A tokenised report.
#[derive(Debug)]
pub struct Report<'a> {
    raw: Vec<&'a str>,
    tokens: Vec<Vec<&'a str>>,
}

impl<'a> Report<'a> {
    pub fn new(text: &'a str) -> Self {
        let raw: Vec<&str> = text.lines().collect();
        let tokens = raw.iter().map(|line| line.split_whitespace().collect()).collect();
        Self { raw, tokens }
    }

    /// Index of the first line matching the schema's title.
    pub fn locate(&self, schema: &TableSchema) -> Result<usize, ReportError> {
        let found = self
            .raw
            .iter()
            .zip(&self.tokens)
            .position(|(raw, tokens)| schema.matches(raw, tokens));

        match found {
            Some(line) => {
                log::debug!("Section `{}` found at line {}", schema.name, line + 1);
                Ok(line)
            }
            None => Err(ReportError::SectionNotFound { section: schema.name }),
        }
    }

    /// Open a located table.
    pub fn table(&self, schema: &'static TableSchema) -> Result<Table<'_, 'a>, ReportError> {
        let title = self.locate(schema)?;
        Ok(Table { report: self, schema, title })
    }
}

/// A located table, giving access to its data rows.
#[derive(Debug, Clone, Copy)]
pub struct Table<'r, 'a> {
    report: &'r Report<'a>,
    schema: &'static TableSchema,
    title: usize,
}

impl<'r, 'a> Table<'r, 'a> {
    /// Data row `index`, checked against `min_columns` extra columns.
    pub fn row(&self, index: usize, min_columns: usize) -> Result<Row<'r, 'a>, ReportError> {
        let line = self.title + self.schema.row_offset + index;
        let min_columns = min_columns.max(self.schema.min_columns);

        let tokens = self.report.tokens.get(line).ok_or_else(|| ReportError::MalformedRow {
            section: self.schema.name,
            line: line + 1,
            reason: "report ends before this row".to_string(),
        })?;

        if tokens.len() < min_columns {
            return Err(ReportError::MalformedRow {
                section: self.schema.name,
                line: line + 1,
                reason: format!("expected at least {} columns, found {}", min_columns, tokens.len()),
            });
        }

        Ok(Row { schema: self.schema, line, tokens })
    }
}

/// One tokenised data row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'r, 'a> {
    schema: &'static TableSchema,
    line: usize,
    tokens: &'r [&'a str],
}

impl Row<'_, '_> {
    /// Parse column `column` as `T`.
    pub fn cell<T: FromStr>(&self, column: usize) -> Result<T, ReportError> {
        let token = self.tokens.get(column).ok_or_else(|| self.malformed(format!("missing column {}", column)))?;
        token
            .parse()
            .map_err(|_| self.malformed(format!("column {} `{}` is not a valid {}", column, token, std::any::type_name::<T>())))
    }

    /// Parse column `column` as a finite, non-negative count or span.
    pub fn quantity(&self, column: usize) -> Result<f64, ReportError> {
        let value: f64 = self.cell(column)?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.malformed(format!("column {} `{}` is not a non-negative finite value", column, value)));
        }
        Ok(value)
    }

    /// Build a row error pointing at this line.
    pub fn malformed(&self, reason: String) -> ReportError {
        ReportError::MalformedRow {
            section: self.schema.name,
            line: self.line + 1,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "\
header noise
//   Resource-Resource Overlap Percentage with stalls
//===---===//
A B C
r0
r1 0.5
//   Resource-Resource Overlap Percentage without stalls
//===---===//
A B C
r0
r1 0.25
";

    #[test]
    fn test_overlap_variants_are_distinguished() {
        let report = Report::new(TEXT);
        assert_eq!(report.locate(&OVERLAP_WITH_STALLS).unwrap(), 1);
        assert_eq!(report.locate(&OVERLAP_WITHOUT_STALLS).unwrap(), 6);
    }

    #[test]
    fn test_row_offset_and_cells() {
        let report = Report::new(TEXT);
        let table = report.table(&OVERLAP_WITHOUT_STALLS).unwrap();
        let row = table.row(1, 2).unwrap();
        assert_eq!(row.cell::<f64>(1).unwrap(), 0.25);
        assert!(row.cell::<u64>(1).is_err());
    }

    #[test]
    fn test_short_row() {
        let report = Report::new(TEXT);
        let table = report.table(&OVERLAP_WITH_STALLS).unwrap();
        let err = table.row(0, 2).unwrap_err();
        assert!(matches!(err, ReportError::MalformedRow { line: 5, .. }));
    }

    #[test]
    fn test_missing_section() {
        let report = Report::new(TEXT);
        let err = report.locate(&STATISTICS).unwrap_err();
        assert!(matches!(err, ReportError::SectionNotFound { section: "Statistics" }));
    }

    #[test]
    fn test_tokens_must_match_exactly() {
        // "(without" is not the token "without".
        let report = Report::new("// Resource-Resource Overlap (without stalls)\n");
        assert_eq!(report.locate(&OVERLAP_WITH_STALLS).unwrap(), 0);
        assert!(report.locate(&OVERLAP_WITHOUT_STALLS).is_err());
    }

    #[test]
    fn test_quantity_rejects_non_finite_and_negative() {
        let report = Report::new("//   Statistics\n//===---===//\nRESOURCE A B C D E\nFADDER 4 nan inf -2 1e3\n");
        let row = report.table(&STATISTICS).unwrap().row(0, 2).unwrap();
        assert_eq!(row.quantity(1).unwrap(), 4.0);
        assert_eq!(row.quantity(5).unwrap(), 1000.0);
        for column in 2..=4 {
            assert!(matches!(row.quantity(column), Err(ReportError::MalformedRow { section: "Statistics", .. })));
        }
    }

    #[test]
    fn test_total_ignores_resource_header() {
        let report = Report::new("RESOURCE TOTAL SPAN\n//  TOTAL\n");
        assert_eq!(report.locate(&GRAND_TOTAL).unwrap(), 1);
    }
}
