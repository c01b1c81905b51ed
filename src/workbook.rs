use crate::constants::{
    COL_AUTHOR, COL_BRANCH, COL_COMMIT, COL_COMMIT_URL, COL_DATE, COL_ELOC, COL_LINES_ADDED,
    COL_LINES_REMOVED, COL_MESSAGE, MAX_CELL_CHARS, MAX_SHEET_NAME_CHARS, RESERVED_SHEET_NAME,
};
use crate::stats::CommitRow;
use anyhow::{Context, Result, bail};
use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Format, Worksheet, XlsxError};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// one tab of the workbook: a target's rows, unique by commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub with_branch: bool, // adds a leading BRANCH column
    pub rows: Vec<CommitRow>,
}

/// the output workbook, held fully in memory between load and save
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

/// sheet name for a target: the user, or `user_branch`
///
/// characters the xlsx format forbids become `_`, the result is cut to 31 chars
/// and the reserved `History` gets a trailing `_`
pub fn sheet_name(user: &str, branch: Option<&str>) -> String {
    let raw = match branch {
        Some(branch) => format!("{user}_{branch}"),
        None => user.to_string(),
    };

    let name: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME_CHARS)
        .collect();

    // names may not start or end with an apostrophe
    let name = name.trim_matches('\'');
    if name.is_empty() {
        "_".to_string()
    } else if name.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// concatenate `existing` then `new`, keeping the first row seen for each commit
pub fn merge_rows(existing: Vec<CommitRow>, new: Vec<CommitRow>) -> Vec<CommitRow> {
    let mut seen = HashSet::new();
    existing
        .into_iter()
        .chain(new)
        .filter(|row| seen.insert(row.commit.clone()))
        .collect()
}

fn columns(with_branch: bool) -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(9);
    if with_branch {
        columns.push(COL_BRANCH);
    }
    columns.extend([
        COL_COMMIT,
        COL_AUTHOR,
        COL_LINES_ADDED,
        COL_LINES_REMOVED,
        COL_ELOC,
        COL_COMMIT_URL,
        COL_MESSAGE,
        COL_DATE,
    ]);
    columns
}

impl Workbook {
    /// read every sheet of the workbook at `path`; an absent file is an empty workbook
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .with_context(|| format!("failed to read sheet {name:?} of {}", path.display()))?;
            if let Some(sheet) = read_sheet(name, &range)
                .with_context(|| format!("unexpected layout in {}", path.display()))?
            {
                sheets.push(sheet);
            }
        }

        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// sheet names are case-insensitive in xlsx
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.to_lowercase() == name.to_lowercase())
    }

    /// merge `rows` into the sheet called `name`, persisted rows first
    ///
    /// a sheet is only created when there is something to put in it. returns the
    /// number of rows that were actually added.
    pub fn merge(&mut self, name: &str, with_branch: bool, rows: Vec<CommitRow>) -> usize {
        let position = self
            .sheets
            .iter()
            .position(|sheet| sheet.name.to_lowercase() == name.to_lowercase());

        match position {
            Some(idx) => {
                let sheet = &mut self.sheets[idx];
                let before = sheet.rows.len();
                sheet.rows = merge_rows(std::mem::take(&mut sheet.rows), rows);
                sheet.with_branch |= with_branch;
                sheet.rows.len().saturating_sub(before)
            }
            None if rows.is_empty() => 0,
            None => {
                let rows = merge_rows(Vec::new(), rows);
                let added = rows.len();
                self.sheets.push(Sheet {
                    name: name.to_string(),
                    with_branch,
                    rows,
                });
                added
            }
        }
    }

    /// write every sheet to `path`, replacing it atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let header = Format::new().set_bold();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            write_sheet(worksheet, sheet, &header)
                .with_context(|| format!("failed to write sheet {:?}", sheet.name))?;
        }
        let buffer = workbook
            .save_to_buffer()
            .context("failed to encode workbook")?;

        // write next to the target so the rename stays on one filesystem
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut temp_file = tempfile::Builder::new()
            .prefix(".commit-stats")
            .suffix(".xlsx")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        temp_file
            .write_all(&buffer)
            .context("failed to write temporary workbook")?;
        temp_file
            .persist(path)
            .with_context(|| format!("failed to replace {}", path.display()))?;

        Ok(())
    }
}

/// parse one worksheet; `None` for a sheet with no cells at all
fn read_sheet(name: String, range: &Range<Data>) -> Result<Option<Sheet>> {
    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(None);
    };
    let header: Vec<String> = header.iter().map(|c| cell_text(Some(c))).collect();

    let column = |title: &str| -> Result<usize> {
        header
            .iter()
            .position(|h| h == title)
            .with_context(|| format!("sheet {name:?} has no {title} column"))
    };
    let branch = header.iter().position(|h| h == COL_BRANCH);
    let commit = column(COL_COMMIT)?;
    let author = column(COL_AUTHOR)?;
    let added = column(COL_LINES_ADDED)?;
    let removed = column(COL_LINES_REMOVED)?;
    let url = column(COL_COMMIT_URL)?;
    let message = column(COL_MESSAGE)?;
    let date = column(COL_DATE)?;

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let cell = |col: usize| line.get(col);
        let commit_id = cell_text(cell(commit));
        if commit_id.is_empty() {
            continue;
        }

        // header is spreadsheet row 1
        let row_number = idx + 2;
        let number = |col: usize, title: &str| {
            cell_int(cell(col))
                .with_context(|| format!("sheet {name:?} row {row_number} column {title}"))
        };

        rows.push(CommitRow {
            branch: branch.map(|col| cell_text(cell(col))),
            commit: commit_id,
            author: cell_text(cell(author)),
            lines_added: number(added, COL_LINES_ADDED)?,
            lines_removed: number(removed, COL_LINES_REMOVED)?,
            commit_url: cell_text(cell(url)),
            message: cell_text(cell(message)),
            date: cell_text(cell(date)),
        });
    }

    // a hand-edited sheet may repeat a commit
    Ok(Some(Sheet {
        name,
        with_branch: branch.is_some(),
        rows: merge_rows(rows, Vec::new()),
    }))
}

/// cells past the end of a short row read as empty
fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.clone(),
        // numeric-looking text (e.g. an all-digit sha) may have been stored as a number
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Some(other) => other.to_string(),
    }
}

fn cell_int(cell: Option<&Data>) -> Result<i64> {
    match cell {
        None | Some(Data::Empty) => Ok(0),
        Some(Data::Int(i)) => Ok(*i),
        Some(Data::Float(f)) if f.fract() == 0.0 => Ok(*f as i64),
        Some(Data::String(s)) => s
            .trim()
            .parse()
            .with_context(|| format!("{s:?} is not a whole number")),
        Some(other) => bail!("{other} is not a whole number"),
    }
}

/// longest prefix of `text` that fits in one cell
fn fit_cell(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, header: &Format) -> Result<(), XlsxError> {
    worksheet.set_name(&sheet.name)?;

    for (col, title) in columns(sheet.with_branch).into_iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, header)?;
    }

    for (idx, row) in sheet.rows.iter().enumerate() {
        let line = idx as u32 + 1;
        let mut col: u16 = 0;

        if sheet.with_branch {
            worksheet.write_string(line, col, fit_cell(row.branch.as_deref().unwrap_or("")))?;
            col += 1;
        }
        worksheet.write_string(line, col, fit_cell(&row.commit))?;
        worksheet.write_string(line, col + 1, fit_cell(&row.author))?;
        worksheet.write_number(line, col + 2, row.lines_added as f64)?;
        worksheet.write_number(line, col + 3, row.lines_removed as f64)?;
        worksheet.write_number(line, col + 4, row.eloc() as f64)?;
        worksheet.write_string(line, col + 5, fit_cell(&row.commit_url))?;
        worksheet.write_string(line, col + 6, fit_cell(&row.message))?;
        worksheet.write_string(line, col + 7, fit_cell(&row.date))?;
    }

    Ok(())
}
