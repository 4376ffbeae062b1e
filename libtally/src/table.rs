use bigdecimal::{BigDecimal, Zero};
use std::io;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Empty,
    Text {
        text: String,
        align: Align,
        indent: usize,
    },
    Decimal {
        value: BigDecimal,
    },
}

impl Cell {
    pub fn left(text: impl Into<String>) -> Cell {
        Cell::Text {
            text: text.into(),
            align: Align::Left,
            indent: 0,
        }
    }

    pub fn right(text: impl Into<String>) -> Cell {
        Cell::Text {
            text: text.into(),
            align: Align::Right,
            indent: 0,
        }
    }

    pub fn indented(text: impl Into<String>, indent: usize) -> Cell {
        Cell::Text {
            text: text.into(),
            align: Align::Left,
            indent,
        }
    }

    pub fn decimal(value: BigDecimal) -> Cell {
        Cell::Decimal { value }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Row {
    Separator,
    Cells(Vec<Cell>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn add_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(Row::Cells(cells));
    }

    pub fn add_separator(&mut self) {
        self.rows.push(Row::Separator);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn columns(&self) -> usize {
        self.rows
            .iter()
            .map(|row| match row {
                Row::Separator => 0,
                Row::Cells(cells) => cells.len(),
            })
            .max()
            .unwrap_or(0)
    }
}

pub struct TextRenderer {
    pub color: bool,
    pub thousands: bool,
    pub round: i64,
}

impl TextRenderer {
    pub fn render(&self, table: &Table, out: &mut dyn io::Write) -> io::Result<()> {
        let columns = table.columns();
        let mut widths = vec![0usize; columns];
        let formatted: Vec<Option<Vec<(String, Align, bool)>>> = table
            .rows()
            .iter()
            .map(|row| match row {
                Row::Separator => None,
                Row::Cells(cells) => Some(
                    cells
                        .iter()
                        .map(|cell| self.format_cell(cell))
                        .collect::<Vec<_>>(),
                ),
            })
            .collect();
        for cells in formatted.iter().flatten() {
            for (idx, (text, _, _)) in cells.iter().enumerate() {
                widths[idx] = widths[idx].max(text.len());
            }
        }

        for cells in &formatted {
            match cells {
                None => {
                    let total = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
                    writeln!(out, "{}", "-".repeat(total))?;
                }
                Some(cells) => {
                    let mut line = String::new();
                    for (idx, &width) in widths.iter().enumerate() {
                        if idx > 0 {
                            line.push_str("  ");
                        }
                        match cells.get(idx) {
                            Some((text, Align::Left, _)) => {
                                line.push_str(&format!("{:<width$}", text));
                            }
                            Some((text, Align::Right, negative)) => {
                                let padded = format!("{:>width$}", text);
                                if self.color && *negative {
                                    line.push_str(&format!("\x1b[31m{}\x1b[0m", padded));
                                } else {
                                    line.push_str(&padded);
                                }
                            }
                            None => line.push_str(&" ".repeat(width)),
                        }
                    }
                    writeln!(out, "{}", line.trim_end())?;
                }
            }
        }
        Ok(())
    }

    fn format_cell(&self, cell: &Cell) -> (String, Align, bool) {
        match cell {
            Cell::Empty => (String::new(), Align::Left, false),
            Cell::Text { text, align, indent } => {
                (format!("{}{}", "  ".repeat(*indent), text), *align, false)
            }
            Cell::Decimal { value } => {
                let negative = value < &BigDecimal::zero();
                (self.format_decimal(value), Align::Right, negative)
            }
        }
    }

    fn format_decimal(&self, value: &BigDecimal) -> String {
        let mut value = value.clone();
        if self.thousands {
            value = value / BigDecimal::from(1000);
        }
        value
            .with_scale_round(self.round, bigdecimal::RoundingMode::HalfUp)
            .to_string()
    }
}

pub struct CsvRenderer;

impl CsvRenderer {
    pub fn render(&self, table: &Table, out: &mut dyn io::Write) -> io::Result<()> {
        let columns = table.columns();
        let mut writer = csv::Writer::from_writer(out);
        for row in table.rows() {
            let Row::Cells(cells) = row else {
                continue;
            };
            let mut record: Vec<String> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Empty => String::new(),
                    Cell::Text { text, .. } => text.clone(),
                    Cell::Decimal { value } => value.to_string(),
                })
                .collect();
            record.resize(columns, String::new());
            writer
                .write_record(&record)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        writer.flush()
    }
}
