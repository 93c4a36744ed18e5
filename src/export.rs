//! CSV renditions of the attendance grid, payments, the ledger and the
//! printable signature list.

use crate::attendance::{AttendanceSheet, Estado};
use crate::format::{format_currency, format_date, parse_date};
use crate::ledger::{Expense, Income};
use crate::payments::PaymentRecord;
use crate::stats::attendance_rate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Attendance,
    Payments,
    Expenses,
    Incomes,
    SignatureList,
}

impl ExportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attendance" => Some(Self::Attendance),
            "payments" => Some(Self::Payments),
            "expenses" => Some(Self::Expenses),
            "incomes" => Some(Self::Incomes),
            "signatureList" => Some(Self::SignatureList),
            _ => None,
        }
    }

    /// Exports that list a single group need one.
    pub fn needs_group(self) -> bool {
        matches!(self, Self::Attendance | Self::Payments | Self::SignatureList)
    }
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(self.rows.iter()) {
            let cells: Vec<String> = line.iter().map(|c| csv_quote(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

fn estado_mark(e: Estado) -> &'static str {
    match e {
        Estado::Present => "P",
        Estado::Justified => "J",
        Estado::Absent => "",
    }
}

fn display_date(fecha: &str) -> String {
    parse_date(fecha).map(format_date).unwrap_or_else(|| fecha.to_string())
}

/// One line per person: their mark for each session, presences and rate.
/// `people` is `(id, display name)` in roster order.
pub fn attendance_table(people: &[(String, String)], sheet: &AttendanceSheet) -> CsvTable {
    let scheme = sheet.scheme();
    let keys = scheme.keys();
    let mut header = vec!["Nombre".to_string()];
    header.extend(keys.iter().map(|k| scheme.label(k)));
    header.push("Presentes".to_string());
    header.push("Asistencia %".to_string());
    let mut table = CsvTable::new(header);
    for (id, nombre) in people {
        let states = sheet.row(id);
        let mut line = vec![nombre.clone()];
        line.extend(states.iter().map(|e| estado_mark(*e).to_string()));
        line.push(sheet.present_count(id).to_string());
        line.push(attendance_rate(states).to_string());
        table.rows.push(line);
    }
    table
}

pub fn payments_table(people: &[(String, PaymentRecord)]) -> CsvTable {
    let mut table = CsvTable::new(["Nombre", "Pagado", "Requerido", "Falta", "Estado"]);
    for (nombre, p) in people {
        table.rows.push(vec![
            nombre.clone(),
            format_currency(p.amount_paid as f64),
            format_currency(p.required as f64),
            format_currency(p.remaining() as f64),
            if p.paid() { "Pagado" } else { "Pendiente" }.to_string(),
        ]);
    }
    table
}

pub fn expenses_table(entries: &[Expense]) -> CsvTable {
    let mut table =
        CsvTable::new(["Fecha", "Concepto", "Categoría", "Monto", "Pagado por", "Descripción"]);
    for e in entries {
        table.rows.push(vec![
            display_date(&e.fecha),
            e.concepto.clone(),
            e.categoria.clone(),
            format_currency(e.monto),
            e.pagado_por.clone().unwrap_or_default(),
            e.descripcion.clone().unwrap_or_default(),
        ]);
    }
    table
}

pub fn incomes_table(entries: &[Income]) -> CsvTable {
    let mut table = CsvTable::new(["Fecha", "Origen", "Método", "Monto", "Descripción"]);
    for e in entries {
        table.rows.push(vec![
            display_date(&e.fecha),
            e.origen.clone(),
            e.metodo.clone(),
            format_currency(e.monto),
            e.descripcion.clone().unwrap_or_default(),
        ]);
    }
    table
}

/// Numbered names with an empty signature column, for printing.
pub fn signature_table(grupo: &str, nombres: &[String]) -> CsvTable {
    let mut table = CsvTable::new(["#", "Nombre", "Grupo", "Firma"]);
    for (i, nombre) in nombres.iter().enumerate() {
        table.rows.push(vec![
            (i + 1).to_string(),
            nombre.clone(),
            grupo.to_string(),
            String::new(),
        ]);
    }
    table
}
