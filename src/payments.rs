//! Retreat payments for students and catechists.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::roster::as_row;
use crate::store::{flag, now_stamp, text, Filter, Row, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    #[serde(rename = "montoPagado")]
    pub amount_paid: i64,
    #[serde(rename = "montoRequerido")]
    pub required: i64,
}

impl PaymentRecord {
    pub fn new(amount_paid: i64, required: i64) -> CoreResult<Self> {
        if amount_paid < 0 {
            return Err(CoreError::invalid("montoPagado must be >= 0"));
        }
        if required < 0 {
            return Err(CoreError::invalid("montoRequerido must be >= 0"));
        }
        Ok(Self {
            amount_paid,
            required,
        })
    }

    pub fn unpaid(required: i64) -> Self {
        Self {
            amount_paid: 0,
            required,
        }
    }

    pub fn paid(&self) -> bool {
        self.amount_paid >= self.required
    }

    pub fn remaining(&self) -> i64 {
        (self.required - self.amount_paid).max(0)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "montoPagado": self.amount_paid,
            "montoRequerido": self.required,
            "pagado": self.paid(),
            "falta": self.remaining(),
        })
    }
}

/// Who a payment belongs to. Students are scoped by group; catechists share
/// one pool keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payer {
    Student {
        grupo: String,
        estudiante_id: String,
        nombre: Option<String>,
    },
    Catechist {
        nombre: String,
    },
}

impl Payer {
    fn table(&self) -> &'static str {
        match self {
            Payer::Student { .. } => "pagos_retiro",
            Payer::Catechist { .. } => "pagos_catequistas",
        }
    }

    fn conflict_keys(&self) -> &'static [&'static str] {
        match self {
            Payer::Student { .. } => &["grupo", "estudiante_id"],
            Payer::Catechist { .. } => &["catequista_nombre"],
        }
    }

    fn filter(&self) -> Filter {
        match self {
            Payer::Student {
                grupo,
                estudiante_id,
                ..
            } => Filter::new()
                .eq("grupo", grupo.as_str())
                .eq("estudiante_id", estudiante_id.as_str()),
            Payer::Catechist { nombre } => Filter::new().eq("catequista_nombre", nombre.as_str()),
        }
    }

    fn row(&self, record: &PaymentRecord) -> Row {
        let mut row = as_row(json!({
            "monto_pagado": record.amount_paid,
            "monto_requerido": record.required,
            // derived, never taken from the caller
            "pagado": record.paid(),
            "updated_at": now_stamp(),
        }));
        match self {
            Payer::Student {
                grupo,
                estudiante_id,
                nombre,
            } => {
                row.insert("grupo".into(), Value::String(grupo.clone()));
                row.insert("estudiante_id".into(), Value::String(estudiante_id.clone()));
                if let Some(n) = nombre {
                    row.insert("estudiante_nombre".into(), Value::String(n.clone()));
                }
            }
            Payer::Catechist { nombre } => {
                row.insert("catequista_nombre".into(), Value::String(nombre.clone()));
            }
        }
        row
    }
}

/// A payment row as stored, including the persisted `pagado` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPayment {
    pub record: PaymentRecord,
    pub pagado: bool,
}

fn parse_stored(row: &Row) -> Option<StoredPayment> {
    Some(StoredPayment {
        record: PaymentRecord {
            amount_paid: row.get("monto_pagado")?.as_i64()?,
            required: row.get("monto_requerido")?.as_i64()?,
        },
        pagado: flag(row, "pagado"),
    })
}

pub fn save_payment(store: &dyn Store, payer: &Payer, record: PaymentRecord) -> CoreResult<PaymentRecord> {
    store.upsert(payer.table(), payer.row(&record), payer.conflict_keys())?;
    tracing::info!(
        table = payer.table(),
        monto_pagado = record.amount_paid,
        pagado = record.paid(),
        "payment saved"
    );
    Ok(record)
}

pub fn load_payment(store: &dyn Store, payer: &Payer) -> CoreResult<Option<StoredPayment>> {
    Ok(store
        .select(payer.table(), &payer.filter())?
        .first()
        .and_then(parse_stored))
}

/// Stored payments of one group, keyed by student id.
pub fn load_group(store: &dyn Store, grupo: &str) -> CoreResult<HashMap<String, PaymentRecord>> {
    let mut out = HashMap::new();
    for row in store.select("pagos_retiro", &Filter::new().eq("grupo", grupo))? {
        if let (Some(id), Some(p)) = (text(&row, "estudiante_id"), parse_stored(&row)) {
            out.insert(id.to_string(), p.record);
        }
    }
    Ok(out)
}

/// Stored catechist payments, keyed by name.
pub fn load_catechists(store: &dyn Store) -> CoreResult<HashMap<String, PaymentRecord>> {
    let mut out = HashMap::new();
    for row in store.select("pagos_catequistas", &Filter::new())? {
        if let (Some(name), Some(p)) = (text(&row, "catequista_nombre"), parse_stored(&row)) {
            out.insert(name.to_string(), p.record);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentTotals {
    pub collected: i64,
    pub expected: i64,
    pub completed: usize,
    pub people: usize,
}

pub fn totals<'a, I>(records: I) -> PaymentTotals
where
    I: IntoIterator<Item = &'a PaymentRecord>,
{
    let mut t = PaymentTotals::default();
    for r in records {
        t.people += 1;
        t.collected += r.amount_paid;
        t.expected += r.required;
        if r.paid() {
            t.completed += 1;
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, ReadOnlyStore};

    fn student(id: &str) -> Payer {
        Payer::Student {
            grupo: "Ciencia".to_string(),
            estudiante_id: id.to_string(),
            nombre: Some("Juan Pérez".to_string()),
        }
    }

    #[test]
    fn paid_flag_round_trips_at_the_boundary() {
        let store = MemoryStore::default();
        let required = 50000;

        save_payment(&store, &student("a"), PaymentRecord::new(required, required).expect("rec"))
            .expect("save");
        let back = load_payment(&store, &student("a")).expect("load").expect("row");
        assert!(back.pagado);
        assert!(back.record.paid());

        save_payment(
            &store,
            &student("a"),
            PaymentRecord::new(required - 1, required).expect("rec"),
        )
        .expect("save");
        let back = load_payment(&store, &student("a")).expect("load").expect("row");
        assert!(!back.pagado);
        assert_eq!(back.record.remaining(), 1);
        assert_eq!(store.rows("pagos_retiro").len(), 1);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(PaymentRecord::new(-1, 50000).is_err());
        assert!(PaymentRecord::new(0, -5).is_err());
        assert!(!PaymentRecord::unpaid(50000).paid());
        assert!(PaymentRecord::unpaid(0).paid());
    }

    #[test]
    fn catechist_pool_is_keyed_by_name() {
        let store = MemoryStore::default();
        let payer = Payer::Catechist {
            nombre: "Dylan Chacón Sandoval".to_string(),
        };
        save_payment(&store, &payer, PaymentRecord::new(20000, 50000).expect("rec")).expect("save");
        save_payment(&store, &payer, PaymentRecord::new(50000, 50000).expect("rec")).expect("save");
        let all = load_catechists(&store).expect("load");
        assert_eq!(all.len(), 1);
        assert!(all["Dylan Chacón Sandoval"].paid());
    }

    #[test]
    fn failed_write_surfaces_persistence_error() {
        let backing = MemoryStore::default();
        let err = save_payment(
            &ReadOnlyStore(&backing),
            &student("a"),
            PaymentRecord::new(100, 50000).expect("rec"),
        )
        .unwrap_err();
        assert_eq!(err.code(), "persistence_failed");
        assert!(load_group(&backing, "Ciencia").expect("load").is_empty());
    }

    #[test]
    fn totals_count_completed() {
        let recs = [
            PaymentRecord::new(50000, 50000).expect("rec"),
            PaymentRecord::new(10000, 50000).expect("rec"),
        ];
        let t = totals(recs.iter());
        assert_eq!(t.collected, 60000);
        assert_eq!(t.expected, 100000);
        assert_eq!(t.completed, 1);
        assert_eq!(t.people, 2);
    }
}
