//! Delivered/not-delivered flags: documents, letters and bedsheets.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::roster::as_row;
use crate::store::{flag, now_stamp, text, Filter, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    CedulaCatequizando,
    FeBautismo,
    ConstanciaComunion,
    CedulaPadrino,
    FeConfirmacionPadrino,
    ActaMatrimonio,
}

pub const DOCUMENT_TYPES: [DocumentType; 6] = [
    DocumentType::CedulaCatequizando,
    DocumentType::FeBautismo,
    DocumentType::ConstanciaComunion,
    DocumentType::CedulaPadrino,
    DocumentType::FeConfirmacionPadrino,
    DocumentType::ActaMatrimonio,
];

impl DocumentType {
    pub fn id(self) -> &'static str {
        match self {
            Self::CedulaCatequizando => "cedula_catequizando",
            Self::FeBautismo => "fe_bautismo",
            Self::ConstanciaComunion => "constancia_comunion",
            Self::CedulaPadrino => "cedula_padrino",
            Self::FeConfirmacionPadrino => "fe_confirmacion_padrino",
            Self::ActaMatrimonio => "acta_matrimonio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CedulaCatequizando => "Cédula Catequizando",
            Self::FeBautismo => "Fe de Bautismo",
            Self::ConstanciaComunion => "Constancia Comunión",
            Self::CedulaPadrino => "Cédula Padrino",
            Self::FeConfirmacionPadrino => "Fe Confirmación Padrino",
            Self::ActaMatrimonio => "Acta de Matrimonio",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        DOCUMENT_TYPES.iter().copied().find(|d| d.id() == id)
    }
}

pub fn document_types_json() -> Value {
    Value::Array(
        DOCUMENT_TYPES
            .iter()
            .map(|d| json!({ "id": d.id(), "nombre": d.label() }))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Documents,
    Letters,
    Sheets,
}

impl DeliveryKind {
    fn table(self) -> &'static str {
        match self {
            Self::Documents => "documentos_entregados",
            Self::Letters => "cartas_entregadas",
            Self::Sheets => "sabanas_entregadas",
        }
    }

    fn value_column(self) -> &'static str {
        match self {
            Self::Letters => "entregada",
            Self::Documents | Self::Sheets => "entregado",
        }
    }
}

/// One delivered flag. Documents carry their type; letters and sheets are
/// one item per student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryItem {
    Document(DocumentType),
    Letter,
    Sheet,
}

impl DeliveryItem {
    pub fn kind(self) -> DeliveryKind {
        match self {
            DeliveryItem::Document(_) => DeliveryKind::Documents,
            DeliveryItem::Letter => DeliveryKind::Letters,
            DeliveryItem::Sheet => DeliveryKind::Sheets,
        }
    }
}

pub fn set_delivered(
    store: &dyn Store,
    grupo: &str,
    estudiante_id: &str,
    estudiante_nombre: Option<&str>,
    item: DeliveryItem,
    delivered: bool,
) -> CoreResult<bool> {
    if estudiante_id.trim().is_empty() {
        return Err(CoreError::invalid("estudianteId is required"));
    }
    let kind = item.kind();
    let mut row = as_row(json!({
        "grupo": grupo,
        "estudiante_id": estudiante_id,
        "updated_at": now_stamp(),
    }));
    row.insert(kind.value_column().to_string(), Value::Bool(delivered));
    let keys: &[&str] = match item {
        DeliveryItem::Document(doc) => {
            row.insert("documento_tipo".into(), Value::String(doc.id().to_string()));
            &["grupo", "estudiante_id", "documento_tipo"]
        }
        DeliveryItem::Letter | DeliveryItem::Sheet => {
            if let Some(n) = estudiante_nombre {
                row.insert("estudiante_nombre".into(), Value::String(n.to_string()));
            }
            &["grupo", "estudiante_id"]
        }
    };
    store.upsert(kind.table(), row, keys)?;
    tracing::info!(table = kind.table(), grupo, estudiante_id, delivered, "delivery saved");
    Ok(delivered)
}

/// Delivered flags of one group. Keys are `(student id, item id)`, where the
/// item id is the document type id, or empty for letters and sheets.
pub fn load_group(
    store: &dyn Store,
    grupo: &str,
    kind: DeliveryKind,
) -> CoreResult<HashMap<(String, String), bool>> {
    let mut out = HashMap::new();
    for row in store.select(kind.table(), &Filter::new().eq("grupo", grupo))? {
        let Some(id) = text(&row, "estudiante_id") else {
            continue;
        };
        let item = match kind {
            DeliveryKind::Documents => match text(&row, "documento_tipo") {
                Some(t) if DocumentType::parse(t).is_some() => t.to_string(),
                _ => continue,
            },
            DeliveryKind::Letters | DeliveryKind::Sheets => String::new(),
        };
        out.insert((id.to_string(), item), flag(&row, kind.value_column()));
    }
    Ok(out)
}

/// Flags for one student, the same shape `load_group` uses minus the id.
pub fn load_student(
    store: &dyn Store,
    grupo: &str,
    estudiante_id: &str,
    kind: DeliveryKind,
) -> CoreResult<HashMap<String, bool>> {
    Ok(load_group(store, grupo, kind)?
        .into_iter()
        .filter(|((id, _), _)| id == estudiante_id)
        .map(|((_, item), v)| (item, v))
        .collect())
}
