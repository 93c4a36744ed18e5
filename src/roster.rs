//! Groups, students and catechists.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{CoreError, CoreResult};
use crate::format::{capitalize_name, normalize_string};
use crate::store::{now_stamp, text, Filter, Row, Store};
use crate::validation::{is_cedula_cr, is_email, is_phone_cr, max_length};

pub const GROUPS: [&str; 7] = [
    "Ciencia",
    "Piedad",
    "Fortaleza",
    "Consejo",
    "Entendimiento",
    "Sabiduría",
    "Temor de Dios",
];

/// Synthetic group under which catechist payments are browsed.
pub const CATECHISTS_PSEUDO_GROUP: &str = "Catequistas";

pub const NO_GROUP: &str = "Sin grupo";

pub const CATECHISTS: &[(&str, &str)] = &[
    ("Luis Ángel Sánchez Badilla", "Ciencia"),
    ("Sebastián Huertas Arce", "Ciencia"),
    ("Mathias Calderon Sequeira", "Ciencia"),
    ("Jefferson David Aguilar Guzman", "Ciencia"),
    ("Jeaustin Emanuel Fernández Arias", "Piedad"),
    ("Sofía Arce Hernández", "Piedad"),
    ("Monserrat Solano Vargas", "Piedad"),
    ("Luis Felipe Mora Ramírez", "Piedad"),
    ("Johanna Victoria Castro Guillén", "Fortaleza"),
    ("Gabriel Esteban Valverde Guzmán", "Fortaleza"),
    ("Julissa Escalante Badilla", "Fortaleza"),
    ("Steven Alpizar Gamboa", "Fortaleza"),
    ("Justin Rojas Salazar", "Consejo"),
    ("Ashley Rodríguez González", "Consejo"),
    ("Samuel Brenes Vargas", "Consejo"),
    ("Mariam Astua Solano", "Consejo"),
    ("Sharlyn Blanco Mora", "Entendimiento"),
    ("Marco Andrés Sandí Chinchilla", "Entendimiento"),
    ("Nazareth Sofía Montoya Chacón", "Entendimiento"),
    ("Montserrat de Los Ángeles Mata Madriz", "Entendimiento"),
    ("Montserrat Campos Hernández", "Sabiduría"),
    ("Ismael Josué Rivera Quesada", "Sabiduría"),
    ("Sebastián Altamirano Ling", "Sabiduría"),
    ("Francella Fallas Castro", "Sabiduría"),
    ("Nashamy Araya Castellón", "Temor de Dios"),
    ("Karemy Guzmán Cruz", "Temor de Dios"),
    ("Noelia Odilie Matarrita Araya", "Temor de Dios"),
    ("Amanda Cordero Trejos", "Temor de Dios"),
    ("Dylan Chacón Sandoval", "Formación"),
    ("Mariana Segura Piedra", "Formación"),
];

pub fn is_group(name: &str) -> bool {
    GROUPS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: String,
    pub grupo: String,
    pub nombre: String,
    #[serde(rename = "sortOrder")]
    pub sort_order: i64,
}

impl Student {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: text(row, "id")?.to_string(),
            grupo: text(row, "grupo")?.to_string(),
            nombre: text(row, "nombre")?.to_string(),
            sort_order: row.get("sort_order").and_then(|v| v.as_i64()).unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catechist {
    pub nombre: String,
    pub grupo: String,
}

pub fn list_students(store: &dyn Store, grupo: Option<&str>) -> CoreResult<Vec<Student>> {
    let mut filter = Filter::new();
    if let Some(g) = grupo {
        filter = filter.eq("grupo", g);
    }
    let filter = filter.order_by("grupo", true).order_by("sort_order", true);
    Ok(store
        .select("estudiantes", &filter)?
        .iter()
        .filter_map(Student::from_row)
        .collect())
}

/// Accent- and case-insensitive substring match on the student name.
pub fn search_students(students: Vec<Student>, term: &str) -> Vec<Student> {
    let needle = normalize_string(term);
    if needle.is_empty() {
        return students;
    }
    students
        .into_iter()
        .filter(|s| normalize_string(&s.nombre).contains(&needle))
        .collect()
}

pub fn find_student(store: &dyn Store, grupo: &str, id: &str) -> CoreResult<Option<Student>> {
    Ok(store
        .select("estudiantes", &Filter::new().eq("grupo", grupo).eq("id", id))?
        .first()
        .and_then(Student::from_row))
}

fn validate_name(nombre: &str) -> CoreResult<String> {
    let name = capitalize_name(nombre);
    if name.is_empty() {
        return Err(CoreError::invalid("nombre is required"));
    }
    if name.chars().count() > 120 {
        return Err(CoreError::invalid("nombre must be at most 120 characters"));
    }
    Ok(name)
}

fn check_group(grupo: &str) -> CoreResult<()> {
    if is_group(grupo) {
        Ok(())
    } else {
        Err(CoreError::invalid(format!("unknown group: {}", grupo)))
    }
}

/// Appends students to the end of a group. Ids are fresh v4 UUIDs.
pub fn add_students(store: &dyn Store, grupo: &str, nombres: &[String]) -> CoreResult<Vec<Student>> {
    check_group(grupo)?;
    let names = nombres
        .iter()
        .map(|n| validate_name(n))
        .collect::<CoreResult<Vec<_>>>()?;
    let mut next_order = list_students(store, Some(grupo))?
        .iter()
        .map(|s| s.sort_order + 1)
        .max()
        .unwrap_or(0);
    let mut created = Vec::with_capacity(names.len());
    for nombre in names {
        let student = Student {
            id: uuid::Uuid::new_v4().to_string(),
            grupo: grupo.to_string(),
            nombre,
            sort_order: next_order,
        };
        let row = json!({
            "id": student.id,
            "grupo": student.grupo,
            "nombre": student.nombre,
            "sort_order": student.sort_order,
            "created_at": now_stamp(),
        });
        store.upsert("estudiantes", as_row(row), &["id"])?;
        next_order += 1;
        created.push(student);
    }
    Ok(created)
}

pub fn rename_student(store: &dyn Store, grupo: &str, id: &str, nombre: &str) -> CoreResult<Student> {
    let Some(mut student) = find_student(store, grupo, id)? else {
        return Err(CoreError::invalid("student not found"));
    };
    student.nombre = validate_name(nombre)?;
    store.upsert(
        "estudiantes",
        as_row(json!({
            "id": student.id,
            "grupo": student.grupo,
            "nombre": student.nombre,
            "sort_order": student.sort_order,
        })),
        &["id"],
    )?;
    Ok(student)
}

pub fn list_catechists(store: &dyn Store) -> CoreResult<Vec<Catechist>> {
    Ok(store
        .select("catequistas", &Filter::new().order_by("sort_order", true))?
        .iter()
        .filter_map(|r| {
            Some(Catechist {
                nombre: text(r, "nombre")?.to_string(),
                grupo: text(r, "grupo").unwrap_or(NO_GROUP).to_string(),
            })
        })
        .collect())
}

pub fn add_catechist(store: &dyn Store, nombre: &str, grupo: Option<&str>) -> CoreResult<Catechist> {
    let nombre = nombre.trim();
    if nombre.is_empty() {
        return Err(CoreError::invalid("nombre is required"));
    }
    let existing = list_catechists(store)?;
    if let Some(c) = existing.iter().find(|c| c.nombre == nombre) {
        return Ok(c.clone());
    }
    let catechist = Catechist {
        nombre: nombre.to_string(),
        grupo: grupo.map(str::trim).filter(|g| !g.is_empty()).unwrap_or(NO_GROUP).to_string(),
    };
    store.upsert(
        "catequistas",
        as_row(json!({
            "nombre": catechist.nombre,
            "grupo": catechist.grupo,
            "sort_order": existing.len() as i64,
        })),
        &["nombre"],
    )?;
    Ok(catechist)
}

pub fn load_notes(store: &dyn Store, grupo: &str, id: &str) -> CoreResult<String> {
    Ok(store
        .select(
            "notas_estudiantes",
            &Filter::new().eq("grupo", grupo).eq("estudiante_id", id),
        )?
        .first()
        .and_then(|r| text(r, "notas"))
        .unwrap_or("")
        .to_string())
}

pub fn save_notes(store: &dyn Store, grupo: &str, id: &str, notas: &str) -> CoreResult<()> {
    store.upsert(
        "notas_estudiantes",
        as_row(json!({
            "grupo": grupo,
            "estudiante_id": id,
            "notas": notas,
            "updated_at": now_stamp(),
        })),
        &["grupo", "estudiante_id"],
    )
}

/// Contact card kept next to a student; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contact {
    pub cedula: Option<String>,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub encargado: Option<String>,
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Contact {
    /// Blank fields become `None`; filled ones must be well formed.
    pub fn validated(self) -> CoreResult<Self> {
        let c = Self {
            cedula: blank_to_none(self.cedula),
            telefono: blank_to_none(self.telefono),
            email: blank_to_none(self.email),
            encargado: blank_to_none(self.encargado),
        };
        if c.cedula.as_deref().is_some_and(|v| !is_cedula_cr(v)) {
            return Err(CoreError::invalid("cedula must have 9 to 12 digits"));
        }
        if c.telefono.as_deref().is_some_and(|v| !is_phone_cr(v)) {
            return Err(CoreError::invalid("telefono must have 8 digits"));
        }
        if c.email.as_deref().is_some_and(|v| !is_email(v)) {
            return Err(CoreError::invalid("email is not a valid address"));
        }
        if c.encargado.as_deref().is_some_and(|v| !max_length(v, 120)) {
            return Err(CoreError::invalid("encargado must be at most 120 characters"));
        }
        Ok(c)
    }
}

pub fn load_contact(store: &dyn Store, grupo: &str, id: &str) -> CoreResult<Contact> {
    let rows = store.select(
        "contactos_estudiantes",
        &Filter::new().eq("grupo", grupo).eq("estudiante_id", id),
    )?;
    let Some(row) = rows.first() else {
        return Ok(Contact::default());
    };
    let field = |column: &str| text(row, column).map(str::to_string);
    Ok(Contact {
        cedula: field("cedula"),
        telefono: field("telefono"),
        email: field("email"),
        encargado: field("encargado"),
    })
}

pub fn save_contact(store: &dyn Store, grupo: &str, id: &str, contact: &Contact) -> CoreResult<()> {
    store.upsert(
        "contactos_estudiantes",
        as_row(json!({
            "grupo": grupo,
            "estudiante_id": id,
            "cedula": contact.cedula,
            "telefono": contact.telefono,
            "email": contact.email,
            "encargado": contact.encargado,
            "updated_at": now_stamp(),
        })),
        &["grupo", "estudiante_id"],
    )?;
    tracing::info!(grupo, estudiante_id = id, "contact saved");
    Ok(())
}

pub(crate) fn as_row(v: Value) -> Row {
    match v {
        Value::Object(m) => m,
        _ => Row::new(),
    }
}
