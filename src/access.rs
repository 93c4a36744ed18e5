//! Role and module-access policy.
//!
//! The table here is the single canonical policy. Group roles are always
//! scoped to their own group; admin and logistica see every group.

use crate::error::{CoreError, CoreResult};
use crate::roster::{is_group, CATECHISTS_PSEUDO_GROUP, GROUPS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Financiero,
    Logistica,
    GroupMember(String),
}

impl Role {
    /// Resolve the role of an account row. The `logistica` username is a
    /// role of its own whatever its stored `rol` says.
    pub fn from_account(usuario: &str, rol: &str) -> Option<Role> {
        if usuario.trim() == "logistica" {
            return Some(Role::Logistica);
        }
        Role::parse(rol)
    }

    /// `None` for anything outside the closed role set, including the
    /// catechist pseudo-group.
    pub fn parse(rol: &str) -> Option<Role> {
        match rol.trim() {
            "admin" => Some(Role::Admin),
            "financiero" => Some(Role::Financiero),
            "logistica" => Some(Role::Logistica),
            group if is_group(group) => Some(Role::GroupMember(group.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Financiero => "financiero",
            Role::Logistica => "logistica",
            Role::GroupMember(g) => g.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Attendance,
    Documents,
    Sabanas,
    Cartas,
    Pagos,
    Gastos,
    Ingresos,
    Catequistas,
    Students,
}

pub const ALL_MODULES: [Module; 9] = [
    Module::Attendance,
    Module::Documents,
    Module::Students,
    Module::Sabanas,
    Module::Cartas,
    Module::Pagos,
    Module::Catequistas,
    Module::Gastos,
    Module::Ingresos,
];

impl Module {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attendance" | "asistencia" => Some(Self::Attendance),
            "documents" | "documentos" => Some(Self::Documents),
            "sabanas" => Some(Self::Sabanas),
            "cartas" => Some(Self::Cartas),
            "pagos" => Some(Self::Pagos),
            "gastos" => Some(Self::Gastos),
            "ingresos" => Some(Self::Ingresos),
            "catequistas" => Some(Self::Catequistas),
            "students" | "estudiantes" => Some(Self::Students),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Documents => "documents",
            Self::Sabanas => "sabanas",
            Self::Cartas => "cartas",
            Self::Pagos => "pagos",
            Self::Gastos => "gastos",
            Self::Ingresos => "ingresos",
            Self::Catequistas => "catequistas",
            Self::Students => "students",
        }
    }

    /// Modules whose data is partitioned by group.
    fn is_group_scoped(self) -> bool {
        matches!(
            self,
            Self::Attendance
                | Self::Documents
                | Self::Students
                | Self::Sabanas
                | Self::Cartas
                | Self::Pagos
        )
    }
}

fn allowed(module: Module, role: &Role) -> bool {
    match role {
        Role::Admin => true,
        Role::Logistica => !matches!(module, Module::Gastos | Module::Ingresos),
        Role::Financiero => matches!(module, Module::Gastos | Module::Ingresos),
        Role::GroupMember(_) => matches!(
            module,
            Module::Attendance | Module::Documents | Module::Students | Module::Pagos
        ),
    }
}

/// `None` means nobody is logged in.
pub fn can_access(module: Module, role: Option<&Role>) -> bool {
    role.map(|r| allowed(module, r)).unwrap_or(false)
}

pub fn require_access(module: Module, role: Option<&Role>) -> CoreResult<()> {
    if can_access(module, role) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied { module })
    }
}

/// Groups the role may browse inside `module`. Empty when access is denied
/// or the module is not partitioned by group.
pub fn browsable_groups(module: Module, role: Option<&Role>) -> Vec<String> {
    let Some(role) = role else {
        return Vec::new();
    };
    if !allowed(module, role) || !module.is_group_scoped() {
        return Vec::new();
    }
    match role {
        Role::GroupMember(g) => vec![g.clone()],
        Role::Admin | Role::Logistica => {
            let mut out = Vec::with_capacity(GROUPS.len() + 1);
            if module == Module::Pagos {
                out.push(CATECHISTS_PSEUDO_GROUP.to_string());
            }
            out.extend(GROUPS.iter().map(|g| g.to_string()));
            out
        }
        Role::Financiero => Vec::new(),
    }
}

/// Hard gate for handlers that operate on one group.
pub fn require_group(module: Module, role: Option<&Role>, group: &str) -> CoreResult<()> {
    require_access(module, role)?;
    if browsable_groups(module, role).iter().any(|g| g == group) {
        Ok(())
    } else {
        Err(CoreError::AccessDenied { module })
    }
}

pub fn allowed_modules(role: Option<&Role>) -> Vec<Module> {
    ALL_MODULES
        .iter()
        .copied()
        .filter(|m| can_access(*m, role))
        .collect()
}
