//! Accounts and the logged-in session.
//!
//! The session lives in the daemon state and is handed to whatever needs
//! the caller's identity; it is never persisted.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::access::{allowed_modules, browsable_groups, Module, Role};
use crate::error::{CoreError, CoreResult};
use crate::roster::as_row;
use crate::store::{text, Filter, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub usuario: String,
    pub role: Role,
}

impl Session {
    pub fn to_json(&self) -> Value {
        let role = Some(&self.role);
        json!({
            "usuario": self.usuario,
            "rol": self.role.as_str(),
            "isAdmin": matches!(self.role, Role::Admin | Role::Logistica),
            "modules": allowed_modules(role).iter().map(|m| m.key()).collect::<Vec<_>>(),
            "groups": browsable_groups(Module::Attendance, role),
        })
    }
}

pub fn hash_password(usuario: &str, password: &str) -> String {
    format!("{:x}", Sha256::digest(format!("{}:{}", usuario, password).as_bytes()))
}

pub fn login(store: &dyn Store, usuario: &str, password: &str) -> CoreResult<Session> {
    let usuario = usuario.trim();
    let rows = store.select("usuarios", &Filter::new().eq("usuario", usuario))?;
    let Some(row) = rows.first() else {
        tracing::warn!(usuario, "login for unknown user");
        return Err(CoreError::AuthFailed);
    };
    if text(row, "password_hash") != Some(hash_password(usuario, password).as_str()) {
        tracing::warn!(usuario, "login with wrong password");
        return Err(CoreError::AuthFailed);
    }
    let role = Role::from_account(usuario, text(row, "rol").unwrap_or("")).ok_or(CoreError::AuthFailed)?;
    tracing::info!(usuario, rol = role.as_str(), "logged in");
    Ok(Session {
        usuario: usuario.to_string(),
        role,
    })
}

/// Create or update an account. Only admins may do this, except for the
/// very first account of a workspace, which must itself be an admin.
pub fn upsert_account(
    store: &dyn Store,
    actor: Option<&Role>,
    usuario: &str,
    password: &str,
    rol: &str,
) -> CoreResult<Role> {
    let usuario = usuario.trim();
    if usuario.is_empty() {
        return Err(CoreError::invalid("usuario is required"));
    }
    if password.len() < 4 {
        return Err(CoreError::invalid("password must be at least 4 characters"));
    }
    let role = Role::from_account(usuario, rol).ok_or_else(|| {
        CoreError::invalid(format!(
            "rol must be admin, financiero, logistica or a group name, got {:?}",
            rol.trim()
        ))
    })?;

    let bootstrap = store.select("usuarios", &Filter::new())?.is_empty();
    if bootstrap {
        if role != Role::Admin {
            return Err(CoreError::invalid("the first account must be an admin"));
        }
    } else if actor != Some(&Role::Admin) {
        return Err(CoreError::AdminOnly("manage accounts"));
    }

    store.upsert(
        "usuarios",
        as_row(json!({
            "usuario": usuario,
            "password_hash": hash_password(usuario, password),
            "rol": rol.trim(),
        })),
        &["usuario"],
    )?;
    tracing::info!(usuario, rol = role.as_str(), bootstrap, "account saved");
    Ok(role)
}
