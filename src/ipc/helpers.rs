use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::access::{self, Module, Role};
use crate::error::CoreError;
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    /// `{id, ok:false, error:{code, message, details?}}`
    pub fn response(self, id: &str) -> Value {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(d) = self.details {
            error["details"] = d;
        }
        json!({
            "id": id,
            "ok": false,
            "error": error,
        })
    }

    pub fn not_implemented(method: &str) -> Self {
        Self {
            code: "not_implemented",
            message: format!("unknown method: {}", method),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        let details = match &e {
            CoreError::AccessDenied { module } => Some(json!({ "module": module.key() })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        Self {
            code: "db_query_failed",
            message: format!("{:#}", e),
            details: None,
        }
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => json!({ "id": req.id, "ok": true, "result": v }),
        Err(e) => e.response(&req.id),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_bool(params: &Value, key: &str) -> Result<bool, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key)))
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a whole number", key)))
}

pub fn write_text_file(path: &str, contents: &str) -> Result<(), HandlerErr> {
    let out = PathBuf::from(path);
    let io_err = |e: std::io::Error| HandlerErr {
        code: "export_failed",
        message: e.to_string(),
        details: Some(json!({ "path": path })),
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(&out, contents).map_err(io_err)?;
    Ok(())
}

/// Open workspace plus the caller's role, for one request.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub store: SqliteStore<'a>,
    pub role: Option<&'a Role>,
}

pub fn workspace(state: &AppState) -> Result<Ctx<'_>, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };
    Ok(Ctx {
        conn,
        store: SqliteStore::new(conn),
        role: state.role(),
    })
}

impl Ctx<'_> {
    fn logged_in(&self) -> Result<(), HandlerErr> {
        if self.role.is_none() {
            return Err(CoreError::NoSession.into());
        }
        Ok(())
    }

    pub fn require(&self, module: Module) -> Result<(), HandlerErr> {
        self.logged_in()?;
        Ok(access::require_access(module, self.role)?)
    }

    pub fn require_group(&self, module: Module, grupo: &str) -> Result<(), HandlerErr> {
        self.logged_in()?;
        Ok(access::require_group(module, self.role, grupo)?)
    }
}
