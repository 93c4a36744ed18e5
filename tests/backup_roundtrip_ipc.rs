mod test_support;

use serde_json::json;
use test_support::{temp_dir, Sidecar};

#[test]
fn export_then_import_restores_data_and_logs_out() {
    let (mut s, ws) = Sidecar::with_admin("confirmacion-backup");
    s.ok(
        "students.create",
        json!({ "grupo": "Temor de Dios", "nombre": "Elena Quesada" }),
    );
    let bundle = ws.join("respaldos").join("respaldo.zip");
    let exported = s.ok(
        "backup.exportWorkspace",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("confirmacion-workspace-v1"));
    assert!(bundle.is_file());

    s.ok(
        "students.create",
        json!({ "grupo": "Temor de Dios", "nombre": "Tomás Ureña" }),
    );
    let listed = s.ok("students.list", json!({ "grupo": "Temor de Dios" }));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(2));

    let imported = s.ok(
        "backup.importWorkspace",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], json!("confirmacion-workspace-v1"));
    assert_eq!(imported["loggedOut"], json!(true));
    assert_eq!(
        s.err_code("students.list", json!({ "grupo": "Temor de Dios" })),
        "no_session"
    );

    s.login("admin", "secreto");
    let listed = s.ok("students.list", json!({ "grupo": "Temor de Dios" }));
    let students = listed["students"].as_array().expect("students");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["nombre"], json!("Elena Quesada"));
}

#[test]
fn failed_import_keeps_workspace_and_session() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-backup-bad");
    s.ok(
        "students.create",
        json!({ "grupo": "Ciencia", "nombre": "Carlos Mena" }),
    );
    let junk = temp_dir("confirmacion-junk").join("nada.zip");
    std::fs::write(&junk, "esto no es un respaldo").expect("write junk");

    assert_eq!(
        s.err_code(
            "backup.importWorkspace",
            json!({ "inPath": junk.to_string_lossy() })
        ),
        "io_failed"
    );
    let listed = s.ok("students.list", json!({ "grupo": "Ciencia" }));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(1));

    s.add_account("logistica", "logistica");
    s.ok("session.logout", json!({}));
    s.login("logistica", "clave1234");
    assert_eq!(
        s.err_code(
            "backup.exportWorkspace",
            json!({ "outPath": junk.to_string_lossy() })
        ),
        "access_denied"
    );
}
