mod test_support;

use serde_json::json;
use test_support::{temp_dir, Sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut s, workspace) = Sidecar::with_admin("confirmacion-router-smoke");
    let csv_out = workspace.join("smoke.csv");
    let bundle_out = workspace.join("smoke.zip");

    let student = s.ok(
        "students.create",
        json!({ "grupo": "Ciencia", "nombre": "ana mora" }),
    );
    let id = student["student"]["id"].as_str().expect("id").to_string();

    let calls = vec![
        ("health", json!({})),
        ("session.whoami", json!({})),
        ("groups.list", json!({})),
        ("students.list", json!({ "grupo": "Ciencia" })),
        ("students.detail", json!({ "grupo": "Ciencia", "estudianteId": id })),
        ("sessions.list", json!({})),
        ("attendance.open", json!({ "grupo": "Ciencia" })),
        ("catechists.list", json!({})),
        ("catechists.attendanceOpen", json!({})),
        ("documents.open", json!({ "grupo": "Ciencia" })),
        ("letters.open", json!({ "grupo": "Ciencia" })),
        ("sheets.open", json!({ "grupo": "Ciencia" })),
        ("payments.open", json!({ "grupo": "Ciencia" })),
        ("expenses.list", json!({})),
        ("incomes.list", json!({})),
        ("ledger.balance", json!({})),
        ("reports.summary", json!({})),
        (
            "reports.exportCsv",
            json!({ "kind": "signatureList", "grupo": "Ciencia", "outPath": csv_out.to_string_lossy() }),
        ),
        ("setup.get", json!({})),
        (
            "backup.exportWorkspace",
            json!({ "outPath": bundle_out.to_string_lossy() }),
        ),
    ];
    for (method, params) in calls {
        s.ok(method, params);
    }

    assert_eq!(s.err_code("planner.open", json!({})), "not_implemented");
}

#[test]
fn requests_need_a_workspace_and_a_session() {
    let mut s = Sidecar::spawn();
    let health = s.ok("health", json!({}));
    assert_eq!(health["workspacePath"], json!(null));
    assert_eq!(s.err_code("attendance.open", json!({ "grupo": "Ciencia" })), "no_workspace");
    assert_eq!(s.err_code("workspace.select", json!({})), "bad_params");

    let workspace = temp_dir("confirmacion-no-session");
    s.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
    assert_eq!(s.err_code("attendance.open", json!({ "grupo": "Ciencia" })), "no_session");
    assert_eq!(s.err_code("session.whoami", json!({})), "no_session");
}
