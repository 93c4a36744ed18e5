mod test_support;

use serde_json::json;
use test_support::Sidecar;

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).expect("read csv")
}

#[test]
fn csv_exports_write_expected_content() {
    let (mut s, ws) = Sidecar::with_admin("confirmacion-export");
    let created = s.ok(
        "students.create",
        json!({ "grupo": "Consejo", "nombre": "Ana Mora" }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();
    s.ok(
        "attendance.toggle",
        json!({ "grupo": "Consejo", "estudianteId": id, "session": 0 }),
    );
    s.ok(
        "payments.set",
        json!({ "grupo": "Consejo", "personId": id, "montoPagado": 20000 }),
    );
    s.ok(
        "expenses.create",
        json!({ "concepto": "Bus, ida y vuelta", "monto": 1234567, "fecha": "2026-03-05" }),
    );

    let out = ws.join("out").join("asistencia.csv");
    let r = s.ok(
        "reports.exportCsv",
        json!({ "kind": "attendance", "grupo": "Consejo", "outPath": out.to_string_lossy() }),
    );
    assert_eq!(r["rowsExported"], json!(1));
    let csv = read(&out);
    let mut lines = csv.lines();
    let header = lines.next().expect("header");
    assert!(header.starts_with("Nombre,Catequesis 0,"));
    assert!(header.contains("Retiro Familia"));
    assert!(header.ends_with("Presentes,Asistencia %"));
    let row = lines.next().expect("row");
    assert!(row.starts_with("Ana Mora,P,"));
    assert!(row.ends_with(",1,4"));

    let out = ws.join("out").join("pagos.csv");
    s.ok(
        "reports.exportCsv",
        json!({ "kind": "payments", "grupo": "Consejo", "outPath": out.to_string_lossy() }),
    );
    assert!(read(&out).contains("Ana Mora,₡20.000,₡50.000,₡30.000,Pendiente"));

    let out = ws.join("out").join("gastos.csv");
    s.ok(
        "reports.exportCsv",
        json!({ "kind": "expenses", "outPath": out.to_string_lossy() }),
    );
    assert!(read(&out).contains("05/03/2026,\"Bus, ida y vuelta\",transporte,₡1.234.567"));

    s.ok("catechists.add", json!({ "nombre": "Rosa Vargas" }));
    let out = ws.join("out").join("firmas.csv");
    s.ok(
        "reports.exportCsv",
        json!({ "kind": "signatureList", "grupo": "Catequistas", "outPath": out.to_string_lossy() }),
    );
    assert_eq!(read(&out), "#,Nombre,Grupo,Firma\n1,Rosa Vargas,Catequistas,\n");

    assert_eq!(
        s.err_code(
            "reports.exportCsv",
            json!({ "kind": "pdf", "outPath": out.to_string_lossy() })
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "reports.exportCsv",
            json!({ "kind": "payments", "outPath": out.to_string_lossy() })
        ),
        "bad_params"
    );
}

#[test]
fn summary_sections_follow_the_role() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-summary");
    let created = s.ok(
        "students.create",
        json!({ "grupo": "Piedad", "nombre": "Luis Castro" }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();
    s.ok(
        "payments.set",
        json!({ "grupo": "Piedad", "personId": id, "montoPagado": 10000 }),
    );
    s.ok(
        "incomes.create",
        json!({ "origen": "Rifa", "monto": 7000, "fecha": "2026-05-10" }),
    );

    let summary = s.ok("reports.summary", json!({}));
    assert_eq!(summary["attendance"]["studentsByGroup"]["Piedad"], json!(1));
    assert_eq!(summary["outstanding"]["Piedad"][0]["id"], json!(id));
    assert_eq!(summary["outstanding"]["Piedad"][0]["remaining"], json!(40000.0));
    assert_eq!(summary["ingresosMensuales"]["2026-05"], json!(7000.0));

    s.add_account("finanzas", "financiero");
    s.ok("session.logout", json!({}));
    s.login("finanzas", "clave1234");
    let summary = s.ok("reports.summary", json!({}));
    assert!(summary.get("attendance").is_none());
    assert!(summary.get("outstanding").is_none());
    assert!(summary.get("gastosMensuales").is_some());
    assert_eq!(
        s.err_code(
            "reports.exportCsv",
            json!({ "kind": "attendance", "grupo": "Piedad", "outPath": "/tmp/nunca.csv" })
        ),
        "access_denied"
    );
}

#[test]
fn summary_for_one_group_keeps_the_sections_that_apply() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-summary-group");
    s.ok(
        "payments.set",
        json!({ "grupo": "Catequistas", "personId": "Steven Alpizar Gamboa", "montoPagado": 50000 }),
    );

    // the catechist pool has payments but no attendance section
    let summary = s.ok("reports.summary", json!({ "grupo": "Catequistas" }));
    assert!(summary.get("attendance").is_none());
    let pending = summary["outstanding"]["Catequistas"]
        .as_array()
        .expect("pending");
    assert!(!pending.is_empty());
    assert!(!pending.iter().any(|p| p["id"] == json!("Steven Alpizar Gamboa")));

    let summary = s.ok("reports.summary", json!({ "grupo": "Piedad" }));
    assert!(summary.get("attendance").is_some());
    assert!(summary.get("outstanding").is_some());

    s.add_account("piedad", "Piedad");
    s.ok("session.logout", json!({}));
    s.login("piedad", "clave1234");
    assert_eq!(
        s.err_code("reports.summary", json!({ "grupo": "Ciencia" })),
        "access_denied"
    );
    assert_eq!(
        s.err_code("reports.summary", json!({ "grupo": "Catequistas" })),
        "access_denied"
    );
}
