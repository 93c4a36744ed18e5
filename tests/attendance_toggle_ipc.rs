mod test_support;

use serde_json::json;
use test_support::Sidecar;

#[test]
fn toggle_cycles_through_three_states_and_persists() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-attendance");
    let created = s.ok(
        "students.import",
        json!({ "grupo": "Fortaleza", "nombres": ["luis vega", "marta solano"] }),
    );
    assert_eq!(created["imported"], json!(2));
    let id = created["students"][0]["id"].as_str().expect("id").to_string();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let r = s.ok(
            "attendance.toggle",
            json!({ "grupo": "Fortaleza", "estudianteId": id, "session": 3 }),
        );
        seen.push(r["estado"].as_str().expect("estado").to_string());
    }
    assert_eq!(seen, vec!["presente", "justificado", "ausente", "presente"]);

    let open = s.ok("attendance.open", json!({ "grupo": "Fortaleza" }));
    assert_eq!(open["states"][&id]["3"], json!("presente"));
    assert_eq!(open["students"][0]["presentCount"], json!(1));
    assert_eq!(open["sessions"].as_array().map(|a| a.len()), Some(25));
    assert_eq!(open["sessions"][11]["label"], json!("Retiro Familia"));
    assert_eq!(open["sessions"][12]["label"], json!("Catequesis 11"));
}

#[test]
fn toggle_rejects_unknown_sessions_and_students() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-attendance-bad");
    let created = s.ok(
        "students.create",
        json!({ "grupo": "Consejo", "nombre": "Eva Rojas" }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();

    assert_eq!(
        s.err_code(
            "attendance.toggle",
            json!({ "grupo": "Consejo", "estudianteId": id, "session": 25 })
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "attendance.toggle",
            json!({ "grupo": "Consejo", "estudianteId": "nadie", "session": 0 })
        ),
        "bad_params"
    );
    // the student belongs to Consejo, not Piedad
    assert_eq!(
        s.err_code(
            "attendance.toggle",
            json!({ "grupo": "Piedad", "estudianteId": id, "session": 0 })
        ),
        "bad_params"
    );
}

#[test]
fn catechist_attendance_is_keyed_by_name() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-catechists");
    s.ok("catechists.add", json!({ "nombre": "Nueva Catequista", "grupo": "Piedad" }));
    let list = s.ok("catechists.list", json!({}));
    assert!(list["catechists"]
        .as_array()
        .expect("array")
        .iter()
        .any(|c| c["nombre"] == json!("Nueva Catequista")));

    let r = s.ok(
        "catechists.attendanceToggle",
        json!({ "nombre": "Nueva Catequista", "session": 0 }),
    );
    assert_eq!(r["estado"], json!("presente"));
    let open = s.ok("catechists.attendanceOpen", json!({}));
    assert_eq!(open["states"]["Nueva Catequista"]["0"], json!("presente"));

    assert_eq!(
        s.err_code(
            "catechists.attendanceToggle",
            json!({ "nombre": "Desconocido", "session": 0 })
        ),
        "bad_params"
    );
}
