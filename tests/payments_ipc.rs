mod test_support;

use serde_json::json;
use test_support::Sidecar;

#[test]
fn paid_flag_follows_required_amount_boundary() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-payments");
    let created = s.ok(
        "students.create",
        json!({ "grupo": "Sabiduría", "nombre": "Pablo Arias" }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();

    let open = s.ok("payments.open", json!({ "grupo": "Sabiduría" }));
    assert_eq!(open["montoRequerido"], json!(50000));
    assert_eq!(open["rows"][0]["pagado"], json!(false));
    assert_eq!(open["rows"][0]["falta"], json!(50000));

    let r = s.ok(
        "payments.set",
        json!({ "grupo": "Sabiduría", "personId": id, "montoPagado": 49999 }),
    );
    assert_eq!(r["pagado"], json!(false));
    assert_eq!(r["falta"], json!(1));

    let r = s.ok(
        "payments.set",
        json!({ "grupo": "Sabiduría", "personId": id, "montoPagado": 50000 }),
    );
    assert_eq!(r["pagado"], json!(true));

    let open = s.ok("payments.open", json!({ "grupo": "Sabiduría" }));
    assert_eq!(open["rows"][0]["montoPagado"], json!(50000));
    assert_eq!(open["totals"]["completed"], json!(1));
    assert_eq!(open["totals"]["collected"], json!(50000));

    assert_eq!(
        s.err_code(
            "payments.set",
            json!({ "grupo": "Sabiduría", "personId": id, "montoPagado": -5 })
        ),
        "bad_params"
    );
}

#[test]
fn catechists_pay_through_pseudo_group_at_configured_amount() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-payments-cat");
    s.ok(
        "setup.update",
        json!({ "section": "payments", "patch": { "catequistaAmount": 30000 } }),
    );
    s.ok("catechists.add", json!({ "nombre": "Rosa Quesada" }));

    let r = s.ok(
        "payments.set",
        json!({ "grupo": "Catequistas", "personId": "Rosa Quesada", "montoPagado": 30000 }),
    );
    assert_eq!(r["pagado"], json!(true));
    assert_eq!(r["montoRequerido"], json!(30000));

    let open = s.ok("payments.open", json!({ "grupo": "Catequistas" }));
    let row = open["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .find(|r| r["personId"] == json!("Rosa Quesada"))
        .cloned()
        .expect("row");
    assert_eq!(row["pagado"], json!(true));
}

#[test]
fn group_role_pays_only_inside_its_group() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-payments-scope");
    let created = s.ok(
        "students.create",
        json!({ "grupo": "Piedad", "nombre": "Laura Chaves" }),
    );
    let id = created["student"]["id"].as_str().expect("id").to_string();
    s.add_account("piedad", "Piedad");
    s.ok("session.logout", json!({}));
    s.login("piedad", "clave1234");

    s.ok(
        "payments.set",
        json!({ "grupo": "Piedad", "personId": id, "montoPagado": 10000 }),
    );
    assert_eq!(
        s.err_code(
            "payments.set",
            json!({ "grupo": "Ciencia", "personId": id, "montoPagado": 10000 })
        ),
        "access_denied"
    );
}
