mod test_support;

use serde_json::json;
use test_support::Sidecar;

#[test]
fn expenses_crud_and_balance() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-ledger");

    let bus = s.ok(
        "expenses.create",
        json!({ "concepto": "Bus retiro", "monto": 80000, "fecha": "2026-03-05", "categoria": "transporte" }),
    );
    let bus_id = bus["entry"]["id"].as_str().expect("id").to_string();
    s.ok(
        "expenses.create",
        json!({ "concepto": "Almuerzos", "monto": "45000", "fecha": "2026-04-02", "categoria": "alimentacion" }),
    );
    s.ok(
        "incomes.create",
        json!({ "origen": "Rifa", "monto": 150000, "fecha": "2026-03-20", "metodo": "sinpe" }),
    );

    let list = s.ok("expenses.list", json!({}));
    let entries = list["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 2);
    // newest first
    assert_eq!(entries[0]["concepto"], json!("Almuerzos"));
    assert_eq!(list["summary"]["total"], json!(125000.0));
    assert_eq!(list["summary"]["byClass"]["transporte"], json!(80000.0));
    assert_eq!(list["summary"]["monthly"]["2026-03"], json!(80000.0));

    s.ok(
        "expenses.update",
        json!({ "id": bus_id, "concepto": "Bus retiro", "monto": 90000, "fecha": "2026-03-05" }),
    );
    let balance = s.ok("ledger.balance", json!({}));
    assert_eq!(balance["gastos"], json!(135000.0));
    assert_eq!(balance["balance"], json!(15000.0));

    s.ok("expenses.delete", json!({ "id": bus_id }));
    assert_eq!(s.err_code("expenses.delete", json!({ "id": bus_id })), "not_found");
    let list = s.ok("expenses.list", json!({}));
    assert_eq!(list["entries"].as_array().map(|a| a.len()), Some(1));
}

#[test]
fn ledger_validation() {
    let (mut s, _ws) = Sidecar::with_admin("confirmacion-ledger-bad");
    assert_eq!(
        s.err_code("expenses.create", json!({ "concepto": "", "monto": 10 })),
        "bad_params"
    );
    assert_eq!(
        s.err_code("expenses.create", json!({ "concepto": "Cafe", "monto": 0 })),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "incomes.create",
            json!({ "origen": "Venta", "monto": 10, "metodo": "cheque" })
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "expenses.update",
            json!({ "id": "missing", "concepto": "x", "monto": 10 })
        ),
        "bad_params"
    );
    // fecha defaults to today
    let r = s.ok("incomes.create", json!({ "origen": "Donación", "monto": 5000 }));
    assert_eq!(r["entry"]["fecha"].as_str().map(|f| f.len()), Some(10));
    assert_eq!(r["entry"]["metodo"], json!("efectivo"));
}
