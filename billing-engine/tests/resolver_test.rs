//! Reference resolver tests.

use billing_engine::engine::resolver::{
    resolve_line_item, resolve_payee, snapshot_client, validate_payment_amount,
};
use billing_engine::models::{Client, LineItemInput, PayeeInput, PaymentCategory, Product};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn client(status: &str) -> Client {
    Client {
        client_id: Uuid::new_v4(),
        client_code: "CLT0001".to_string(),
        business_name: "Acme Ltd".to_string(),
        contact_person: None,
        email: "billing@acme.example".to_string(),
        phone: None,
        address_line1: None,
        address_line2: None,
        city: None,
        state: None,
        postal_code: None,
        country: None,
        payment_schedule: None,
        payment_terms: None,
        status: status.to_string(),
        total_spent: Decimal::ZERO,
        created_by: 1,
        revision: 0,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

fn product(price: Decimal, sale_price: Option<Decimal>) -> Product {
    Product {
        product_id: Uuid::new_v4(),
        name: "Consulting hour".to_string(),
        description: None,
        price,
        sale_price,
        tax_rate: dec!(10),
        stock_quantity: None,
        is_service: true,
        active: true,
        created_by: 1,
        created_utc: Utc::now(),
        updated_utc: Utc::now(),
    }
}

fn custom_item(name: Option<&str>, unit_price: Option<Decimal>) -> LineItemInput {
    LineItemInput {
        product_id: None,
        product_name: name.map(str::to_string),
        description: None,
        quantity: dec!(1),
        unit_price,
    }
}

#[test]
fn snapshot_captures_name_and_email() {
    let c = client("active");
    let snapshot = snapshot_client(&c).unwrap();

    assert_eq!(snapshot.client_id, c.client_id);
    assert_eq!(snapshot.name, "Acme Ltd");
    assert_eq!(snapshot.email, "billing@acme.example");
}

#[test]
fn inactive_client_does_not_resolve() {
    assert!(snapshot_client(&client("inactive")).is_err());
}

#[test]
fn snapshot_is_unaffected_by_later_client_edits() {
    let mut c = client("active");
    let snapshot = snapshot_client(&c).unwrap();

    c.business_name = "Renamed Ltd".to_string();
    c.email = "new@acme.example".to_string();

    assert_eq!(snapshot.name, "Acme Ltd");
    assert_eq!(snapshot.email, "billing@acme.example");
}

#[test]
fn catalog_item_takes_name_and_price_from_the_product() {
    let p = product(dec!(80.00), None);
    let input = LineItemInput {
        product_id: Some(p.product_id),
        // Caller-supplied overrides are ignored for catalog items
        product_name: Some("Wrong name".to_string()),
        description: Some("Two hours".to_string()),
        quantity: dec!(2),
        unit_price: Some(dec!(1.00)),
    };
    let resolved = resolve_line_item(Some(&p), &input).unwrap();

    assert_eq!(resolved.product_id, Some(p.product_id));
    assert_eq!(resolved.product_name, "Consulting hour");
    assert_eq!(resolved.unit_price, dec!(80.00));
    assert_eq!(resolved.amount, dec!(160.00));
    assert_eq!(resolved.description.as_deref(), Some("Two hours"));
}

#[test]
fn sale_price_wins_over_regular_price() {
    let p = product(dec!(80.00), Some(dec!(65.00)));
    let input = LineItemInput {
        product_id: Some(p.product_id),
        product_name: None,
        description: None,
        quantity: dec!(1),
        unit_price: None,
    };
    let resolved = resolve_line_item(Some(&p), &input).unwrap();

    assert_eq!(resolved.unit_price, dec!(65.00));
}

#[test]
fn missing_product_does_not_resolve() {
    let input = LineItemInput {
        product_id: Some(Uuid::new_v4()),
        product_name: None,
        description: None,
        quantity: dec!(1),
        unit_price: None,
    };
    assert!(resolve_line_item(None, &input).is_err());
}

#[test]
fn custom_item_requires_name_and_price() {
    let resolved =
        resolve_line_item(None, &custom_item(Some("Setup fee"), Some(dec!(150.00)))).unwrap();
    assert_eq!(resolved.product_id, None);
    assert_eq!(resolved.product_name, "Setup fee");
    assert_eq!(resolved.amount, dec!(150.00));

    assert!(resolve_line_item(None, &custom_item(None, Some(dec!(150.00)))).is_err());
    assert!(resolve_line_item(None, &custom_item(Some("Setup fee"), None)).is_err());
    assert!(resolve_line_item(None, &custom_item(Some("   "), Some(dec!(150.00)))).is_err());
}

#[test]
fn payee_must_match_the_payment_category() {
    let staff = PayeeInput {
        staff_id: Some(12),
        ..Default::default()
    };
    assert!(resolve_payee(PaymentCategory::StaffSalary, &staff).is_ok());
    assert!(resolve_payee(PaymentCategory::Subscription, &staff).is_err());
    assert!(resolve_payee(PaymentCategory::Expense, &staff).is_err());

    let subscription = PayeeInput {
        product_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    assert!(resolve_payee(PaymentCategory::Subscription, &subscription).is_ok());
    assert!(resolve_payee(PaymentCategory::StaffSalary, &subscription).is_err());

    let expense = PayeeInput {
        expense_category: Some("office_rent".to_string()),
        ..Default::default()
    };
    assert!(resolve_payee(PaymentCategory::Expense, &expense).is_ok());

    let other = PayeeInput {
        payee_name: Some("City council".to_string()),
        ..Default::default()
    };
    assert!(resolve_payee(PaymentCategory::Other, &other).is_ok());
}

#[test]
fn payee_with_zero_or_multiple_references_is_rejected() {
    assert!(resolve_payee(PaymentCategory::Expense, &PayeeInput::default()).is_err());

    let ambiguous = PayeeInput {
        staff_id: Some(12),
        product_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    assert!(resolve_payee(PaymentCategory::StaffSalary, &ambiguous).is_err());
}

#[test]
fn payment_amount_must_be_positive() {
    assert!(validate_payment_amount(dec!(0.01)).is_ok());
    assert!(validate_payment_amount(Decimal::ZERO).is_err());
    assert!(validate_payment_amount(dec!(-5)).is_err());
}
