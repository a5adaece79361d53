//! Totals calculator tests.

use billing_engine::engine::totals::{compute_invoice_totals, compute_totals, round_money};
use billing_engine::engine::Discount;
use billing_engine::models::{DiscountType, ResolvedLineItem};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn line(quantity: Decimal, unit_price: Decimal) -> ResolvedLineItem {
    ResolvedLineItem {
        product_id: None,
        product_name: "Widget".to_string(),
        description: None,
        quantity,
        unit_price,
        amount: Decimal::ZERO, // recomputed by the calculator
    }
}

#[test]
fn totals_without_discount() {
    // 2 x 50.00 + 1 x 20.00, 10% tax
    let items = vec![line(dec!(2), dec!(50.00)), line(dec!(1), dec!(20.00))];
    let breakdown = compute_totals(&items, None, dec!(10)).unwrap();

    assert_eq!(breakdown.subtotal, dec!(120.00));
    assert_eq!(breakdown.discount_amount, dec!(0));
    assert_eq!(breakdown.tax_amount, dec!(12.00));
    assert_eq!(breakdown.total_amount, dec!(132.00));
}

#[test]
fn percentage_discount_applies_before_tax() {
    // subtotal 200.00, 10% discount, 5% tax on the discounted amount
    let items = vec![line(dec!(4), dec!(50.00))];
    let discount = Discount {
        discount_type: DiscountType::Percentage,
        value: dec!(10),
    };
    let breakdown = compute_totals(&items, Some(&discount), dec!(5)).unwrap();

    assert_eq!(breakdown.subtotal, dec!(200.00));
    assert_eq!(breakdown.discount_amount, dec!(20.00));
    assert_eq!(breakdown.tax_amount, dec!(9.00));
    assert_eq!(breakdown.total_amount, dec!(189.00));
}

#[test]
fn fixed_discount_subtracts_from_subtotal() {
    let items = vec![line(dec!(1), dec!(100.00))];
    let discount = Discount {
        discount_type: DiscountType::Fixed,
        value: dec!(25.00),
    };
    let breakdown = compute_totals(&items, Some(&discount), dec!(10)).unwrap();

    assert_eq!(breakdown.discount_amount, dec!(25.00));
    assert_eq!(breakdown.tax_amount, dec!(7.50));
    assert_eq!(breakdown.total_amount, dec!(82.50));
}

#[test]
fn fixed_discount_exceeding_subtotal_is_rejected() {
    let items = vec![line(dec!(1), dec!(50.00))];
    let discount = Discount {
        discount_type: DiscountType::Fixed,
        value: dec!(60.00),
    };
    assert!(compute_totals(&items, Some(&discount), dec!(0)).is_err());
}

#[test]
fn percentage_discount_over_100_is_rejected() {
    let items = vec![line(dec!(1), dec!(50.00))];
    let discount = Discount {
        discount_type: DiscountType::Percentage,
        value: dec!(101),
    };
    assert!(compute_totals(&items, Some(&discount), dec!(0)).is_err());
}

#[test]
fn empty_line_items_are_rejected() {
    assert!(compute_totals(&[], None, dec!(0)).is_err());
}

#[test]
fn zero_quantity_is_rejected() {
    let items = vec![line(dec!(0), dec!(50.00))];
    assert!(compute_totals(&items, None, dec!(0)).is_err());
}

#[test]
fn negative_unit_price_is_rejected() {
    let items = vec![line(dec!(1), dec!(-5.00))];
    assert!(compute_totals(&items, None, dec!(0)).is_err());
}

#[test]
fn negative_tax_rate_is_rejected() {
    let items = vec![line(dec!(1), dec!(50.00))];
    assert!(compute_totals(&items, None, dec!(-1)).is_err());
}

#[test]
fn line_amounts_are_never_trusted_from_the_caller() {
    let mut item = line(dec!(3), dec!(9.99));
    item.amount = dec!(1000.00);
    let breakdown = compute_totals(&[item], None, dec!(0)).unwrap();

    assert_eq!(breakdown.subtotal, dec!(29.97));
    assert_eq!(breakdown.total_amount, dec!(29.97));
}

#[test]
fn fractional_cents_round_midpoint_away_from_zero() {
    // 3 x 0.335 = 1.005 -> 1.01
    let items = vec![line(dec!(3), dec!(0.335))];
    let breakdown = compute_totals(&items, None, dec!(0)).unwrap();
    assert_eq!(breakdown.subtotal, dec!(1.01));

    assert_eq!(round_money(dec!(2.005)), dec!(2.01));
    assert_eq!(round_money(dec!(2.004)), dec!(2.00));
}

#[test]
fn invoice_totals_carry_no_discount() {
    let items = vec![line(dec!(2), dec!(50.00)), line(dec!(1), dec!(20.00))];
    let breakdown = compute_invoice_totals(&items, dec!(10)).unwrap();

    assert_eq!(breakdown.subtotal, dec!(120.00));
    assert_eq!(breakdown.discount_amount, dec!(0));
    assert_eq!(breakdown.total_amount, dec!(132.00));
}

#[test]
fn zero_tax_rate_yields_zero_tax() {
    let items = vec![line(dec!(1), dec!(75.50))];
    let breakdown = compute_totals(&items, None, dec!(0)).unwrap();

    assert_eq!(breakdown.tax_amount, dec!(0));
    assert_eq!(breakdown.total_amount, dec!(75.50));
}
