use chrono::{DateTime, Duration, TimeZone, Utc};

use inapp_purchases::analytics::{aggregate, DateWindow};
use inapp_purchases::models::{
    Frequency, PaymentMethod, Product, ProductStatus, ProductType, Purchase, PurchaseStatus,
    Subscription, SubscriptionStatus,
};

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

fn purchase(product: &str, amount: i64, country: &str, method: PaymentMethod, date: DateTime<Utc>) -> Purchase {
    Purchase {
        user_id: "u1".to_string(),
        product_id: product.to_string(),
        product_type: ProductType::Repurchase,
        transaction_id: format!("txn_{product}_{amount}"),
        status: PurchaseStatus::Completed,
        payment_method: method,
        payment_id: None,
        amount,
        currency: "USD".to_string(),
        country: country.to_string(),
        purchase_date: date,
        card_last_four: None,
        card_type: None,
        paypal_email: None,
        created_at: date,
        updated_at: date,
    }
}

fn product(id: &str, status: ProductStatus) -> Product {
    Product {
        product_id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        product_type: ProductType::OneTime,
        price: 10,
        status,
        frequency: None,
        recurring: None,
        created_at: at(1),
        updated_at: at(1),
    }
}

fn subscription(status: SubscriptionStatus) -> Subscription {
    Subscription {
        user_id: "u1".to_string(),
        product_id: "gold".to_string(),
        transaction_id: "txn".to_string(),
        status,
        payment_method: PaymentMethod::Card,
        amount: 999,
        currency: "USD".to_string(),
        country: "US".to_string(),
        start_date: at(1),
        end_date: at(1) + Duration::days(30),
        frequency: Frequency::Monthly,
        cancelled_at: None,
        created_at: at(1),
        updated_at: at(1),
    }
}

#[test]
fn revenue_scenario() {
    let purchases = vec![
        purchase("a", 10, "US", PaymentMethod::Card, at(2)),
        purchase("b", 20, "US", PaymentMethod::Paypal, at(3)),
        purchase("a", 5, "UK", PaymentMethod::Card, at(4)),
    ];

    let report = aggregate(&purchases, &[], &[], &DateWindow::default());

    assert_eq!(report.overview.total_revenue, 35);
    assert_eq!(report.overview.total_purchases, 3);
    assert_eq!(report.overview.average_order_value, 11.67);
    assert_eq!(report.breakdown.revenue_by_country.get("US"), Some(&30));
    assert_eq!(report.breakdown.revenue_by_country.get("UK"), Some(&5));
    assert_eq!(report.breakdown.revenue_by_payment_method.get("card"), Some(&15));
    assert_eq!(report.breakdown.revenue_by_payment_method.get("paypal"), Some(&20));
    assert_eq!(report.breakdown.product_revenue.get("a"), Some(&15));
    assert_eq!(report.date_range.filtered_purchases, 3);
    assert_eq!(report.date_range.start_date, None);
}

#[test]
fn breakdowns_always_sum_to_total_revenue() {
    let methods = [PaymentMethod::Card, PaymentMethod::Paypal];
    let countries = ["US", "UK", "", "DE"];
    let purchases: Vec<Purchase> = (0..40)
        .map(|i| {
            purchase(
                &format!("p{}", i % 7),
                (i * 37 % 101) as i64 + 1,
                countries[i % countries.len()],
                methods[i % 2],
                at(1 + (i % 28) as u32),
            )
        })
        .collect();

    for window in [
        DateWindow::default(),
        DateWindow { start: Some(at(5)), end: Some(at(20)) },
        DateWindow { start: Some(at(25)), end: None },
    ] {
        let report = aggregate(&purchases, &[], &[], &window);
        let total = report.overview.total_revenue;
        assert_eq!(report.breakdown.revenue_by_country.values().sum::<i64>(), total);
        assert_eq!(report.breakdown.revenue_by_payment_method.values().sum::<i64>(), total);
        assert_eq!(report.breakdown.product_revenue.values().sum::<i64>(), total);
    }
}

#[test]
fn missing_country_is_grouped_as_unknown() {
    let purchases = vec![purchase("a", 7, "", PaymentMethod::Card, at(2))];
    let report = aggregate(&purchases, &[], &[], &DateWindow::default());
    assert_eq!(report.breakdown.revenue_by_country.get("Unknown"), Some(&7));
}

#[test]
fn empty_input_has_zero_average() {
    let report = aggregate(&[], &[], &[], &DateWindow::default());
    assert_eq!(report.overview.total_revenue, 0);
    assert_eq!(report.overview.average_order_value, 0.0);
    assert!(report.breakdown.revenue_by_country.is_empty());
}

#[test]
fn window_is_inclusive_on_both_ends() {
    let purchases = vec![
        purchase("a", 1, "US", PaymentMethod::Card, at(1)),
        purchase("a", 2, "US", PaymentMethod::Card, at(2)),
        purchase("a", 4, "US", PaymentMethod::Card, at(3)),
        purchase("a", 8, "US", PaymentMethod::Card, at(4)),
    ];
    let window = DateWindow { start: Some(at(2)), end: Some(at(3)) };
    let report = aggregate(&purchases, &[], &[], &window);
    assert_eq!(report.overview.total_revenue, 6);
    assert_eq!(report.date_range.filtered_purchases, 2);
    assert_eq!(report.date_range.end_date, Some(at(3)));
}

#[test]
fn products_and_subscriptions_are_counted_outside_the_window() {
    let products = vec![
        product("a", ProductStatus::Active),
        product("b", ProductStatus::Inactive),
        product("c", ProductStatus::Active),
    ];
    let subs = vec![
        subscription(SubscriptionStatus::Active),
        subscription(SubscriptionStatus::Expired),
        subscription(SubscriptionStatus::Cancelled),
        subscription(SubscriptionStatus::Active),
    ];
    let window = DateWindow { start: Some(at(20)), end: Some(at(21)) };
    let report = aggregate(&[], &subs, &products, &window);
    assert_eq!(report.overview.total_products, 3);
    assert_eq!(report.overview.active_products, 2);
    assert_eq!(report.overview.active_subscriptions, 2);
}

#[test]
fn identical_input_gives_identical_report() {
    let purchases = vec![
        purchase("a", 10, "US", PaymentMethod::Card, at(2)),
        purchase("b", 3, "FR", PaymentMethod::Paypal, at(9)),
    ];
    let window = DateWindow { start: Some(at(1)), end: Some(at(10)) };
    assert_eq!(
        aggregate(&purchases, &[], &[], &window),
        aggregate(&purchases, &[], &[], &window)
    );
}

#[test]
fn date_bounds_accept_plain_dates_and_timestamps() {
    let window = DateWindow::parse(Some("2024-03-02"), Some("2024-03-03T23:59:59Z")).unwrap();
    assert_eq!(window.start, Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
    assert_eq!(window.end, Some(Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 59).unwrap()));

    let open = DateWindow::parse(None, Some("")).unwrap();
    assert_eq!(open, DateWindow::default());

    let err = DateWindow::parse(Some("last tuesday"), None).unwrap_err();
    assert_eq!(err.code(), "INVALID_DATE");
}
