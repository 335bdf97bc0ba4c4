use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use rusty_till::data::enrich::{DiscountBand, enrich};
use rusty_till::data::filter::{self, FilterSpec};
use rusty_till::data::loader::{DataSource, DatasetSettings, LoadError, load, load_bytes};
use rusty_till::data::model::{CategoricalField, SaleRecord, SalesTable};
use rusty_till::query::aggregate::{
    KeyField, NumericField, mean_by_key, sum_by_key, top_records, total,
};
use rusty_till::query::pages::{Page, PageParams, PageReport, QuerySettings, run_page};
use rusty_till::query::result::{GroupKey, Metric, Ranking};

fn record(
    order_date: NaiveDateTime,
    category: &str,
    region: &str,
    product: &str,
    sales: f64,
    profit: f64,
    discount: f64,
) -> SaleRecord {
    SaleRecord {
        order_date,
        category: category.to_string(),
        subcategory: format!("{category} misc"),
        product_name: product.to_string(),
        region: region.to_string(),
        state: "Ohio".to_string(),
        city: "Columbus".to_string(),
        segment: "Corporate".to_string(),
        customer: format!("Customer {}", product.len() % 4),
        sales,
        profit,
        discount,
        quantity: 2,
        profit_margin: SaleRecord::resolve_margin(sales, profit, None),
    }
}

/// Sixty orders over three categories, four regions and ~two months.
fn sample_table() -> SalesTable {
    let categories = ["Furniture", "Office Supplies", "Technology"];
    let regions = ["West", "East", "Central", "South"];
    let discounts = [0.0, 0.05, 0.1, 0.2, 0.45, 0.8];
    let start = NaiveDate::from_ymd_opt(2023, 11, 20)
        .unwrap()
        .and_hms_opt(8, 15, 0)
        .unwrap();

    let rows = (0..60)
        .map(|i: usize| {
            let sales = ((i * 37) % 101) as f64 + 0.5;
            let profit = sales * (((i * 13) % 7) as f64 - 2.0) / 10.0;
            record(
                start + Duration::hours(i as i64 * 23),
                categories[i % 3],
                regions[i % 4],
                &format!("Item {}", i % 9),
                sales,
                profit,
                discounts[i % 6],
            )
        })
        .collect();
    SalesTable::from_records(rows)
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------------------------------------------------------------------
// Filter properties
// ---------------------------------------------------------------------------

#[test]
fn unrestricted_filter_is_identity() {
    let table = sample_table();
    let spec = FilterSpec::unrestricted(&table);
    assert_eq!(filter::apply(&table, &spec).unwrap(), table);
}

#[test]
fn filter_is_sound_and_complete() {
    let table = sample_table();
    let spec = FilterSpec::default()
        .with_date_range(day(2023, 12, 1), day(2023, 12, 20))
        .with_values(CategoricalField::Region, ["West", "South"])
        .with_values(CategoricalField::Category, ["Technology"]);

    let out = filter::apply(&table, &spec).unwrap();
    assert!(!out.is_empty());
    for row in out.rows() {
        let d = row.order_day();
        assert!(d >= day(2023, 12, 1) && d <= day(2023, 12, 20));
        assert!(row.region == "West" || row.region == "South");
        assert_eq!(row.category, "Technology");
    }
    let expected: Vec<&SaleRecord> = table.rows().iter().filter(|r| spec.matches(r)).collect();
    assert_eq!(out.rows().iter().collect::<Vec<_>>(), expected);
}

#[test]
fn filter_is_idempotent() {
    let table = sample_table();
    let spec = FilterSpec::default()
        .with_date_range(day(2023, 12, 5), day(2024, 1, 10))
        .with_values(CategoricalField::Region, ["East"]);
    let once = filter::apply(&table, &spec).unwrap();
    let twice = filter::apply(&once, &spec).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn date_range_is_inclusive_of_both_ends() {
    let table = sample_table();
    let first = table.rows()[0].order_day();
    let spec = FilterSpec::default().with_date_range(first, first);
    let out = filter::apply(&table, &spec).unwrap();
    assert_eq!(out.len(), 1);
}

// ---------------------------------------------------------------------------
// Aggregation properties
// ---------------------------------------------------------------------------

#[test]
fn category_sums_partition_the_total() {
    let view = enrich(&sample_table());
    let by_category = sum_by_key(&view, CategoricalField::Category.into(), &[NumericField::Sales]);
    let summed: f64 = by_category.column("sales").iter().filter_map(|m| m.value()).sum();
    assert!((summed - total(&view, NumericField::Sales)).abs() < 1e-9);
    assert_eq!(by_category.len(), 3);
}

#[test]
fn top_five_dominate_the_rest() {
    let view = enrich(&sample_table());
    for ranking in [Ranking::Top, Ranking::Bottom] {
        let picked = top_records(&view, NumericField::Profit, 5, ranking);
        assert_eq!(picked.len(), 5);
        let rest: Vec<&SaleRecord> = view
            .iter()
            .map(|r| &r.record)
            .filter(|r| !picked.contains(r))
            .collect();
        for r in rest {
            for p in &picked {
                match ranking {
                    Ranking::Top => assert!(p.profit >= r.profit),
                    Ranking::Bottom => assert!(p.profit <= r.profit),
                }
            }
        }
    }
}

#[test]
fn discount_bins_follow_lower_bound_rule() {
    assert_eq!(DiscountBand::from_discount(0.1), Some(DiscountBand::From10To20));
    assert_eq!(DiscountBand::from_discount(0.05), Some(DiscountBand::UpTo10));
    assert_eq!(DiscountBand::from_discount(1.0), Some(DiscountBand::From50To100));
    assert_eq!(DiscountBand::from_discount(0.1).map(|b| b.label()), Some("10-20%"));
}

#[test]
fn mean_margin_of_zero_sales_group_is_undefined() {
    let at = day(2024, 1, 1).and_hms_opt(10, 0, 0).unwrap();
    let table = SalesTable::from_records(vec![
        record(at, "Free", "West", "Sample", 0.0, -2.0, 0.0),
        record(at, "Free", "West", "Sample", 0.0, 0.0, 0.0),
        record(at, "Paid", "West", "Desk", 10.0, 2.0, 0.0),
    ]);
    let out = mean_by_key(&enrich(&table), CategoricalField::Category.into(), NumericField::ProfitMargin);
    let free = vec![GroupKey::Text("Free".into())];
    assert_eq!(out.get(&free, "profit_margin"), Some(Metric::Undefined));
    assert_eq!(
        out.get(&[GroupKey::Text("Paid".into())], "profit_margin"),
        Some(Metric::Value(0.2))
    );
}

#[test]
fn three_row_scenario() {
    let at = |d| day(2024, 1, d).and_hms_opt(12, 0, 0).unwrap();
    let table = SalesTable::from_records(vec![
        record(at(1), "A", "West", "x", 100.0, 20.0, 0.0),
        record(at(2), "A", "West", "y", 50.0, -5.0, 0.0),
        record(at(3), "B", "West", "z", 200.0, 40.0, 0.0),
    ]);

    let sums = sum_by_key(&enrich(&table), KeyField::Categorical(CategoricalField::Category), &[NumericField::Sales]);
    assert_eq!(sums.column("sales"), vec![Metric::Value(150.0), Metric::Value(200.0)]);

    let spec = FilterSpec::default().with_values(CategoricalField::Category, ["A"]);
    let out = filter::apply(&table, &spec).unwrap();
    let products: Vec<&str> = out.rows().iter().map(|r| r.product_name.as_str()).collect();
    assert_eq!(products, vec!["x", "y"]);
}

// ---------------------------------------------------------------------------
// Loading and the page pipeline end to end
// ---------------------------------------------------------------------------

const CSV: &str = "\
order_date,category,subcategory,product_name,region,state,city,segment,customer,sales,profit,discount,quantity
2024-03-01 09:10:00,Furniture,Chairs,Task Chair,West,California,Los Angeles,Consumer,Ann Lee,250.0,40.0,0.1,2
2024-03-01 15:45:00,Technology,Phones,Desk Phone,East,New York,New York City,Corporate,Bo Chan,120.0,-12.0,0.3,1
2024-03-02 11:00:00,Office Supplies,Paper,Copy Paper,West,Washington,Seattle,Home Office,Ann Lee,18.5,6.0,0,5
2024-03-04 18:20:00,Technology,Machines,Printer,South,Florida,Miami,Consumer,Cy Diaz,0,0,0.8,1
";

#[test]
fn text_upload_is_rejected_before_reading() {
    let source = DataSource::Upload {
        file_name: "data.txt".to_string(),
        bytes: b"anything".to_vec(),
    };
    let err = load(&source, &DatasetSettings::default()).unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat { ref file_name } if file_name == "data.txt"));
}

#[test]
fn default_workbook_loads_from_disk() {
    let settings = DatasetSettings {
        default_path: Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/superstore_small.xlsx"),
        ..DatasetSettings::default()
    };
    let table = load(&DataSource::Default, &settings).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.date_bounds(), Some((day(2024, 1, 1), day(2024, 2, 3))));

    let wrong_sheet = DatasetSettings {
        sheet_name: "Orders".to_string(),
        ..settings
    };
    assert!(matches!(
        load(&DataSource::Default, &wrong_sheet),
        Err(LoadError::Read { .. })
    ));
}

#[test]
fn every_page_runs_on_an_uploaded_csv() {
    let table = load_bytes("orders.CSV", CSV.as_bytes(), "ignored").unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.date_bounds(), Some((day(2024, 3, 1), day(2024, 3, 4))));

    let spec = FilterSpec::unrestricted(&table);
    let settings = QuerySettings::default();
    for page in Page::ALL {
        let report = run_page(&table, &spec, page, &PageParams::default(), &settings).unwrap();
        assert_eq!(report.page(), page);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("page").is_some());
    }
}

#[test]
fn discount_page_over_uploaded_csv() {
    let table = load_bytes("orders.csv", CSV.as_bytes(), "ignored").unwrap();
    let spec = FilterSpec::unrestricted(&table);
    let report = run_page(&table, &spec, Page::Discount, &PageParams::default(), &QuerySettings::default()).unwrap();
    let PageReport::Discount(report) = report else {
        panic!("expected the discount page");
    };

    assert_eq!(report.points.len(), 4);
    // The zero-sales order has no margin.
    assert_eq!(report.points[3].profit_margin, Metric::Undefined);
    let bands: Vec<String> = report.by_range.rows.iter().map(|r| r.keys[0].to_string()).collect();
    assert_eq!(bands, vec!["0-10%", "10-20%", "30-50%", "50-100%"]);
}

#[test]
fn customer_page_follows_filters_for_detail() {
    let table = load_bytes("orders.csv", CSV.as_bytes(), "ignored").unwrap();
    let spec = FilterSpec::unrestricted(&table).with_values(CategoricalField::Region, ["West"]);
    let params = PageParams {
        customer: Some("Bo Chan".to_string()),
        ..PageParams::default()
    };
    let report = run_page(&table, &spec, Page::Customers, &params, &QuerySettings::default()).unwrap();
    let PageReport::Customers(summary) = report else {
        panic!("expected the customer page");
    };

    // Counting reads the whole dataset.
    assert_eq!(summary.distinct_customers, 3);
    // Bo Chan is outside the West region, so the first filtered customer is shown.
    assert_eq!(summary.customers, vec!["Ann Lee"]);
    let detail = summary.detail.unwrap();
    assert_eq!(detail.customer, "Ann Lee");
    assert_eq!(detail.purchases.len(), 2);
}
