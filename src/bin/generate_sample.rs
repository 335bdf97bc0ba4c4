//! Writes a synthetic superstore CSV for trying out the dashboard.
//!
//! Usage: `generate_sample [OUTPUT] [ROWS]` (defaults: `superstore.csv`, 2000).

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Serialize)]
struct Row<'a> {
    order_date: String,
    category: &'a str,
    subcategory: &'a str,
    product_name: String,
    region: &'a str,
    state: &'a str,
    city: &'a str,
    segment: &'a str,
    customer: &'a str,
    sales: f64,
    profit: f64,
    discount: f64,
    quantity: u32,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

/// (category, subcategory, product stem, unit price)
const PRODUCTS: [(&str, &str, &str, f64); 12] = [
    ("Furniture", "Chairs", "Ergonomic Chair", 180.0),
    ("Furniture", "Tables", "Conference Table", 420.0),
    ("Furniture", "Bookcases", "Oak Bookcase", 260.0),
    ("Furniture", "Furnishings", "Desk Lamp", 35.0),
    ("Office Supplies", "Binders", "Ring Binder", 9.0),
    ("Office Supplies", "Paper", "Copy Paper", 6.5),
    ("Office Supplies", "Storage", "Storage Box", 24.0),
    ("Office Supplies", "Fasteners", "Stapler", 12.0),
    ("Technology", "Phones", "Smartphone", 540.0),
    ("Technology", "Accessories", "Wireless Mouse", 28.0),
    ("Technology", "Machines", "Laser Printer", 310.0),
    ("Technology", "Copiers", "Copier", 900.0),
];

/// (region, state, city)
const PLACES: [(&str, &str, &str); 8] = [
    ("West", "California", "Los Angeles"),
    ("West", "Washington", "Seattle"),
    ("East", "New York", "New York City"),
    ("East", "Pennsylvania", "Philadelphia"),
    ("Central", "Texas", "Houston"),
    ("Central", "Illinois", "Chicago"),
    ("South", "Florida", "Miami"),
    ("South", "Georgia", "Atlanta"),
];

const SEGMENTS: [&str; 3] = ["Consumer", "Corporate", "Home Office"];

const CUSTOMERS: [&str; 10] = [
    "Claire Gute",
    "Darrin Van Huff",
    "Sean O'Donnell",
    "Brosina Hoffman",
    "Andrew Allen",
    "Irene Maddox",
    "Harold Pawlan",
    "Pete Kriz",
    "Alejandro Grove",
    "Zuschuss Donatelli",
];

const DISCOUNTS: [f64; 8] = [0.0, 0.0, 0.0, 0.1, 0.15, 0.2, 0.4, 0.7];

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "superstore.csv".to_string());
    let rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid row count '{n}'"))?,
        None => 2000,
    };

    let mut rng = SimpleRng::new(42);
    let start: NaiveDateTime = NaiveDate::from_ymd_opt(2021, 1, 1)
        .context("invalid start date")?
        .and_hms_opt(0, 0, 0)
        .context("invalid start time")?;
    let span_minutes = 4 * 365 * 24 * 60;

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("failed to create {output_path}"))?;

    let mut order_dates: Vec<NaiveDateTime> = (0..rows)
        .map(|_| {
            let day_minutes = rng.below(span_minutes / (24 * 60)) as i64 * 24 * 60;
            // Shop hours 08:00-21:59.
            let minute_of_day = 8 * 60 + rng.below(14 * 60) as i64;
            start + Duration::minutes(day_minutes + minute_of_day)
        })
        .collect();
    order_dates.sort();

    for order_date in order_dates {
        let (category, subcategory, stem, price) = *rng.pick(&PRODUCTS);
        let (region, state, city) = *rng.pick(&PLACES);
        let quantity = 1 + rng.below(9) as u32;
        let discount = *rng.pick(&DISCOUNTS);

        let sales = (price * f64::from(quantity) * (1.0 - discount) * 100.0).round() / 100.0;
        let base_margin = 0.12 + 0.2 * rng.next_f64();
        let margin = base_margin - 1.1 * discount;
        let profit = (sales * margin * 100.0).round() / 100.0;

        writer.serialize(Row {
            order_date: order_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            category,
            subcategory,
            product_name: format!("{stem} {}", 100 + rng.below(20)),
            region,
            state,
            city,
            segment: *rng.pick(&SEGMENTS),
            customer: *rng.pick(&CUSTOMERS),
            sales,
            profit,
            discount,
            quantity,
        })?;
    }
    writer.flush()?;

    println!("Wrote {rows} orders to {output_path}");
    Ok(())
}
