/// Data layer: core types, loading, caching, filtering and enrichment.
///
/// Architecture:
/// ```text
///  default .xlsx / uploaded .xlsx / .csv
///        │
///        ▼
///   ┌──────────┐      ┌───────┐
///   │  loader   │◄────│ cache │  default dataset, keyed by path + sheet
///   └──────────┘      └───────┘
///        │
///        ▼
///   ┌────────────┐
///   │ SalesTable │  Vec<SaleRecord>, column index, date bounds
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  date window + accepted values → filtered table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  enrich   │  year / month / day / hour / discount range
///   └──────────┘
/// ```
pub mod cache;
pub mod enrich;
pub mod filter;
pub mod loader;
pub mod model;
