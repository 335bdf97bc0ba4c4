/// Query layer: the aggregation catalog and the per-page pipeline.
///
/// Every query is a pure function of an [`EnrichedTable`](crate::data::enrich::EnrichedTable)
/// and returns an [`AggregationResult`](result::AggregationResult) or a
/// page report built from several of them.
pub mod aggregate;
pub mod customer;
pub mod pages;
pub mod result;
